// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;
use itertools::Itertools;
use fpgapower::estimate::classify_signal;
use fpgapower::vcd::WaveformTrace;

#[derive(clap::Parser, Debug)]
struct ToggleArgs {
    /// VCD trace to inspect.
    vcd: PathBuf,
    /// Only list the most active signals.
    #[clap(long)]
    top: Option<usize>,
}

fn main() {
    clilog::init_stderr_color_debug();
    let args = <ToggleArgs as clap::Parser>::parse();
    clilog::info!("VCD toggle args:\n{:#?}", args);

    let trace = WaveformTrace::from_file(&args.vcd);
    println!("Timescale: {:e} s", trace.timescale_s);
    println!("Duration:  {} ticks ({:e} s)", trace.total_time, trace.duration_s());
    match &trace.clock {
        Some(clk) => {
            print!("Clock:     {} ({} edges", clk.name, clk.edges.len());
            match clk.period_s {
                Some(p) => println!(", {:.3} MHz)", 1e-6 / p),
                None => println!(", period unknown)"),
            }
        }
        None => println!("Clock:     not found"),
    }
    println!("Toggles:   {} over {} signals", trace.total_toggles(), trace.toggle_counts.len());
    println!();

    let rows = trace.toggle_counts.iter()
        .sorted_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)))
        .take(args.top.unwrap_or(usize::MAX));
    for (name, count) in rows {
        println!("{:>10}  {:<10}  {}", count, classify_signal(name).key(), name);
    }
}
