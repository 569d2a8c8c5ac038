// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
use std::path::{Path, PathBuf};
use fpgapower::report::{run_analysis, AnalysisConfig};

#[derive(clap::Parser, Debug)]
struct PowerAnalysisArgs {
    /// VCD trace of a gate-level simulation.
    ///
    /// If not specified, the first `*.vcd` under the search
    /// directory is used.
    #[clap(long)]
    vcd: Option<PathBuf>,
    /// Yosys synthesis log with the iCE40 cell statistics.
    ///
    /// If not specified, the first `*.log` under the search
    /// directory is used.
    #[clap(long)]
    synth: Option<PathBuf>,
    /// Clock frequency in MHz. 0 detects it from the VCD clock.
    #[clap(long, default_value_t = 0.)]
    freq: f64,
    /// Target device (hx1k, hx4k, hx8k, lp1k, lp4k, lp8k, up5k).
    #[clap(long, default_value = "hx8k")]
    device: String,
    /// Junction temperature in Celsius.
    #[clap(long, default_value_t = 25.)]
    temp: f64,
    /// Core voltage in volts.
    #[clap(long, default_value_t = 1.2)]
    voltage: f64,
    /// Output path of the text report.
    #[clap(long, default_value = "power_report.txt")]
    output: PathBuf,
    /// Also write the report as JSON to this path.
    #[clap(long)]
    json: Option<PathBuf>,
    /// Directory searched for inputs that are not given.
    #[clap(long, default_value = ".")]
    search_dir: PathBuf,
    /// Report the time spent in each phase.
    #[clap(long)]
    verbose: bool,
}

/// Find the first file with extension `ext` under `dir`,
/// visiting entries in name order.
fn find_first_with_extension(dir: &Path, ext: &str) -> Option<PathBuf> {
    let mut entries = std::fs::read_dir(dir).ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect::<Vec<_>>();
    entries.sort();
    for path in &entries {
        if path.is_file() && path.extension().is_some_and(|e| e == ext) {
            return Some(path.clone())
        }
    }
    for path in &entries {
        let hidden = path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.') || n == "target");
        if path.is_dir() && !hidden {
            if let Some(found) = find_first_with_extension(path, ext) {
                return Some(found)
            }
        }
    }
    None
}

fn discover(given: Option<PathBuf>, search_dir: &Path, ext: &str) -> Option<PathBuf> {
    if given.is_some() {
        return given
    }
    let found = find_first_with_extension(search_dir, ext);
    match &found {
        Some(p) => clilog::info!("auto-detected {}", p.display()),
        None => clilog::info!("no *.{} found under {}", ext, search_dir.display()),
    }
    found
}

fn main() {
    let args = <PowerAnalysisArgs as clap::Parser>::parse();
    clilog::init_stderr_color_debug();
    if args.verbose {
        clilog::enable_timer("power_analysis");
        clilog::enable_timer("fpgapower");
    }
    clilog::set_max_print_count(clilog::Level::Warn, "DEVICE_UNKNOWN", 1);
    clilog::info!("Power analysis args:\n{:#?}", args);

    let config = AnalysisConfig {
        vcd: discover(args.vcd, &args.search_dir, "vcd"),
        synth_log: discover(args.synth, &args.search_dir, "log"),
        frequency_mhz: Some(args.freq),
        device: args.device,
        temperature_c: args.temp,
        voltage_v: args.voltage,
        ..Default::default()
    };
    let report = run_analysis(&config);

    println!("{}", report);
    if let Err(e) = report.write_text(&args.output) {
        clilog::error!("cannot write report {}: {}", args.output.display(), e);
        std::process::exit(1);
    }
    clilog::info!("report written to {}", args.output.display());
    if let Some(json) = &args.json {
        if let Err(e) = report.write_json(json) {
            clilog::error!("cannot write JSON report {}: {}", json.display(), e);
            std::process::exit(1);
        }
        clilog::info!("JSON report written to {}", json.display());
    }
}
