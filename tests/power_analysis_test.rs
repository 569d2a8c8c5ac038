// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
use fpgapower::estimate::FrequencySource;
use fpgapower::report::{run_analysis, AnalysisConfig};
use fpgapower::vcd::WaveformTrace;
use std::fs;
use tempdir::TempDir;
use vcd_ng::{TimescaleUnit, Value, Writer};

/// A 100 MHz clock, a register toggling every cycle and an
/// output pin that goes through x once.
fn write_counter_vcd() -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut writer = Writer::new(&mut buf);
        writer.timescale(1, TimescaleUnit::NS).unwrap();
        writer.add_module("top").unwrap();
        let clk = writer.add_wire(1, "clk").unwrap();
        let q = writer.add_wire(1, "q_reg").unwrap();
        let led = writer.add_wire(1, "led_pin").unwrap();
        writer.upscope().unwrap();
        writer.enddefinitions().unwrap();

        writer.timestamp(0).unwrap();
        writer.change_scalar(clk, Value::V0).unwrap();
        writer.change_scalar(q, Value::V0).unwrap();
        writer.change_scalar(led, Value::X).unwrap();
        for cycle in 0..100u64 {
            writer.timestamp(cycle * 10 + 5).unwrap();
            writer.change_scalar(clk, Value::V1).unwrap();
            writer.change_scalar(q, if cycle % 2 == 0 { Value::V1 } else { Value::V0 }).unwrap();
            if cycle == 10 {
                writer.change_scalar(led, Value::V1).unwrap();
            }
            if cycle == 60 {
                writer.change_scalar(led, Value::V0).unwrap();
            }
            writer.timestamp(cycle * 10 + 10).unwrap();
            writer.change_scalar(clk, Value::V0).unwrap();
        }
    }
    buf
}

#[test]
fn trace_written_by_vcd_writer() {
    let trace = WaveformTrace::parse(&String::from_utf8(write_counter_vcd()).unwrap());
    assert_eq!(trace.timescale_s, 1e-9);
    assert_eq!(trace.total_time, 1000);
    assert_eq!(trace.toggle_counts.get("clk"), Some(&200));
    assert_eq!(trace.toggle_counts.get("q_reg"), Some(&100));
    // x -> 1 is the baseline, 1 -> 0 is the only toggle.
    assert_eq!(trace.toggle_counts.get("led_pin"), Some(&1));
    let period = trace.clock_period_s().unwrap();
    assert!((1e-6 / period - 100.).abs() < 0.1);
}

#[test]
fn full_flow_from_files() {
    let dir = TempDir::new("fpgapower").unwrap();
    let vcd = dir.path().join("counter.vcd");
    let log = dir.path().join("synth.log");
    fs::write(&vcd, write_counter_vcd()).unwrap();
    fs::write(&log, "\
=== top ===
   Number of cells:                  7
     SB_DFF                          1
     SB_GB                           1
     SB_IO                           2
     SB_LUT4                         3
").unwrap();

    let config = AnalysisConfig {
        vcd: Some(vcd),
        synth_log: Some(log),
        device: "UP5K".into(),
        ..Default::default()
    };
    let report = run_analysis(&config);
    assert_eq!(report.frequency_source, FrequencySource::DetectedFromTrace);
    assert!((report.frequency_mhz - 100.).abs() < 0.1);
    assert_eq!(report.resources.logic_cells, 3);
    assert_eq!(report.resources.flip_flops, 1);
    assert_eq!(report.resources.io_cells, 2);
    assert_eq!(report.model.device.name(), "up5k");

    let summary = report.trace.as_ref().unwrap();
    assert_eq!(summary.num_signals, 3);
    assert!((summary.duration_s - 1e-6).abs() < 1e-15);

    // q_reg: 100 toggles in 1us at 0.1nJ -> 10mW.
    let b = &report.breakdown;
    assert!((b.categories.flip_flops - 10.).abs() < 1e-6);
    // led_pin: 1 toggle in 1us at 2.5nJ -> 2.5mW.
    assert!((b.categories.io - 2.5).abs() < 1e-6);
    // clk: 200 toggles in 1us at 0.15nJ -> 30mW.
    assert!((b.categories.logic - 30.).abs() < 1e-6);
    assert!((b.categories.routing - 16.).abs() < 1e-6);
    assert_eq!(b.static_mw, 10.);
    assert!((b.clock_tree_mw - 8.).abs() < 1e-6);
    assert!((b.total_mw - (b.static_mw + b.clock_tree_mw + b.dynamic_mw)).abs() < 1e-9);

    let text_out = dir.path().join("power_report.txt");
    let json_out = dir.path().join("power_report.json");
    report.write_text(&text_out).unwrap();
    report.write_json(&json_out).unwrap();
    let text = fs::read_to_string(&text_out).unwrap();
    assert!(text.contains("UP5K"));
    assert!(text.contains("detected from VCD"));
    assert!(text.contains("q_reg"));
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_out).unwrap()).unwrap();
    assert_eq!(json["trace"]["num_signals"], 3);
}

#[test]
fn missing_inputs_degrade_to_statistical() {
    let dir = TempDir::new("fpgapower").unwrap();
    let config = AnalysisConfig {
        vcd: Some(dir.path().join("absent.vcd")),
        synth_log: Some(dir.path().join("absent.log")),
        device: "no-such-part".into(),
        temperature_c: 85.,
        ..Default::default()
    };
    let report = run_analysis(&config);
    assert!(report.trace.is_none());
    assert_eq!(report.frequency_source, FrequencySource::Default);
    assert_eq!(report.model.device.name(), "hx8k");
    // 35mW at 25C, doubling every 12C.
    let expected = 35. * 2f64.powf(60. / 12.);
    assert!((report.breakdown.static_mw - expected).abs() < 1e-9);
    assert!(report.breakdown.dynamic_mw > 0.);
}
