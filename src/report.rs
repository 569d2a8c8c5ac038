// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! End-to-end analysis flow and the resulting power report.

use crate::device::{Device, PowerModel};
use crate::estimate::{
    top_signals, FrequencySource, PowerBreakdown, PowerEstimator,
    SignalPower, SwitchingActivity,
};
use crate::resources::ResourceProfile;
use crate::vcd::WaveformTrace;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Number of signals listed in the top consumers section.
pub const NUM_TOP_SIGNALS: usize = 10;

/// Inputs of one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub vcd: Option<PathBuf>,
    pub synth_log: Option<PathBuf>,
    /// Clock frequency in MHz. `None` or non-positive means auto.
    pub frequency_mhz: Option<f64>,
    pub device: String,
    pub temperature_c: f64,
    pub voltage_v: f64,
    pub estimator: PowerEstimator,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            vcd: None,
            synth_log: None,
            frequency_mhz: None,
            device: Device::DEFAULT.name().to_string(),
            temperature_c: 25.,
            voltage_v: 1.2,
            estimator: PowerEstimator::default(),
        }
    }
}

/// Summary of the trace an estimate was based on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceSummary {
    pub num_signals: usize,
    pub total_toggles: u64,
    pub duration_s: f64,
}

/// A complete power report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerReport {
    pub model: PowerModel,
    pub frequency_mhz: f64,
    pub frequency_source: FrequencySource,
    pub resources: ResourceProfile,
    pub device_capacity: u64,
    /// Present when dynamic power was derived from a trace.
    pub trace: Option<TraceSummary>,
    pub breakdown: PowerBreakdown,
    pub top_signals: Vec<SignalPower>,
}

/// Run the estimate on already loaded inputs.
pub fn analyze(
    estimator: &PowerEstimator,
    model: PowerModel,
    resources: ResourceProfile,
    trace: Option<&WaveformTrace>,
    frequency_mhz: Option<f64>,
) -> PowerReport {
    let (frequency_mhz, frequency_source) =
        estimator.resolve_frequency(frequency_mhz, trace);
    clilog::info!("clock frequency: {:.2} MHz ({})", frequency_mhz, frequency_source);

    let activity = SwitchingActivity::from_trace(trace);
    let (trace_summary, top) = match (activity, trace) {
        (SwitchingActivity::Trace { toggle_counts, duration_s }, Some(t)) => (
            Some(TraceSummary {
                num_signals: toggle_counts.len(),
                total_toggles: t.total_toggles(),
                duration_s,
            }),
            top_signals(toggle_counts, duration_s, &model, NUM_TOP_SIGNALS),
        ),
        _ => {
            clilog::info!("no usable VCD, estimating activity statistically");
            (None, vec![])
        }
    };

    let timer_estimate = clilog::stimer!("estimate power");
    let breakdown = estimator.estimate(frequency_mhz, &resources, &model, activity);
    clilog::finish!(timer_estimate);

    PowerReport {
        model,
        frequency_mhz,
        frequency_source,
        resources,
        device_capacity: model.total_capacity(),
        trace: trace_summary,
        breakdown,
        top_signals: top,
    }
}

/// Load the inputs named in `config` and run the estimate.
///
/// Missing inputs degrade to defaults; this never fails.
pub fn run_analysis(config: &AnalysisConfig) -> PowerReport {
    let resources = match &config.synth_log {
        Some(path) => ResourceProfile::from_synth_log_file(path),
        None => {
            clilog::warn!(NO_SYNTH_LOG, "no synthesis log, using default resource profile");
            ResourceProfile::default()
        }
    };
    let model = PowerModel::from_device_name(
        &config.device, config.temperature_c, config.voltage_v);
    let trace = config.vcd.as_ref().map(WaveformTrace::from_file);
    if trace.is_none() {
        clilog::warn!(NO_VCD, "no VCD trace given");
    }
    analyze(&config.estimator, model, resources, trace.as_ref(), config.frequency_mhz)
}

impl PowerReport {
    /// Write the text report to a file.
    pub fn write_text(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let mut f = BufWriter::new(File::create(path)?);
        write!(f, "{}", self)?;
        f.flush()
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let mut f = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut f, self)?;
        writeln!(f)?;
        f.flush()
    }
}

const RULE_WIDTH: usize = 70;

impl fmt::Display for PowerReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let heavy = "=".repeat(RULE_WIDTH);
        let light = "-".repeat(RULE_WIDTH);
        let b = &self.breakdown;
        let r = &self.resources;

        writeln!(f, "{heavy}")?;
        writeln!(f, "FPGA POWER ANALYSIS - Lattice iCE40")?;
        writeln!(f, "{heavy}")?;
        writeln!(f, "Device:             {}", self.model.device.name().to_uppercase())?;
        writeln!(f, "Temperature:        {:.1} C", self.model.temperature_c)?;
        writeln!(f, "Core Voltage:       {:.3} V", self.model.voltage_v)?;
        writeln!(f, "Clock Frequency:    {:.2} MHz ({})",
                 self.frequency_mhz, self.frequency_source)?;
        writeln!(f)?;
        writeln!(f, "Design Utilization:")?;
        writeln!(f, "  Logic Cells:      {:4} / {} ({:.1}%)",
                 r.logic_cells, self.device_capacity,
                 r.utilization_pct(self.device_capacity))?;
        writeln!(f, "  Flip-Flops:       {:4}", r.flip_flops)?;
        writeln!(f, "  I/O Cells:        {:4}", r.io_cells)?;
        writeln!(f, "  Global Buffers:   {:4}", r.global_buffers)?;
        writeln!(f)?;
        writeln!(f, "Static Power:              {:8.2} mW", b.static_mw)?;
        writeln!(f, "Clock Tree Power:          {:8.2} mW", b.clock_tree_mw)?;
        match &self.trace {
            Some(t) => writeln!(f, "VCD Analysis:              {} signals, {} toggles, {:.2} us",
                                t.num_signals, t.total_toggles, t.duration_s * 1e6)?,
            None => writeln!(f, "VCD Analysis:              not available (statistical estimate)")?,
        }
        writeln!(f)?;
        writeln!(f, "Dynamic Power Breakdown:")?;
        for (category, mw) in b.categories.sorted() {
            writeln!(f, "   {:15} {:8.2} mW ({:5.1}%)",
                     category.to_string(), mw, b.dynamic_share_pct(category))?;
        }
        writeln!(f, "   {:15} {:8.2} mW", "Total Dynamic", b.dynamic_mw)?;
        if !self.top_signals.is_empty() {
            writeln!(f)?;
            writeln!(f, "Top Switching Signals:")?;
            for s in &self.top_signals {
                writeln!(f, "   {:30} {:10} {:12.3e} Hz {:8.3} mW",
                         s.name.as_str(), s.category.to_string(),
                         s.toggle_rate_hz, s.power_mw)?;
            }
        }
        writeln!(f, "{light}")?;
        writeln!(f, "TOTAL POWER:               {:8.2} mW", b.total_mw)?;
        writeln!(f, "{light}")
    }
}
