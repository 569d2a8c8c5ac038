// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Power budget from switching activity and the electrical model.
//!
//! Dynamic power is either derived from measured toggle rates of a
//! VCD trace, or estimated statistically from the resource counts
//! when no usable trace exists. Static and clock tree power come
//! directly from the [`PowerModel`].

use crate::device::PowerModel;
use crate::resources::ResourceProfile;
use crate::vcd::WaveformTrace;
use compact_str::CompactString;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// A power-consuming category of the design.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Logic,
    FlipFlops,
    Io,
    Routing,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Logic, Category::FlipFlops, Category::Io, Category::Routing
    ];

    /// The key used in serialized reports.
    pub fn key(self) -> &'static str {
        match self {
            Category::Logic => "logic",
            Category::FlipFlops => "flip_flops",
            Category::Io => "io",
            Category::Routing => "routing",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Category::Logic => "Logic",
            Category::FlipFlops => "Flip Flops",
            Category::Io => "I/O",
            Category::Routing => "Routing",
        })
    }
}

/// A name-based classification rule: a signal whose lowercase name
/// contains any of `patterns` belongs to `category`.
#[derive(Debug, Copy, Clone)]
pub struct ClassificationRule {
    pub patterns: &'static [&'static str],
    pub category: Category,
}

impl ClassificationRule {
    pub fn matches(&self, lowercase_name: &str) -> bool {
        self.patterns.iter().any(|p| lowercase_name.contains(p))
    }
}

/// Rules in priority order. I/O comes first so that e.g. `pad_reg`
/// is counted as I/O.
pub const CLASSIFICATION_RULES: [ClassificationRule; 2] = [
    ClassificationRule {
        patterns: &["pin", "pad", "io_", "port_"],
        category: Category::Io,
    },
    ClassificationRule {
        patterns: &["reg", "ff", "dff"],
        category: Category::FlipFlops,
    },
];

/// Category of a signal without a matching rule.
pub const DEFAULT_CATEGORY: Category = Category::Logic;

/// Classify a signal by its name. The first matching rule wins.
pub fn classify_signal(name: &str) -> Category {
    let name = name.to_lowercase();
    CLASSIFICATION_RULES.iter()
        .find(|r| r.matches(&name))
        .map(|r| r.category)
        .unwrap_or(DEFAULT_CATEGORY)
}

/// Tunable assumptions of the estimator.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct EstimatorPolicy {
    /// Clock frequency used when none is given or detected.
    pub default_frequency_mhz: f64,
    /// Fraction of clock cycles in which a cell toggles, for the
    /// statistical estimate.
    pub statistical_activity: f64,
    /// Routing power as a fraction of logic plus flip-flop power.
    pub routing_factor: f64,
}

impl Default for EstimatorPolicy {
    fn default() -> Self {
        EstimatorPolicy {
            default_frequency_mhz: 100.,
            statistical_activity: 0.15,
            routing_factor: 0.4,
        }
    }
}

/// Where the clock frequency of an estimate came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencySource {
    Explicit,
    DetectedFromTrace,
    Default,
}

impl fmt::Display for FrequencySource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            FrequencySource::Explicit => "explicit",
            FrequencySource::DetectedFromTrace => "detected from VCD",
            FrequencySource::Default => "default",
        })
    }
}

/// The switching activity an estimate is based on.
#[derive(Debug, Copy, Clone)]
pub enum SwitchingActivity<'t> {
    /// Measured toggles over a positive simulated duration.
    Trace {
        toggle_counts: &'t IndexMap<CompactString, u64>,
        duration_s: f64,
    },
    /// Fixed activity fraction of every counted cell.
    Statistical,
}

impl<'t> SwitchingActivity<'t> {
    /// Use a trace if it carries toggles and a positive duration,
    /// otherwise fall back to the statistical estimate.
    pub fn from_trace(trace: Option<&'t WaveformTrace>) -> SwitchingActivity<'t> {
        let Some(trace) = trace else {
            return SwitchingActivity::Statistical
        };
        let duration_s = trace.duration_s();
        if trace.is_empty() {
            clilog::warn!(ACT_NO_TOGGLES,
                          "VCD has no toggles, using statistical activity");
            SwitchingActivity::Statistical
        }
        else if !(duration_s > 0.) {
            clilog::warn!(ACT_ZERO_DURATION,
                          "VCD covers zero simulated time, using statistical activity");
            SwitchingActivity::Statistical
        }
        else {
            SwitchingActivity::Trace {
                toggle_counts: &trace.toggle_counts,
                duration_s,
            }
        }
    }

    pub fn is_trace(&self) -> bool {
        matches!(self, SwitchingActivity::Trace { .. })
    }
}

/// Dynamic power per category, in mW.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct CategoryPower {
    pub logic: f64,
    pub flip_flops: f64,
    pub io: f64,
    pub routing: f64,
}

impl CategoryPower {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Logic => self.logic,
            Category::FlipFlops => self.flip_flops,
            Category::Io => self.io,
            Category::Routing => self.routing,
        }
    }

    fn get_mut(&mut self, category: Category) -> &mut f64 {
        match category {
            Category::Logic => &mut self.logic,
            Category::FlipFlops => &mut self.flip_flops,
            Category::Io => &mut self.io,
            Category::Routing => &mut self.routing,
        }
    }

    pub fn sum(&self) -> f64 {
        self.logic + self.flip_flops + self.io + self.routing
    }

    /// Categories with their power, largest first.
    pub fn sorted(&self) -> Vec<(Category, f64)> {
        let mut v = Category::ALL.iter()
            .map(|&c| (c, self.get(c)))
            .collect::<Vec<_>>();
        v.sort_by(|a, b| b.1.total_cmp(&a.1));
        v
    }
}

/// The assembled power budget, in mW.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct PowerBreakdown {
    pub categories: CategoryPower,
    pub static_mw: f64,
    pub clock_tree_mw: f64,
    pub dynamic_mw: f64,
    pub total_mw: f64,
}

impl PowerBreakdown {
    fn assemble(categories: CategoryPower, static_mw: f64, clock_tree_mw: f64) -> Self {
        let dynamic_mw = categories.sum();
        PowerBreakdown {
            categories,
            static_mw,
            clock_tree_mw,
            dynamic_mw,
            total_mw: static_mw + clock_tree_mw + dynamic_mw,
        }
    }

    /// Share of a category in the dynamic total, in percent.
    pub fn dynamic_share_pct(&self, category: Category) -> f64 {
        if self.dynamic_mw > 0. {
            self.categories.get(category) / self.dynamic_mw * 100.
        }
        else {
            0.
        }
    }
}

/// Power drawn by a single traced signal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalPower {
    pub name: CompactString,
    pub category: Category,
    pub toggles: u64,
    pub toggle_rate_hz: f64,
    pub power_mw: f64,
}

/// Per-toggle energy of a category in nJ. Routing has no toggles
/// of its own.
fn toggle_energy_nj(model: &PowerModel, category: Category) -> f64 {
    match category {
        Category::Logic => model.lc_energy_nj(),
        Category::FlipFlops => model.ff_energy_nj(),
        Category::Io => model.io_energy_nj(),
        Category::Routing => 0.,
    }
}

/// The power estimation engine.
#[derive(Debug, Copy, Clone, Default)]
pub struct PowerEstimator {
    pub policy: EstimatorPolicy,
}

impl PowerEstimator {
    pub fn new(policy: EstimatorPolicy) -> PowerEstimator {
        PowerEstimator { policy }
    }

    /// Pick the clock frequency in MHz.
    ///
    /// A positive explicit value wins, then a period detected in the
    /// trace, then the policy default.
    pub fn resolve_frequency(
        &self,
        explicit_mhz: Option<f64>,
        trace: Option<&WaveformTrace>
    ) -> (f64, FrequencySource) {
        if let Some(f) = explicit_mhz.filter(|&f| f > 0.) {
            return (f, FrequencySource::Explicit)
        }
        if let Some(period_s) = trace.and_then(|t| t.clock_period_s()) {
            if period_s > 0. {
                return (1e-6 / period_s, FrequencySource::DetectedFromTrace)
            }
        }
        (self.policy.default_frequency_mhz, FrequencySource::Default)
    }

    /// Estimate the power budget.
    pub fn estimate(
        &self,
        frequency_mhz: f64,
        profile: &ResourceProfile,
        model: &PowerModel,
        activity: SwitchingActivity
    ) -> PowerBreakdown {
        let static_mw = model.static_power_mw();
        let clock_tree_mw = model.clock_tree_mw_per_mhz() * frequency_mhz
            * profile.global_buffers as f64;

        let mut watts = match activity {
            SwitchingActivity::Trace { toggle_counts, duration_s }
            if duration_s > 0. => {
                self.trace_power_w(toggle_counts, duration_s, model)
            }
            SwitchingActivity::Trace { .. } => {
                clilog::warn!(EST_ZERO_DURATION,
                              "trace duration is zero, using statistical activity");
                self.statistical_power_w(frequency_mhz, profile, model)
            }
            SwitchingActivity::Statistical => {
                self.statistical_power_w(frequency_mhz, profile, model)
            }
        };
        watts.routing = self.policy.routing_factor * (watts.logic + watts.flip_flops);

        let categories = CategoryPower {
            logic: watts.logic * 1e3,
            flip_flops: watts.flip_flops * 1e3,
            io: watts.io * 1e3,
            routing: watts.routing * 1e3,
        };
        let breakdown = PowerBreakdown::assemble(categories, static_mw, clock_tree_mw);
        clilog::debug!("power breakdown: {:?}", breakdown);
        breakdown
    }

    /// Category power in W from measured toggle rates.
    fn trace_power_w(
        &self,
        toggle_counts: &IndexMap<CompactString, u64>,
        duration_s: f64,
        model: &PowerModel
    ) -> CategoryPower {
        let mut watts = CategoryPower::default();
        for (name, &count) in toggle_counts {
            if count == 0 {
                continue
            }
            let sp = signal_power(name, count, duration_s, model);
            clilog::trace!("{} -> {:?}, {:.3e} Hz", name, sp.category, sp.toggle_rate_hz);
            *watts.get_mut(sp.category) += sp.power_mw * 1e-3;
        }
        watts
    }

    /// Category power in W assuming every cell toggles in a fixed
    /// fraction of the clock cycles.
    fn statistical_power_w(
        &self,
        frequency_mhz: f64,
        profile: &ResourceProfile,
        model: &PowerModel
    ) -> CategoryPower {
        let toggles_hz = frequency_mhz * 1e6 * self.policy.statistical_activity;
        let per_cell = |count: u64, energy_nj: f64| {
            count as f64 * toggles_hz * energy_nj * 1e-9
        };
        CategoryPower {
            logic: per_cell(profile.logic_cells, model.lc_energy_nj()),
            flip_flops: per_cell(profile.flip_flops, model.ff_energy_nj()),
            io: per_cell(profile.io_cells, model.io_energy_nj()),
            routing: 0.,
        }
    }
}

/// Classify one traced signal and compute its dynamic power.
///
/// `duration_s` must be positive.
pub fn signal_power(
    name: &CompactString, toggles: u64, duration_s: f64, model: &PowerModel
) -> SignalPower {
    let category = classify_signal(name);
    let toggle_rate_hz = toggles as f64 / duration_s;
    let power_mw = toggle_rate_hz * toggle_energy_nj(model, category) * 1e-9 * 1e3;
    SignalPower {
        name: name.clone(),
        category,
        toggles,
        toggle_rate_hz,
        power_mw,
    }
}

/// The `n` traced signals drawing the most power.
pub fn top_signals(
    toggle_counts: &IndexMap<CompactString, u64>,
    duration_s: f64,
    model: &PowerModel,
    n: usize
) -> Vec<SignalPower> {
    if !(duration_s > 0.) {
        return vec![]
    }
    let mut all = toggle_counts.iter()
        .filter(|&(_, &c)| c > 0)
        .map(|(name, &c)| signal_power(name, c, duration_s, model))
        .collect::<Vec<_>>();
    all.sort_by(|a, b| b.power_mw.total_cmp(&a.power_mw));
    all.truncate(n);
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Device;

    fn close(a: f64, b: f64, rel: f64) -> bool {
        (a - b).abs() <= rel * b.abs().max(1e-12)
    }

    fn counts(items: &[(&str, u64)]) -> IndexMap<CompactString, u64> {
        items.iter().map(|&(n, c)| (CompactString::from(n), c)).collect()
    }

    #[test]
    fn classification_priority() {
        assert_eq!(classify_signal("data_reg"), Category::FlipFlops);
        assert_eq!(classify_signal("q_dff"), Category::FlipFlops);
        assert_eq!(classify_signal("buf_ff1"), Category::FlipFlops);
        assert_eq!(classify_signal("led_pin"), Category::Io);
        assert_eq!(classify_signal("PAD_REG"), Category::Io);
        assert_eq!(classify_signal("io_reg"), Category::Io);
        assert_eq!(classify_signal("port_a"), Category::Io);
        assert_eq!(classify_signal("sum"), Category::Logic);
        assert_eq!(classify_signal("a"), Category::Logic);
    }

    #[test]
    fn rules_are_ordered_io_first() {
        assert_eq!(CLASSIFICATION_RULES[0].category, Category::Io);
        assert_eq!(CLASSIFICATION_RULES[1].category, Category::FlipFlops);
        assert!(CLASSIFICATION_RULES[1].matches("pad_reg"));
    }

    #[test]
    fn register_toggling_at_1ghz() {
        // 1000 toggles in 1us with 0.08nJ per toggle.
        let model = PowerModel::new(Device::Lp8k, 25., 1.2);
        assert!(close(model.ff_energy_nj(), 0.08, 1e-12));
        let toggles = counts(&[("data_reg", 1000)]);
        let activity = SwitchingActivity::Trace { toggle_counts: &toggles, duration_s: 1e-6 };
        let b = PowerEstimator::default().estimate(
            100., &ResourceProfile::default(), &model, activity);
        assert!(close(b.categories.flip_flops, 80., 1e-3));
        assert_eq!(b.categories.logic, 0.);
        assert_eq!(b.categories.io, 0.);
        assert!(close(b.categories.routing, 32., 1e-3));
    }

    #[test]
    fn breakdown_sums() {
        let model = PowerModel::new(Device::Hx4k, 70., 1.26);
        let toggles = counts(&[("clk", 2000), ("state_reg", 300), ("led_pin", 12),
                               ("alu_out", 900), ("idle", 0)]);
        let est = PowerEstimator::default();
        let traced = est.estimate(
            48., &ResourceProfile::default(), &model,
            SwitchingActivity::Trace { toggle_counts: &toggles, duration_s: 2e-5 });
        let stat = est.estimate(
            48., &ResourceProfile::default(), &model, SwitchingActivity::Statistical);
        for b in [traced, stat] {
            assert!(close(b.total_mw, b.static_mw + b.clock_tree_mw + b.dynamic_mw, 1e-12));
            assert!(close(b.dynamic_mw, b.categories.logic + b.categories.flip_flops
                          + b.categories.io + b.categories.routing, 1e-12));
            assert!(close(b.categories.routing,
                          0.4 * (b.categories.logic + b.categories.flip_flops), 1e-12));
            let shares: f64 = Category::ALL.iter().map(|&c| b.dynamic_share_pct(c)).sum();
            assert!(close(shares, 100., 1e-9));
        }
    }

    #[test]
    fn statistical_estimate() {
        let model = PowerModel::new(Device::Hx8k, 25., 1.2);
        let profile = ResourceProfile { logic_cells: 1000, flip_flops: 200, io_cells: 8, global_buffers: 2 };
        let b = PowerEstimator::default().estimate(
            50., &profile, &model, SwitchingActivity::Statistical);
        // 1000 * 50e6 * 0.15 * 0.15e-9 W
        assert!(close(b.categories.logic, 1125., 1e-9));
        assert!(close(b.categories.flip_flops, 150., 1e-9));
        assert!(close(b.categories.io, 150., 1e-9));
        assert!(close(b.clock_tree_mw, 0.08 * 50. * 2., 1e-9));
        assert_eq!(b.static_mw, 35.);
    }

    #[test]
    fn zero_duration_trace_falls_back() {
        let model = PowerModel::new(Device::Up5k, 25., 1.2);
        let toggles = counts(&[("data_reg", 10)]);
        let est = PowerEstimator::default();
        let b = est.estimate(100., &ResourceProfile::default(), &model,
                             SwitchingActivity::Trace { toggle_counts: &toggles, duration_s: 0. });
        let s = est.estimate(100., &ResourceProfile::default(), &model,
                             SwitchingActivity::Statistical);
        assert_eq!(b, s);
        assert!(b.total_mw.is_finite());
    }

    #[test]
    fn activity_from_trace() {
        assert!(!SwitchingActivity::from_trace(None).is_trace());
        let empty = WaveformTrace::default();
        assert!(!SwitchingActivity::from_trace(Some(&empty)).is_trace());
        let mut zero_time = WaveformTrace::default();
        zero_time.toggle_counts.insert("a".into(), 3);
        assert!(!SwitchingActivity::from_trace(Some(&zero_time)).is_trace());
        let mut good = zero_time.clone();
        good.total_time = 100;
        assert!(SwitchingActivity::from_trace(Some(&good)).is_trace());
    }

    #[test]
    fn frequency_resolution_order() {
        let est = PowerEstimator::default();
        let mut trace = WaveformTrace::default();
        assert_eq!(est.resolve_frequency(None, None), (100., FrequencySource::Default));
        assert_eq!(est.resolve_frequency(Some(0.), Some(&trace)),
                   (100., FrequencySource::Default));
        trace.clock = Some(crate::vcd::DetectedClock {
            name: "clk".into(),
            edges: vec![0, 20, 40],
            period_s: Some(40e-9),
        });
        let (f, src) = est.resolve_frequency(Some(0.), Some(&trace));
        assert_eq!(src, FrequencySource::DetectedFromTrace);
        assert!(close(f, 25., 1e-9));
        assert_eq!(est.resolve_frequency(Some(12.), Some(&trace)),
                   (12., FrequencySource::Explicit));
        let custom = PowerEstimator::new(EstimatorPolicy {
            default_frequency_mhz: 12., ..Default::default()
        });
        assert_eq!(custom.resolve_frequency(None, None).0, 12.);
    }

    #[test]
    fn top_signals_sorted_by_power() {
        let model = PowerModel::new(Device::Hx8k, 25., 1.2);
        let toggles = counts(&[("a", 10), ("b_pin", 10), ("c_reg", 50), ("d", 0)]);
        let top = top_signals(&toggles, 1e-6, &model, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "b_pin");
        assert_eq!(top[1].name, "c_reg");
        assert!(top_signals(&toggles, 0., &model, 5).is_empty());
    }
}
