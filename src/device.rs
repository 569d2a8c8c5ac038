// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Electrical model of the supported iCE40 devices.
//!
//! All quantities are derived on demand from the device and the
//! operating point. Reference conditions are 25°C and 1.2V.

use serde::Serialize;
use std::fmt;

/// Reference core voltage of the device tables.
pub const NOMINAL_VOLTAGE_V: f64 = 1.2;

/// Reference junction temperature of the device tables.
pub const NOMINAL_TEMPERATURE_C: f64 = 25.0;

/// Leakage doubles every this many degrees.
const LEAKAGE_DOUBLING_C: f64 = 12.0;

/// A supported iCE40 part.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Hx1k,
    Hx4k,
    Hx8k,
    Lp1k,
    Lp4k,
    Lp8k,
    Up5k,
}

/// Constants of one device at reference conditions.
#[derive(Debug, Copy, Clone)]
struct DeviceParams {
    name: &'static str,
    /// Static power in mW.
    static_mw: f64,
    /// Usable logic cells.
    capacity: u64,
}

const DEVICE_TABLE: [(Device, DeviceParams); 7] = [
    (Device::Hx1k, DeviceParams { name: "hx1k", static_mw: 15.0, capacity: 1280 }),
    (Device::Hx4k, DeviceParams { name: "hx4k", static_mw: 25.0, capacity: 3520 }),
    (Device::Hx8k, DeviceParams { name: "hx8k", static_mw: 35.0, capacity: 7680 }),
    (Device::Lp1k, DeviceParams { name: "lp1k", static_mw: 8.0, capacity: 1280 }),
    (Device::Lp4k, DeviceParams { name: "lp4k", static_mw: 12.0, capacity: 3520 }),
    (Device::Lp8k, DeviceParams { name: "lp8k", static_mw: 18.0, capacity: 7680 }),
    (Device::Up5k, DeviceParams { name: "up5k", static_mw: 10.0, capacity: 5280 }),
];

/// Per-toggle energies (nJ) and clock tree cost (mW/MHz) of a
/// sub-family at nominal voltage.
#[derive(Debug, Copy, Clone)]
struct SwitchingParams {
    lc_nj: f64,
    ff_nj: f64,
    /// I/O toggle into a 10pF load.
    io_nj: f64,
    clock_tree_mw_per_mhz: f64,
}

const LOW_POWER_SWITCHING: SwitchingParams = SwitchingParams {
    lc_nj: 0.12,
    ff_nj: 0.08,
    io_nj: 2.5,
    clock_tree_mw_per_mhz: 0.06,
};

const HIGH_PERFORMANCE_SWITCHING: SwitchingParams = SwitchingParams {
    lc_nj: 0.15,
    ff_nj: 0.10,
    io_nj: 2.5,
    clock_tree_mw_per_mhz: 0.08,
};

impl Device {
    /// The device substituted for unrecognized names.
    pub const DEFAULT: Device = Device::Hx8k;

    /// Look up a device by its name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Device> {
        let name = name.trim().to_ascii_lowercase();
        DEVICE_TABLE.iter()
            .find(|(_, p)| p.name == name)
            .map(|&(d, _)| d)
    }

    /// Look up a device by name, falling back to [`Device::DEFAULT`]
    /// with a warning.
    pub fn from_name_or_default(name: &str) -> Device {
        match Device::from_name(name) {
            Some(d) => d,
            None => {
                clilog::warn!(DEVICE_UNKNOWN,
                              "unknown device '{}', using {} as base",
                              name, Device::DEFAULT);
                Device::DEFAULT
            }
        }
    }

    fn params(self) -> &'static DeviceParams {
        // table rows follow the declaration order of the variants.
        &DEVICE_TABLE[self as usize].1
    }

    pub fn name(self) -> &'static str {
        self.params().name
    }

    /// LP parts use the low-power switching coefficients.
    pub fn is_low_power(self) -> bool {
        matches!(self, Device::Lp1k | Device::Lp4k | Device::Lp8k)
    }

    fn switching(self) -> &'static SwitchingParams {
        if self.is_low_power() {
            &LOW_POWER_SWITCHING
        }
        else {
            &HIGH_PERFORMANCE_SWITCHING
        }
    }

    /// Static power in mW at reference conditions.
    pub fn base_static_mw(self) -> f64 {
        self.params().static_mw
    }

    /// Total usable logic cells.
    pub fn capacity(self) -> u64 {
        self.params().capacity
    }

    pub fn all() -> impl Iterator<Item = Device> {
        DEVICE_TABLE.iter().map(|&(d, _)| d)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A device at a given operating point.
///
/// This is a plain value. Every quantity is computed from the
/// three fields when asked.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct PowerModel {
    pub device: Device,
    pub temperature_c: f64,
    pub voltage_v: f64,
}

impl PowerModel {
    pub fn new(device: Device, temperature_c: f64, voltage_v: f64) -> PowerModel {
        PowerModel { device, temperature_c, voltage_v }
    }

    /// Build a model from a device name. Unknown names degrade
    /// to the default device.
    pub fn from_device_name(
        name: &str, temperature_c: f64, voltage_v: f64
    ) -> PowerModel {
        PowerModel::new(Device::from_name_or_default(name),
                        temperature_c, voltage_v)
    }

    /// Quadratic supply correction, `(V / 1.2)^2`.
    #[inline]
    pub fn voltage_factor(&self) -> f64 {
        (self.voltage_v / NOMINAL_VOLTAGE_V).powi(2)
    }

    /// Leakage temperature correction, doubling every 12°C.
    #[inline]
    pub fn temperature_factor(&self) -> f64 {
        2f64.powf((self.temperature_c - NOMINAL_TEMPERATURE_C) / LEAKAGE_DOUBLING_C)
    }

    /// Static (leakage) power in mW.
    pub fn static_power_mw(&self) -> f64 {
        self.device.base_static_mw() * self.temperature_factor() * self.voltage_factor()
    }

    /// Energy per logic cell toggle in nJ.
    pub fn lc_energy_nj(&self) -> f64 {
        self.device.switching().lc_nj * self.voltage_factor()
    }

    /// Energy per flip-flop toggle in nJ.
    pub fn ff_energy_nj(&self) -> f64 {
        self.device.switching().ff_nj * self.voltage_factor()
    }

    /// Energy per I/O toggle in nJ.
    pub fn io_energy_nj(&self) -> f64 {
        self.device.switching().io_nj * self.voltage_factor()
    }

    /// Clock tree power per MHz per global buffer, in mW.
    pub fn clock_tree_mw_per_mhz(&self) -> f64 {
        self.device.switching().clock_tree_mw_per_mhz * self.voltage_factor()
    }

    pub fn total_capacity(&self) -> u64 {
        self.device.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn nominal_conditions_give_table_values() {
        let m = PowerModel::new(Device::Up5k, 25.0, 1.2);
        assert_eq!(m.static_power_mw(), 10.0);
        assert!(approx(m.lc_energy_nj(), 0.15));
        assert!(approx(m.ff_energy_nj(), 0.10));
        assert!(approx(m.io_energy_nj(), 2.5));
        assert!(approx(m.clock_tree_mw_per_mhz(), 0.08));
        assert_eq!(m.total_capacity(), 5280);
    }

    #[test]
    fn low_power_family_coefficients() {
        let m = PowerModel::new(Device::Lp4k, 25.0, 1.2);
        assert!(approx(m.lc_energy_nj(), 0.12));
        assert!(approx(m.ff_energy_nj(), 0.08));
        assert!(approx(m.clock_tree_mw_per_mhz(), 0.06));
        assert_eq!(m.static_power_mw(), 12.0);
    }

    #[test]
    fn leakage_doubles_every_12c() {
        let cold = PowerModel::new(Device::Hx1k, 25.0, 1.2);
        let hot = PowerModel::new(Device::Hx1k, 37.0, 1.2);
        assert!(approx(hot.static_power_mw(), 2.0 * cold.static_power_mw()));
    }

    #[test]
    fn static_power_increases_with_temperature() {
        for d in Device::all() {
            let mut last = 0.0;
            for t in (-40..=125).step_by(5) {
                let p = PowerModel::new(d, t as f64, 1.2).static_power_mw();
                assert!(p > last, "{d} at {t}C");
                last = p;
            }
        }
    }

    #[test]
    fn everything_increases_with_voltage() {
        for d in Device::all() {
            let lo = PowerModel::new(d, 50.0, 1.14);
            let hi = PowerModel::new(d, 50.0, 1.26);
            assert!(hi.static_power_mw() > lo.static_power_mw());
            assert!(hi.lc_energy_nj() > lo.lc_energy_nj());
            assert!(hi.ff_energy_nj() > lo.ff_energy_nj());
            assert!(hi.io_energy_nj() > lo.io_energy_nj());
            assert!(hi.clock_tree_mw_per_mhz() > lo.clock_tree_mw_per_mhz());
        }
    }

    #[test]
    fn unknown_device_behaves_as_default() {
        let unknown = PowerModel::from_device_name("ecp5-85k", 60.0, 1.26);
        let default = PowerModel::new(Device::Hx8k, 60.0, 1.26);
        assert_eq!(unknown, default);
        assert_eq!(unknown.static_power_mw(), default.static_power_mw());
        assert_eq!(unknown.total_capacity(), 7680);
    }

    #[test]
    fn table_rows_follow_variant_order() {
        for (i, (d, _)) in DEVICE_TABLE.iter().enumerate() {
            assert_eq!(*d as usize, i);
        }
    }

    #[test]
    fn device_names_are_case_insensitive() {
        assert_eq!(Device::from_name("UP5K"), Some(Device::Up5k));
        assert_eq!(Device::from_name(" lp8k "), Some(Device::Lp8k));
        assert_eq!(Device::from_name("hx9k"), None);
        for d in Device::all() {
            assert_eq!(Device::from_name(d.name()), Some(d));
        }
    }
}
