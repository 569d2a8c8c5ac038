// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Design resource counts from a yosys `synth_ice40` log.

use serde::Serialize;
use std::path::Path;

/// Primitive counts of a synthesized design.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceProfile {
    pub logic_cells: u64,
    pub flip_flops: u64,
    pub io_cells: u64,
    /// Global clock buffers. Never zero.
    pub global_buffers: u64,
}

/// Used when no report is available. Non-zero so that
/// ratios downstream stay defined.
impl Default for ResourceProfile {
    fn default() -> Self {
        ResourceProfile {
            logic_cells: 100,
            flip_flops: 100,
            io_cells: 10,
            global_buffers: 1,
        }
    }
}

/// The resource a primitive cell type is counted as.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum CellKind {
    Lut,
    FlipFlop,
    Io,
    GlobalBuffer,
}

fn cell_kind(cell: &str) -> Option<CellKind> {
    match cell {
        "SB_LUT4" => Some(CellKind::Lut),
        "SB_IO" => Some(CellKind::Io),
        "SB_GB" => Some(CellKind::GlobalBuffer),
        // SB_DFF, SB_DFFE, SB_DFFSR, SB_DFFNESS, ...
        c if c.starts_with("SB_DFF") => Some(CellKind::FlipFlop),
        _ => None,
    }
}

/// Whether a line opens a yosys statistics table, e.g.
/// `=== top ===` or `=== design hierarchy ===`.
fn is_table_header(line: &str) -> bool {
    let line = line.trim();
    line.len() > 6 && line.starts_with("===") && line.ends_with("===")
}

/// Parse one `SB_xxx: 12` or `SB_xxx   12` line.
fn parse_cell_line(line: &str) -> Option<(CellKind, u64)> {
    let mut tokens = line.split_whitespace();
    let cell = tokens.next()?;
    let (cell, count) = match cell.strip_suffix(':') {
        Some(c) => (c, tokens.next()?),
        None => match cell.split_once(':') {
            Some((c, n)) if !n.is_empty() => (c, n),
            _ => (cell, tokens.next()?),
        }
    };
    if tokens.next().is_some() {
        return None
    }
    let kind = cell_kind(cell)?;
    let count = count.parse::<u64>().ok()?;
    Some((kind, count))
}

impl ResourceProfile {
    const EMPTY: ResourceProfile = ResourceProfile {
        logic_cells: 0,
        flip_flops: 0,
        io_cells: 0,
        global_buffers: 0,
    };

    /// Scan the text of a synthesis log.
    ///
    /// Only the last statistics table with primitive counts is used.
    /// For a hierarchical design that is the `design hierarchy`
    /// table, which already totals the per-module tables before it,
    /// and a log with repeated `stat` runs reports the final one.
    /// Repeated lines within one table are summed. If nothing is
    /// recognized, the default profile is returned.
    pub fn from_synth_log(content: &str) -> ResourceProfile {
        let mut last_table = None;
        let mut table = ResourceProfile::EMPTY;
        let mut num_matched = 0;
        for line in content.lines() {
            if is_table_header(line) {
                if num_matched > 0 {
                    last_table = Some(table);
                }
                table = ResourceProfile::EMPTY;
                num_matched = 0;
                continue
            }
            let Some((kind, count)) = parse_cell_line(line) else {
                continue
            };
            num_matched += 1;
            let slot = match kind {
                CellKind::Lut => &mut table.logic_cells,
                CellKind::FlipFlop => &mut table.flip_flops,
                CellKind::Io => &mut table.io_cells,
                CellKind::GlobalBuffer => &mut table.global_buffers,
            };
            *slot += count;
        }
        if num_matched > 0 {
            last_table = Some(table);
        }
        let Some(mut profile) = last_table else {
            clilog::warn!(SYNTH_NO_CELLS,
                          "no iCE40 primitive counts found in synthesis log, \
                           using default resource profile");
            return ResourceProfile::default()
        };
        if profile.global_buffers == 0 {
            profile.global_buffers = 1;
        }
        clilog::debug!("resource profile from synthesis log: {:?}", profile);
        profile
    }

    /// Read and scan a synthesis log file.
    ///
    /// A missing or unreadable file gives the default profile.
    pub fn from_synth_log_file(path: impl AsRef<Path>) -> ResourceProfile {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) => {
                clilog::info!("reading synthesis log {}", path.display());
                ResourceProfile::from_synth_log(&content)
            }
            Err(e) => {
                clilog::warn!(SYNTH_MISSING,
                              "cannot read synthesis log {}: {}. \
                               using default resource profile",
                              path.display(), e);
                ResourceProfile::default()
            }
        }
    }

    /// Logic cell utilization in percent of a device capacity.
    pub fn utilization_pct(&self, capacity: u64) -> f64 {
        if capacity == 0 {
            return 0.
        }
        self.logic_cells as f64 / capacity as f64 * 100.
    }
}
