// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Switching activity extraction from VCD waveform dumps.
//!
//! The scanner is lenient: it walks the whitespace
//! separated tokens of the dump once, and any record that does not
//! look like a timestamp, a value change or a `$keyword ... $end`
//! block is skipped. It never fails on malformed text.

use compact_str::CompactString;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::iter::Peekable;
use std::path::Path;
use std::str::FromStr;
use vcd_ng::{TimescaleUnit, Value};

/// Seconds per tick when the dump does not declare a timescale.
pub const DEFAULT_TIMESCALE_S: f64 = 1e-9;

/// Signal names recognized as the design clock (case-insensitive).
pub const CLOCK_ALIASES: [&str; 3] = ["clk", "clock", "sys_clk"];

/// Minimum number of edges to estimate a clock period.
const MIN_CLOCK_EDGES: usize = 3;

/// The clock found in a dump.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedClock {
    pub name: CompactString,
    /// Ticks at which the clock took a new defined level.
    pub edges: Vec<u64>,
    /// Full period in seconds, if enough edges were seen.
    pub period_s: Option<f64>,
}

/// Switching activity of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaveformTrace {
    /// Seconds per tick.
    pub timescale_s: f64,
    /// The largest timestamp seen.
    pub total_time: u64,
    /// Toggle count per signal name, in declaration order.
    /// Only signals that toggled at least once are present.
    pub toggle_counts: IndexMap<CompactString, u64>,
    pub clock: Option<DetectedClock>,
}

impl Default for WaveformTrace {
    fn default() -> Self {
        WaveformTrace {
            timescale_s: DEFAULT_TIMESCALE_S,
            total_time: 0,
            toggle_counts: IndexMap::new(),
            clock: None,
        }
    }
}

impl WaveformTrace {
    /// Scan VCD text.
    pub fn parse(content: &str) -> WaveformTrace {
        let mut scanner = TraceScanner::new();
        scanner.scan(content);
        scanner.finish()
    }

    /// Read and scan a VCD file. A missing or unreadable file is
    /// reported and yields an empty trace.
    pub fn from_file(path: impl AsRef<Path>) -> WaveformTrace {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                clilog::warn!(VCD_MISSING, "cannot read VCD {}: {}",
                              path.display(), e);
                return WaveformTrace::default()
            }
        };
        clilog::info!("reading VCD {} ({} bytes)", path.display(), bytes.len());
        let timer_parse = clilog::stimer!("parse vcd");
        let trace = WaveformTrace::parse(&String::from_utf8_lossy(&bytes));
        clilog::finish!(timer_parse);
        trace
    }

    /// Simulated time in seconds.
    pub fn duration_s(&self) -> f64 {
        self.total_time as f64 * self.timescale_s
    }

    /// Detected clock period in seconds.
    pub fn clock_period_s(&self) -> Option<f64> {
        self.clock.as_ref().and_then(|c| c.period_s)
    }

    pub fn total_toggles(&self) -> u64 {
        self.toggle_counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.toggle_counts.is_empty()
    }
}

/// Whether a signal name is one of [`CLOCK_ALIASES`].
pub fn is_clock_name(name: &str) -> bool {
    CLOCK_ALIASES.iter().any(|a| a.eq_ignore_ascii_case(name))
}

/// Parse a timescale body such as `1ns`, `1 ns` or `100ps`
/// into seconds per tick.
pub fn parse_timescale(body: &str) -> Option<f64> {
    let joined: String = body.split_whitespace().collect();
    let split = joined.find(|c: char| !c.is_ascii_digit())?;
    let (magnitude, unit) = joined.split_at(split);
    let magnitude = magnitude.parse::<u32>().ok()?;
    let unit = TimescaleUnit::from_str(unit).ok()?;
    let unit_s = match unit {
        TimescaleUnit::S => 1.,
        TimescaleUnit::MS => 1e-3,
        TimescaleUnit::US => 1e-6,
        TimescaleUnit::NS => 1e-9,
        TimescaleUnit::PS => 1e-12,
        TimescaleUnit::FS => 1e-15,
    };
    Some(magnitude as f64 * unit_s)
}

fn parse_bit(b: u8) -> Option<Value> {
    match b {
        b'0' => Some(Value::V0),
        b'1' => Some(Value::V1),
        b'x' | b'X' => Some(Value::X),
        b'z' | b'Z' => Some(Value::Z),
        _ => None
    }
}

/// A logic value as it appears in a value change record.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogicValue {
    /// All bits are 0 or 1. Stored without redundant leading
    /// zeros so that `b0011` and `b11` compare equal.
    Defined(CompactString),
    /// At least one bit is x or z.
    Undefined,
}

impl LogicValue {
    fn parse(bits: &str) -> Option<LogicValue> {
        if bits.is_empty() {
            return None
        }
        let mut defined = true;
        for &b in bits.as_bytes() {
            match parse_bit(b)? {
                Value::V0 | Value::V1 => {},
                _ => defined = false,
            }
        }
        if !defined {
            return Some(LogicValue::Undefined)
        }
        let trimmed = bits.trim_start_matches('0');
        Some(LogicValue::Defined(match trimmed {
            "" => "0".into(),
            t => t.into()
        }))
    }
}

/// One record of the value change section.
#[derive(Debug, PartialEq)]
enum Record<'i> {
    Timestamp(u64),
    Change { id: &'i str, value: LogicValue },
    /// A real or string value. Not tracked.
    Other,
}

/// Running state of a scan.
struct TraceScanner {
    timescale_s: f64,
    current_time: u64,
    total_time: u64,
    /// Identifier code to signal name, in declaration order.
    id_to_name: IndexMap<CompactString, CompactString>,
    /// Last defined value per identifier.
    states: HashMap<CompactString, CompactString>,
    toggles: IndexMap<CompactString, u64>,
    /// Identifier code and name of the first declared clock.
    clock_id: Option<(CompactString, CompactString)>,
    clock_edges: Vec<u64>,
    num_skipped: usize,
}

impl TraceScanner {
    fn new() -> TraceScanner {
        TraceScanner {
            timescale_s: DEFAULT_TIMESCALE_S,
            current_time: 0,
            total_time: 0,
            id_to_name: IndexMap::new(),
            states: HashMap::new(),
            toggles: IndexMap::new(),
            clock_id: None,
            clock_edges: Vec::new(),
            num_skipped: 0,
        }
    }

    fn scan(&mut self, content: &str) {
        let mut tokens = content.split_ascii_whitespace().peekable();
        while let Some(tok) = tokens.next() {
            if let Some(keyword) = tok.strip_prefix('$') {
                match keyword {
                    // bodies of these are plain value changes.
                    "dumpvars" | "dumpall" | "dumpon" | "dumpoff" | "end" => {},
                    _ => {
                        let body = tokens.by_ref()
                            .take_while(|&t| t != "$end")
                            .collect::<Vec<_>>();
                        self.declaration(keyword, &body);
                    }
                }
                continue
            }
            match parse_record(tok, &mut tokens, &self.id_to_name) {
                Some(Record::Timestamp(t)) => {
                    self.current_time = t;
                    self.total_time = self.total_time.max(t);
                }
                Some(Record::Change { id, value }) => self.value_change(id, value),
                Some(Record::Other) => {},
                None => {
                    clilog::trace!("skipped malformed VCD record {:?}", tok);
                    self.num_skipped += 1;
                }
            }
        }
    }

    fn declaration(&mut self, keyword: &str, body: &[&str]) {
        match keyword {
            "timescale" => match parse_timescale(&body.join(" ")) {
                Some(ts) => self.timescale_s = ts,
                None => {
                    clilog::warn!(VCD_TIMESCALE,
                                  "unrecognized timescale {:?}, assuming 1ns",
                                  body.join(" "));
                }
            },
            "var" => {
                // type, size, identifier, reference, [range]
                if body.len() < 4 {
                    self.num_skipped += 1;
                    return
                }
                let (id, name) = (body[2], body[3]);
                self.id_to_name.insert(id.into(), name.into());
                self.toggles.entry(name.into()).or_insert(0);
                // other scopes often repeat the clock under the same
                // name with a new identifier. only the first is sampled.
                if self.clock_id.is_none() && is_clock_name(name) {
                    self.clock_id = Some((id.into(), name.into()));
                }
            },
            _ => {}
        }
    }

    fn value_change(&mut self, id: &str, value: LogicValue) {
        let Some(name) = self.id_to_name.get(id) else {
            return
        };
        let LogicValue::Defined(value) = value else {
            return
        };
        match self.states.get_mut(id) {
            Some(last) if *last == value => return,
            Some(last) => {
                *last = value;
                *self.toggles.entry(name.clone()).or_insert(0) += 1;
            }
            None => {
                // first defined level is a baseline, not a toggle.
                self.states.insert(id.into(), value);
            }
        }
        if self.clock_id.as_ref().is_some_and(|(cid, _)| cid.as_str() == id) {
            self.clock_edges.push(self.current_time);
        }
    }

    fn finish(mut self) -> WaveformTrace {
        if self.num_skipped > 0 {
            clilog::debug!("skipped {} malformed VCD records", self.num_skipped);
        }
        self.toggles.retain(|_, &mut n| n > 0);
        let timescale_s = self.timescale_s;
        let edges = self.clock_edges;
        let clock = self.clock_id.map(|(_, name)| {
            let period_s = clock_period_ticks(&edges)
                .map(|p| p * timescale_s);
            DetectedClock { name, edges, period_s }
        });
        match &clock {
            Some(DetectedClock { name, period_s: Some(p), .. }) => {
                clilog::info!("clock {} detected: {:.2} MHz", name, 1e-6 / p);
            }
            Some(DetectedClock { name, edges, .. }) => {
                clilog::debug!("clock {} has only {} edges, period unknown",
                               name, edges.len());
            }
            None => clilog::debug!("no clock signal found in VCD"),
        }
        WaveformTrace {
            timescale_s,
            total_time: self.total_time,
            toggle_counts: self.toggles,
            clock,
        }
    }
}

/// Average distance between every second edge, i.e. a full cycle
/// made of one rising and one falling transition.
fn clock_period_ticks(edges: &[u64]) -> Option<f64> {
    if edges.len() < MIN_CLOCK_EDGES {
        return None
    }
    let spans = edges.windows(3)
        .map(|w| w[2].saturating_sub(w[0]) as f64)
        .collect::<Vec<_>>();
    let avg = spans.iter().sum::<f64>() / spans.len() as f64;
    (avg > 0.).then_some(avg)
}

/// Decode one record starting at `tok`.
///
/// Vector, real and string records take their identifier from the
/// next token, which is consumed only if the value is well formed and
/// the token is a declared identifier. A malformed record is skipped
/// on its own.
fn parse_record<'i, I: Iterator<Item = &'i str>>(
    tok: &'i str,
    tokens: &mut Peekable<I>,
    declared: &IndexMap<CompactString, CompactString>
) -> Option<Record<'i>> {
    let mut take_id = || tokens.next_if(|t| declared.contains_key(*t));
    let mut chars = tok.chars();
    match chars.next()? {
        '#' => tok[1..].parse::<u64>().ok().map(Record::Timestamp),
        'b' | 'B' => {
            let value = LogicValue::parse(&tok[1..])?;
            let id = take_id()?;
            Some(Record::Change { id, value })
        }
        'r' => {
            tok[1..].parse::<f64>().ok()?;
            take_id()?;
            Some(Record::Other)
        }
        's' => {
            if tok.len() < 2 {
                return None
            }
            take_id()?;
            Some(Record::Other)
        }
        '0' | '1' | 'x' | 'X' | 'z' | 'Z' => {
            let id = &tok[1..];
            if id.is_empty() {
                return None
            }
            let value = LogicValue::parse(&tok[..1])?;
            Some(Record::Change { id, value })
        }
        _ => None
    }
}
