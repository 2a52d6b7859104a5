//! Phase records, sequences, and theta tables
//!
//! Core data model: a workload's execution at one allocation point is an
//! ordered, contiguous sequence of phase records, each annotated after
//! sensitivity analysis with a sparse theta table keyed by remaining
//! resources.

use crate::error::{Result, ThetaError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Workload identity; partitions every other structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Workload {
    /// PARSEC dedup kernel
    Dedup,
    /// PARSEC canneal kernel
    Canneal,
    /// SPLASH-2 FFT kernel
    Fft,
    /// PARSEC streamcluster kernel
    Streamcluster,
}

impl Workload {
    /// All supported workloads
    pub const ALL: [Workload; 4] = [
        Workload::Dedup,
        Workload::Canneal,
        Workload::Fft,
        Workload::Streamcluster,
    ];

    /// Stable numeric id, matching the profile dataset's task ids
    pub fn task_id(&self) -> u32 {
        match self {
            Workload::Dedup => 0,
            Workload::Canneal => 1,
            Workload::Fft => 2,
            Workload::Streamcluster => 3,
        }
    }

    /// Directory name under the profile root
    pub fn as_str(&self) -> &'static str {
        match self {
            Workload::Dedup => "dedup",
            Workload::Canneal => "canneal",
            Workload::Fft => "fft",
            Workload::Streamcluster => "streamcluster",
        }
    }

    /// Lookup by numeric task id
    pub fn from_task_id(id: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|w| w.task_id() == id)
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Workload {
    type Err = ThetaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|w| w.as_str() == s)
            .ok_or_else(|| ThetaError::config(format!("unsupported workload: {s}")))
    }
}

/// One (cache level, bandwidth level) resource grant configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AllocPoint {
    /// Cache allocation level (index into the ways grid)
    pub cache: u32,
    /// Memory bandwidth allocation level
    pub membw: u32,
}

impl AllocPoint {
    /// Create an allocation point
    pub fn new(cache: u32, membw: u32) -> Self {
        Self { cache, membw }
    }
}

impl fmt::Display for AllocPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(c{}, b{})", self.cache, self.membw)
    }
}

/// Which resource axis yields the larger marginal benefit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisPreference {
    /// Grow the cache allocation
    Cache,
    /// Grow the bandwidth allocation
    Membw,
    /// No remaining resource on either axis
    Neither,
}

impl AxisPreference {
    /// Wire encoding used by the sidecar table (0 cache, 1 membw, -1 neither)
    pub fn as_code(&self) -> i8 {
        match self {
            AxisPreference::Cache => 0,
            AxisPreference::Membw => 1,
            AxisPreference::Neither => -1,
        }
    }

    /// Decode the sidecar wire value
    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            0 => Some(AxisPreference::Cache),
            1 => Some(AxisPreference::Membw),
            -1 => Some(AxisPreference::Neither),
            _ => None,
        }
    }
}

/// Sentinel written to the sidecar for an undefined theta value
pub const THETA_UNDEFINED: i64 = i64::MIN;

/// One theta score: average gain plus the preferred resource axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThetaEntry {
    /// Average performance gain; `None` when no comparison was possible
    pub value: Option<i64>,
    /// Preferred axis when only one dimension can be grown
    pub which: AxisPreference,
}

impl ThetaEntry {
    /// Entry with a defined gain and no axis decision yet
    pub fn gain(value: i64) -> Self {
        Self {
            value: Some(value),
            which: AxisPreference::Neither,
        }
    }

    /// Entry for which no candidate allocation existed
    pub fn undefined() -> Self {
        Self {
            value: None,
            which: AxisPreference::Neither,
        }
    }

    /// Sidecar encoding of the value (undefined maps to `THETA_UNDEFINED`)
    pub fn value_code(&self) -> i64 {
        self.value.unwrap_or(THETA_UNDEFINED)
    }

    /// Decode a sidecar value
    pub fn value_from_code(code: i64) -> Option<i64> {
        if code == THETA_UNDEFINED {
            None
        } else {
            Some(code)
        }
    }
}

/// Sparse mapping from (remaining cache, remaining bandwidth) to theta
///
/// Populated append-only by the sensitivity engine: each remaining-resource
/// cell is written at most once per phase, and `(0, 0)` never appears.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThetaTable {
    entries: BTreeMap<(u32, u32), ThetaEntry>,
}

impl ThetaTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the entry for a remaining-resource pair
    pub fn get(&self, rem_cache: u32, rem_membw: u32) -> Option<&ThetaEntry> {
        self.entries.get(&(rem_cache, rem_membw))
    }

    /// Theta value for a remaining-resource pair, flattening absence and
    /// the undefined sentinel to `None`
    pub fn value(&self, rem_cache: u32, rem_membw: u32) -> Option<i64> {
        self.get(rem_cache, rem_membw).and_then(|e| e.value)
    }

    /// Insert an entry; the engine writes each cell exactly once
    pub fn insert(&mut self, rem_cache: u32, rem_membw: u32, entry: ThetaEntry) {
        self.entries.insert((rem_cache, rem_membw), entry);
    }

    /// Set the axis preference on an already-computed entry
    pub fn set_which(&mut self, rem_cache: u32, rem_membw: u32, which: AxisPreference) {
        if let Some(entry) = self.entries.get_mut(&(rem_cache, rem_membw)) {
            entry.which = which;
        }
    }

    /// Iterate entries in (rem_cache, rem_membw) order
    pub fn iter(&self) -> impl Iterator<Item = (&(u32, u32), &ThetaEntry)> {
        self.entries.iter()
    }

    /// Number of populated remaining-resource cells
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no entries were computed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One contiguous span of executed instructions under one allocation point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseRecord {
    /// Owning workload
    pub workload: Workload,
    /// Position within the sequence
    pub phase_idx: u32,
    /// Allocation point this record was profiled under
    pub point: AllocPoint,
    /// First instruction of the span (inclusive)
    pub insn_start: u64,
    /// Last instruction of the span (inclusive)
    pub insn_end: u64,
    /// Instructions per millisecond, strictly positive
    pub insn_rate: u64,
    /// Sensitivity scores, populated by the engine
    pub theta: ThetaTable,
}

impl PhaseRecord {
    /// Check whether this record's interval contains `insn` (inclusive)
    pub fn contains(&self, insn: u64) -> bool {
        self.insn_start <= insn && insn <= self.insn_end
    }

    /// Midpoint instruction of the interval, the probe point for
    /// cross-allocation comparisons
    pub fn midpoint(&self) -> u64 {
        (self.insn_start + self.insn_end) / 2
    }
}

/// Ordered, contiguous, non-empty sequence of phase records for one
/// (workload, allocation point)
///
/// Immutable after construction; shared read-only across workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSequence {
    workload: Workload,
    point: AllocPoint,
    records: Vec<PhaseRecord>,
}

impl PhaseSequence {
    /// Build a sequence from validated records; rejects empty input
    pub fn new(workload: Workload, point: AllocPoint, records: Vec<PhaseRecord>) -> Result<Self> {
        if records.is_empty() {
            return Err(ThetaError::ProfileNotFound { workload, point });
        }
        Ok(Self {
            workload,
            point,
            records,
        })
    }

    /// Owning workload
    pub fn workload(&self) -> Workload {
        self.workload
    }

    /// Allocation point of every record in the sequence
    pub fn point(&self) -> AllocPoint {
        self.point
    }

    /// Records in ascending instruction order
    pub fn records(&self) -> &[PhaseRecord] {
        &self.records
    }

    /// Number of phase records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Sequences are never empty; kept for clippy symmetry
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Indexed access for the controller hot path
    pub fn get(&self, index: usize) -> Result<&PhaseRecord> {
        self.records.get(index).ok_or(ThetaError::PhaseIndexOutOfRange {
            index,
            len: self.records.len(),
        })
    }

    /// Locate the phase covering `insn`
    ///
    /// Returns the first record whose interval contains `insn`. Past the
    /// last record's end the final phase is assumed to persist, so the last
    /// record is returned — the deliberate extrapolation policy for probes
    /// beyond known history.
    pub fn find(&self, insn: u64) -> &PhaseRecord {
        self.records
            .iter()
            .find(|r| r.contains(insn))
            .unwrap_or_else(|| self.records.last().expect("sequence is non-empty"))
    }
}
