//! Profile store
//!
//! Loads the external per-allocation phase tables into validated, ordered
//! phase sequences. The dataset is assumed pre-validated upstream, so any
//! malformed record, non-positive rate, or contiguity break is a fatal
//! integrity error rather than something to repair.

use crate::config::GridConfig;
use crate::error::{IoResultExt, Result, ThetaError};
use crate::profile::layout::{self, PHASES_FILE};
use crate::profile::{AllocPoint, PhaseRecord, PhaseSequence, ThetaTable, Workload};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Reads phase tables from the profile source tree
#[derive(Debug, Clone)]
pub struct ProfileStore {
    root: PathBuf,
    grid: GridConfig,
}

impl ProfileStore {
    /// Create a store rooted at the profile source directory
    pub fn new(root: impl Into<PathBuf>, grid: GridConfig) -> Self {
        Self {
            root: root.into(),
            grid,
        }
    }

    /// Profile source root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Grid bounds this store validates against
    pub fn grid(&self) -> GridConfig {
        self.grid
    }

    /// Path of the phase table for one (workload, allocation point)
    pub fn phases_path(&self, workload: Workload, point: AllocPoint) -> PathBuf {
        layout::phases_path(&self.root, workload.as_str(), point)
    }

    /// Path of the theta sidecar for one (workload, allocation point)
    pub fn theta_path(&self, workload: Workload, point: AllocPoint) -> PathBuf {
        layout::theta_path(&self.root, workload.as_str(), point)
    }

    /// Load and validate the phase sequence for one allocation point
    ///
    /// A missing table is the recoverable `ProfileNotFound`; any validation
    /// failure is a fatal `CorruptProfile`.
    pub fn load(&self, workload: Workload, point: AllocPoint) -> Result<PhaseSequence> {
        self.grid.check_point(point)?;

        let path = self.phases_path(workload, point);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ThetaError::ProfileNotFound { workload, point });
            }
            Err(e) => return Err(ThetaError::io(&path, e)),
        };

        let mut records: Vec<PhaseRecord> = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line_no = line_no + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let record = parse_phase_line(&path, line_no, line, workload, point)?;

            if let Some(prev) = records.last() {
                if record.insn_start < prev.insn_end {
                    return Err(ThetaError::corrupt(
                        &path,
                        line_no,
                        format!(
                            "interval overlap: start {} precedes previous end {}",
                            record.insn_start, prev.insn_end
                        ),
                    ));
                }
                if record.insn_start - prev.insn_end > 1 {
                    return Err(ThetaError::corrupt(
                        &path,
                        line_no,
                        format!(
                            "non-contiguous intervals: gap of {} instructions after {}",
                            record.insn_start - prev.insn_end,
                            prev.insn_end
                        ),
                    ));
                }
            }

            records.push(record);
        }

        if records.is_empty() {
            return Err(ThetaError::corrupt(&path, 0, "empty phase table"));
        }

        debug!(
            workload = %workload,
            point = %point,
            phases = records.len(),
            "loaded phase sequence"
        );

        PhaseSequence::new(workload, point, records)
    }

    /// Walk the workload's profile tree and report populated grid cells
    ///
    /// Only directories whose name decodes to a point inside the grid and
    /// which contain a phase table count. A missing workload directory
    /// yields an empty list, not an error.
    pub fn scan_points(&self, workload: Workload) -> Result<Vec<AllocPoint>> {
        let workload_dir = self.root.join(workload.as_str());
        if !workload_dir.is_dir() {
            debug!(workload = %workload, "no profile directory");
            return Ok(Vec::new());
        }

        let mut points = Vec::new();
        for entry in WalkDir::new(&workload_dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                let io = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("walkdir loop"));
                ThetaError::io(&workload_dir, io)
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            let Some(point) = layout::parse_point_dir_name(&name) else {
                continue;
            };
            if self.grid.check_point(point).is_err() {
                continue;
            }
            if entry.path().join(PHASES_FILE).is_file() {
                points.push(point);
            }
        }

        points.sort();
        Ok(points)
    }
}

/// Parse one `phase_idx,insn_start,insn_end,insn_rate` line
///
/// Bounds and rate are accepted as floating point and truncated, matching
/// the dataset format.
fn parse_phase_line(
    path: &Path,
    line_no: usize,
    line: &str,
    workload: Workload,
    point: AllocPoint,
) -> Result<PhaseRecord> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 4 {
        return Err(ThetaError::corrupt(
            path,
            line_no,
            format!("expected 4 fields, got {}", fields.len()),
        ));
    }

    let phase_idx: u32 = fields[0]
        .parse()
        .map_err(|_| ThetaError::corrupt(path, line_no, "invalid phase index"))?;

    let parse_f64 = |field: &str, name: &str| -> Result<f64> {
        let value: f64 = field
            .parse()
            .map_err(|_| ThetaError::corrupt(path, line_no, format!("invalid {name}")))?;
        // NaN compares false against every bound, so it must not reach
        // the range checks below
        if !value.is_finite() {
            return Err(ThetaError::corrupt(
                path,
                line_no,
                format!("non-finite {name} {field}"),
            ));
        }
        Ok(value)
    };
    let insn_start = parse_f64(fields[1], "instruction start")?;
    let insn_end = parse_f64(fields[2], "instruction end")?;
    let insn_rate = parse_f64(fields[3], "instruction rate")?;

    if insn_start < 0.0 {
        return Err(ThetaError::corrupt(path, line_no, "negative instruction start"));
    }
    if insn_end <= insn_start {
        return Err(ThetaError::corrupt(
            path,
            line_no,
            format!("instruction end {insn_end} not after start {insn_start}"),
        ));
    }
    if insn_rate < 1.0 {
        return Err(ThetaError::corrupt(
            path,
            line_no,
            format!("non-positive instruction rate {insn_rate}"),
        ));
    }

    Ok(PhaseRecord {
        workload,
        phase_idx,
        point,
        insn_start: insn_start as u64,
        insn_end: insn_end as u64,
        insn_rate: insn_rate as u64,
        theta: ThetaTable::new(),
    })
}
