//! Theta sidecar store
//!
//! Persists computed theta tables as one comma-separated record per
//! (phase, remaining-resource pair), in the canonical field order:
//! task id, phase index, cache level, bandwidth level, instruction start,
//! instruction end, remaining cache, remaining bandwidth, theta value,
//! axis preference. The undefined value is encoded as `i64::MIN` and the
//! axis as 0 (cache), 1 (membw) or -1 (neither), so a written table can be
//! reparsed losslessly.

use crate::error::{IoResultExt, Result, ThetaError};
use crate::profile::{
    AllocPoint, AxisPreference, PhaseRecord, PhaseSequence, ThetaEntry, Workload,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One parsed sidecar row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThetaRow {
    /// Numeric workload id
    pub task_id: u32,
    /// Phase index within the sequence
    pub phase_idx: u32,
    /// Allocation point the table belongs to
    pub point: AllocPoint,
    /// Phase interval start
    pub insn_start: u64,
    /// Phase interval end
    pub insn_end: u64,
    /// Remaining cache budget
    pub rem_cache: u32,
    /// Remaining bandwidth budget
    pub rem_membw: u32,
    /// The theta entry itself
    pub entry: ThetaEntry,
}

/// Format one theta record in the canonical sidecar field order
pub fn format_row(record: &PhaseRecord, rem_cache: u32, rem_membw: u32, entry: &ThetaEntry) -> String {
    format!(
        "{}, {}, {}, {}, {}, {}, {}, {}, {}, {}",
        record.workload.task_id(),
        record.phase_idx,
        record.point.cache,
        record.point.membw,
        record.insn_start,
        record.insn_end,
        rem_cache,
        rem_membw,
        entry.value_code(),
        entry.which.as_code(),
    )
}

/// Parse one sidecar line back into a row
pub fn parse_row(path: &Path, line_no: usize, line: &str) -> Result<ThetaRow> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != 10 {
        return Err(ThetaError::sidecar(
            path,
            format!("line {line_no}: expected 10 fields, got {}", fields.len()),
        ));
    }

    fn field<T: std::str::FromStr>(
        path: &Path,
        line_no: usize,
        raw: &str,
        name: &str,
    ) -> Result<T> {
        raw.parse().map_err(|_| {
            ThetaError::sidecar(path, format!("line {line_no}: invalid {name}: {raw}"))
        })
    }

    let which_code: i8 = field(path, line_no, fields[9], "axis preference")?;
    let which = AxisPreference::from_code(which_code).ok_or_else(|| {
        ThetaError::sidecar(
            path,
            format!("line {line_no}: unknown axis preference code {which_code}"),
        )
    })?;
    let value_code: i64 = field(path, line_no, fields[8], "theta value")?;

    Ok(ThetaRow {
        task_id: field(path, line_no, fields[0], "task id")?,
        phase_idx: field(path, line_no, fields[1], "phase index")?,
        point: AllocPoint::new(
            field(path, line_no, fields[2], "cache level")?,
            field(path, line_no, fields[3], "membw level")?,
        ),
        insn_start: field(path, line_no, fields[4], "instruction start")?,
        insn_end: field(path, line_no, fields[5], "instruction end")?,
        rem_cache: field(path, line_no, fields[6], "remaining cache")?,
        rem_membw: field(path, line_no, fields[7], "remaining membw")?,
        entry: ThetaEntry {
            value: ThetaEntry::value_from_code(value_code),
            which,
        },
    })
}

/// Theta sidecar table for one (workload, allocation point)
#[derive(Debug, Clone)]
pub struct ThetaSidecar {
    path: PathBuf,
}

impl ThetaSidecar {
    /// Sidecar at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Sidecar file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a table has already been persisted
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Persist every theta entry of an annotated sequence
    ///
    /// The table is written whole via a temporary file and rename, so a
    /// crash mid-write never leaves a truncated sidecar behind.
    pub fn write_sequence(&self, seq: &PhaseSequence) -> Result<()> {
        let tmp_path = self.path.with_extension("txt.tmp");
        let mut file = std::fs::File::create(&tmp_path).with_path(&tmp_path)?;

        for record in seq.records() {
            for (&(rem_cache, rem_membw), entry) in record.theta.iter() {
                writeln!(file, "{}", format_row(record, rem_cache, rem_membw, entry))
                    .with_path(&tmp_path)?;
            }
        }
        file.flush().with_path(&tmp_path)?;
        drop(file);

        std::fs::rename(&tmp_path, &self.path).with_path(&self.path)?;

        debug!(path = %self.path.display(), phases = seq.len(), "wrote theta sidecar");
        Ok(())
    }

    /// Reparse a persisted table and attach its entries to a bare sequence
    ///
    /// Entries are matched to records by phase index. A row that names an
    /// unknown phase, a foreign workload, or a foreign allocation point is
    /// a sidecar integrity error.
    pub fn read_into(&self, seq: &PhaseSequence) -> Result<PhaseSequence> {
        let content = std::fs::read_to_string(&self.path).with_path(&self.path)?;

        let mut records: Vec<PhaseRecord> = seq.records().to_vec();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let row = parse_row(&self.path, line_no + 1, line)?;

            if row.task_id != seq.workload().task_id() || row.point != seq.point() {
                return Err(ThetaError::sidecar(
                    &self.path,
                    format!(
                        "line {}: row for task {} at {} does not belong to {} at {}",
                        line_no + 1,
                        row.task_id,
                        row.point,
                        seq.workload(),
                        seq.point()
                    ),
                ));
            }

            let record = records
                .iter_mut()
                .find(|r| r.phase_idx == row.phase_idx)
                .ok_or_else(|| {
                    ThetaError::sidecar(
                        &self.path,
                        format!("line {}: unknown phase index {}", line_no + 1, row.phase_idx),
                    )
                })?;
            record.theta.insert(row.rem_cache, row.rem_membw, row.entry);
        }

        debug!(path = %self.path.display(), "loaded theta sidecar");
        PhaseSequence::new(seq.workload(), seq.point(), records)
    }
}

/// Sidecar location helper mirroring the profile layout
pub fn sidecar_for(root: &Path, workload: Workload, point: AllocPoint) -> ThetaSidecar {
    ThetaSidecar::new(crate::profile::layout::theta_path(
        root,
        workload.as_str(),
        point,
    ))
}
