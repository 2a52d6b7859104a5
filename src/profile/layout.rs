//! Profile directory layout
//!
//! The profile source is a directory tree: one subdirectory per workload,
//! one subdirectory per allocation point named `<cache_bits>_<membw_value>`,
//! each holding a `phases.txt` table and (after computation) a `theta.txt`
//! sidecar. Cache bits encode the union of ways 0..=level; bandwidth is a
//! linear quota in MB/s.

use crate::profile::AllocPoint;
use std::path::{Path, PathBuf};

/// Phase table file name inside an allocation-point directory
pub const PHASES_FILE: &str = "phases.txt";

/// Theta sidecar file name inside an allocation-point directory
pub const THETA_FILE: &str = "theta.txt";

/// Bandwidth quota step in MB/s per level
const MEMBW_STEP: u64 = 72;

/// Bit mask of cache ways granted at `level`: ways 0..=level accumulated
pub fn cache_bits(level: u32) -> u64 {
    (1u64 << (level + 1)) - 1
}

/// Bandwidth quota in MB/s granted at `level`
pub fn membw_value(level: u32) -> u64 {
    u64::from(level) * MEMBW_STEP + MEMBW_STEP
}

/// Directory name for one allocation point, e.g. `7_216` for (c2, b2)
pub fn point_dir_name(point: AllocPoint) -> String {
    format!("{}_{}", cache_bits(point.cache), membw_value(point.membw))
}

/// Recover the allocation point from a directory name, if well-formed
pub fn parse_point_dir_name(name: &str) -> Option<AllocPoint> {
    let (bits_str, membw_str) = name.split_once('_')?;
    let bits: u64 = bits_str.parse().ok()?;
    let membw: u64 = membw_str.parse().ok()?;

    // cache_bits(level) is always of the form 2^(level+1) - 1; u64::MAX
    // would overflow the mask test and cannot encode a level anyway
    if bits == 0 || (bits & bits.checked_add(1)?) != 0 {
        return None;
    }
    let cache = bits.trailing_ones().checked_sub(1)?;

    if membw == 0 || membw % MEMBW_STEP != 0 {
        return None;
    }
    let membw_level = (membw / MEMBW_STEP - 1) as u32;

    Some(AllocPoint::new(cache, membw_level))
}

/// Directory for one (workload, allocation point)
pub fn point_dir(root: &Path, workload_name: &str, point: AllocPoint) -> PathBuf {
    root.join(workload_name).join(point_dir_name(point))
}

/// Path of the phase table for one (workload, allocation point)
pub fn phases_path(root: &Path, workload_name: &str, point: AllocPoint) -> PathBuf {
    point_dir(root, workload_name, point).join(PHASES_FILE)
}

/// Path of the theta sidecar for one (workload, allocation point)
pub fn theta_path(root: &Path, workload_name: &str, point: AllocPoint) -> PathBuf {
    point_dir(root, workload_name, point).join(THETA_FILE)
}
