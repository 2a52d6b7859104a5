//! Sensitivity engine
//!
//! Derives, for each phase record and each reachable remaining-resource
//! pair, the average throughput gain of growing the allocation within that
//! budget, plus which single axis (cache or bandwidth) pays off more.
//!
//! Gains are clamped below at +1: no allocation change is ever scored as
//! non-beneficial, which keeps greedy hill-climbing consumers monotonic
//! and avoids rewarding "do nothing".

use crate::engine::GridSnapshot;
use crate::error::{Result, ThetaError};
use crate::profile::{
    AllocPoint, AxisPreference, PhaseRecord, PhaseSequence, ThetaEntry, ThetaTable,
};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

/// Average gain over all candidate allocations within one remaining budget
///
/// Candidates are every allocation point in the rectangle from the base to
/// base + remainder, excluding the base itself. Each is probed at the
/// midpoint instruction of the base phase; cells with no profile are
/// skipped and do not count toward the average. Zero candidates yield the
/// undefined entry.
fn theta_for_budget(
    snapshot: &GridSnapshot,
    record: &PhaseRecord,
    rem_cache: u32,
    rem_membw: u32,
) -> Result<ThetaEntry> {
    let base = record.point;
    let probe = record.midpoint();
    let base_rate = record.insn_rate as i64;

    let mut sum_diff: i64 = 0;
    let mut count: i64 = 0;

    for targ_cache in base.cache..=base.cache + rem_cache {
        for targ_membw in base.membw..=base.membw + rem_membw {
            if targ_cache == base.cache && targ_membw == base.membw {
                continue;
            }

            let targ_point = AllocPoint::new(targ_cache, targ_membw);
            let Some(targ_seq) = snapshot.get(targ_point) else {
                continue;
            };
            let targ_phase = targ_seq.find(probe);
            if targ_phase.insn_rate == 0 {
                return Err(ThetaError::InconsistentRate {
                    workload: targ_phase.workload,
                    point: targ_point,
                    phase_idx: targ_phase.phase_idx,
                });
            }

            let diff = targ_phase.insn_rate as i64 - base_rate;
            sum_diff += if diff > 0 { diff } else { 1 };
            count += 1;
        }
    }

    if count == 0 {
        Ok(ThetaEntry::undefined())
    } else {
        Ok(ThetaEntry::gain(sum_diff / count))
    }
}

/// Compute the full theta table for one phase record
///
/// Covers every `(rem_cache, rem_membw)` reachable from the record's
/// allocation point, except `(0, 0)` which has no remaining resource and
/// therefore no entry. After all values are known, each entry's axis
/// preference is resolved: with only one extendable axis that axis wins;
/// otherwise spending the whole remainder on cache (`(rc, 0)`) is compared
/// against spending it on bandwidth (`(0, rb)`), ties favoring cache.
pub fn compute_phase_theta(snapshot: &GridSnapshot, record: &PhaseRecord) -> Result<ThetaTable> {
    let grid = snapshot.grid();
    let max_rem_cache = grid.max_rem_cache(record.point);
    let max_rem_membw = grid.max_rem_membw(record.point);

    let mut table = ThetaTable::new();
    for rem_cache in 0..=max_rem_cache {
        for rem_membw in 0..=max_rem_membw {
            if rem_cache == 0 && rem_membw == 0 {
                continue;
            }
            let entry = theta_for_budget(snapshot, record, rem_cache, rem_membw)?;
            table.insert(rem_cache, rem_membw, entry);
        }
    }

    for rem_cache in 0..=max_rem_cache {
        for rem_membw in 0..=max_rem_membw {
            if rem_cache == 0 && rem_membw == 0 {
                continue;
            }
            let which = if rem_cache == 0 {
                AxisPreference::Membw
            } else if rem_membw == 0 {
                AxisPreference::Cache
            } else {
                // spend the whole remainder on one axis and compare;
                // Option's ordering puts undefined below every gain
                let cache_only = table.value(rem_cache, 0);
                let membw_only = table.value(0, rem_membw);
                if cache_only >= membw_only {
                    AxisPreference::Cache
                } else {
                    AxisPreference::Membw
                }
            };
            table.set_which(rem_cache, rem_membw, which);
        }
    }

    trace!(
        point = %record.point,
        phase = record.phase_idx,
        entries = table.len(),
        "computed phase theta"
    );
    Ok(table)
}

/// Annotate every record of a sequence with its theta table
///
/// Checks the cancellation flag between phase iterations; a raised flag
/// aborts with `Cancelled` and discards partial results.
pub fn annotate_sequence(
    snapshot: &GridSnapshot,
    seq: &PhaseSequence,
    cancelled: &AtomicBool,
) -> Result<PhaseSequence> {
    let mut records = Vec::with_capacity(seq.len());
    for record in seq.records() {
        if cancelled.load(Ordering::SeqCst) {
            return Err(ThetaError::Cancelled);
        }
        let mut annotated = record.clone();
        annotated.theta = compute_phase_theta(snapshot, record)?;
        records.push(annotated);
    }
    PhaseSequence::new(seq.workload(), seq.point(), records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;
    use crate::engine::PhaseRegistry;
    use crate::profile::Workload;
    use std::sync::Arc;

    /// Build a registry where each listed point has a single phase
    /// spanning 0..=999 at the given rate, and return its snapshot.
    fn snapshot_of(grid: GridConfig, cells: &[(u32, u32, u64)]) -> GridSnapshot {
        let registry = PhaseRegistry::new(grid);
        for &(cache, membw, rate) in cells {
            let point = AllocPoint::new(cache, membw);
            let record = PhaseRecord {
                workload: Workload::Fft,
                phase_idx: 0,
                point,
                insn_start: 0,
                insn_end: 999,
                insn_rate: rate,
                theta: ThetaTable::new(),
            };
            registry.insert(
                Workload::Fft,
                Arc::new(PhaseSequence::new(Workload::Fft, point, vec![record]).unwrap()),
            );
        }
        registry.snapshot(Workload::Fft)
    }

    fn base_record(snapshot: &GridSnapshot, cache: u32, membw: u32) -> PhaseRecord {
        snapshot.get(AllocPoint::new(cache, membw)).unwrap().records()[0].clone()
    }

    #[test]
    fn test_no_entry_for_zero_remainder() {
        let grid = GridConfig::new(3, 3).unwrap();
        let snap = snapshot_of(grid, &[(0, 0, 100), (2, 2, 100)]);
        let table = compute_phase_theta(&snap, &base_record(&snap, 2, 2)).unwrap();
        // (2,2) is the grid corner: no remaining resource, empty table
        assert!(table.is_empty());

        let table = compute_phase_theta(&snap, &base_record(&snap, 0, 0)).unwrap();
        assert!(table.get(0, 0).is_none());
        assert_eq!(table.len(), 8); // 3x3 rem pairs minus (0,0)
    }

    #[test]
    fn test_simple_gain() {
        // base (0,0) at 100, only (1,0) populated at 150
        let grid = GridConfig::new(2, 1).unwrap();
        let snap = snapshot_of(grid, &[(0, 0, 100), (1, 0, 150)]);
        let table = compute_phase_theta(&snap, &base_record(&snap, 0, 0)).unwrap();

        let entry = table.get(1, 0).unwrap();
        assert_eq!(entry.value, Some(50));
        assert_eq!(entry.which, AxisPreference::Cache);
    }

    #[test]
    fn test_clamped_average() {
        // Candidates (1,0) and (0,1): one gains 9, one regresses and is
        // clamped to +1, so the average over both is (9 + 1) / 2 = 5.
        let grid = GridConfig::new(2, 2).unwrap();
        let snap = snapshot_of(grid, &[(0, 0, 100), (1, 0, 109), (0, 1, 80), (1, 1, 100)]);
        let table = compute_phase_theta(&snap, &base_record(&snap, 0, 0)).unwrap();

        assert_eq!(table.value(1, 0), Some(9));
        assert_eq!(table.value(0, 1), Some(1)); // clamped
        // rem (1,1): candidates (0,1)->1, (1,0)->9, (1,1)->1 clamped
        assert_eq!(table.value(1, 1), Some((9 + 1 + 1) / 3));
    }

    #[test]
    fn test_missing_candidates_skipped() {
        // only (2,0) is populated besides the base; (1,0) is absent
        let grid = GridConfig::new(3, 1).unwrap();
        let snap = snapshot_of(grid, &[(0, 0, 100), (2, 0, 160)]);
        let table = compute_phase_theta(&snap, &base_record(&snap, 0, 0)).unwrap();

        // rem (1,0) sees no populated candidate at all: undefined
        assert_eq!(table.get(1, 0).unwrap().value, None);
        // rem (2,0) averages over the single populated candidate
        assert_eq!(table.value(2, 0), Some(60));
    }

    #[test]
    fn test_sparse_grid_positive_theta() {
        // A=(2,3) and B=(4,5) share phase boundaries, B uniformly faster.
        // From A with rem (2,2) the only populated candidate is B, so the
        // average is over B alone and must be positive.
        let grid = GridConfig::new(6, 6).unwrap();
        let snap = snapshot_of(grid, &[(2, 3, 100), (4, 5, 170)]);
        let table = compute_phase_theta(&snap, &base_record(&snap, 2, 3)).unwrap();

        assert_eq!(table.value(2, 2), Some(70));
        // with B slower than A, the clamp floor keeps the score at +1
        let snap = snapshot_of(grid, &[(2, 3, 100), (4, 5, 90)]);
        let table = compute_phase_theta(&snap, &base_record(&snap, 2, 3)).unwrap();
        assert_eq!(table.value(2, 2), Some(1));
    }

    #[test]
    fn test_axis_preference_rules() {
        // cache-only payoff higher than bandwidth-only payoff
        let grid = GridConfig::new(2, 2).unwrap();
        let snap = snapshot_of(grid, &[(0, 0, 100), (1, 0, 200), (0, 1, 110), (1, 1, 210)]);
        let table = compute_phase_theta(&snap, &base_record(&snap, 0, 0)).unwrap();

        assert_eq!(table.get(0, 1).unwrap().which, AxisPreference::Membw);
        assert_eq!(table.get(1, 0).unwrap().which, AxisPreference::Cache);
        // mixed remainder: theta(1,0)=100 > theta(0,1)=10 -> cache
        assert_eq!(table.get(1, 1).unwrap().which, AxisPreference::Cache);
    }

    #[test]
    fn test_axis_tie_favors_cache() {
        // both single-axis upgrades gain exactly 50
        let grid = GridConfig::new(2, 2).unwrap();
        let snap = snapshot_of(grid, &[(0, 0, 100), (1, 0, 150), (0, 1, 150), (1, 1, 150)]);
        let table = compute_phase_theta(&snap, &base_record(&snap, 0, 0)).unwrap();

        assert_eq!(table.value(1, 0), table.value(0, 1));
        assert_eq!(table.get(1, 1).unwrap().which, AxisPreference::Cache);
    }

    #[test]
    fn test_midpoint_probe_selects_covering_phase() {
        // The candidate cell has two phases; the base phase's midpoint
        // (1499) falls in the candidate's second phase at rate 300.
        let grid = GridConfig::new(2, 1).unwrap();
        let registry = PhaseRegistry::new(grid);

        let base_point = AllocPoint::new(0, 0);
        let base = PhaseRecord {
            workload: Workload::Fft,
            phase_idx: 0,
            point: base_point,
            insn_start: 1000,
            insn_end: 1999,
            insn_rate: 100,
            theta: ThetaTable::new(),
        };
        registry.insert(
            Workload::Fft,
            Arc::new(PhaseSequence::new(Workload::Fft, base_point, vec![base.clone()]).unwrap()),
        );

        let targ_point = AllocPoint::new(1, 0);
        let targ_records = vec![
            PhaseRecord {
                workload: Workload::Fft,
                phase_idx: 0,
                point: targ_point,
                insn_start: 0,
                insn_end: 1200,
                insn_rate: 120,
                theta: ThetaTable::new(),
            },
            PhaseRecord {
                workload: Workload::Fft,
                phase_idx: 1,
                point: targ_point,
                insn_start: 1201,
                insn_end: 2999,
                insn_rate: 300,
                theta: ThetaTable::new(),
            },
        ];
        registry.insert(
            Workload::Fft,
            Arc::new(PhaseSequence::new(Workload::Fft, targ_point, targ_records).unwrap()),
        );

        let snap = registry.snapshot(Workload::Fft);
        let table = compute_phase_theta(&snap, &base).unwrap();
        assert_eq!(table.value(1, 0), Some(200));
    }

    #[test]
    fn test_annotate_sequence_cancellation() {
        let grid = GridConfig::new(2, 1).unwrap();
        let snap = snapshot_of(grid, &[(0, 0, 100), (1, 0, 150)]);
        let seq = snap.get(AllocPoint::new(0, 0)).unwrap().clone();

        let cancelled = AtomicBool::new(true);
        let err = annotate_sequence(&snap, &seq, &cancelled).unwrap_err();
        assert!(matches!(err, ThetaError::Cancelled));

        let cancelled = AtomicBool::new(false);
        let annotated = annotate_sequence(&snap, &seq, &cancelled).unwrap();
        assert_eq!(annotated.records()[0].theta.value(1, 0), Some(50));
    }

    #[test]
    fn test_zero_rate_candidate_is_fatal() {
        let grid = GridConfig::new(2, 1).unwrap();
        let snap = snapshot_of(grid, &[(0, 0, 100), (1, 0, 0)]);
        let err = compute_phase_theta(&snap, &base_record(&snap, 0, 0)).unwrap_err();
        assert!(err.is_integrity_violation());
    }
}
