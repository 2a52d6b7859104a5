//! Theta engine
//!
//! Orchestrates profile loading, sensitivity computation, and sidecar
//! persistence, and exposes the lookup entry points consumed by the
//! runtime scheduling controller. Grid cells are embarrassingly parallel:
//! precomputation shards them across a rayon pool, sharing the loaded
//! sequences read-only and giving each worker exclusive ownership of its
//! cell's results.

use crate::config::ThetaConfig;
use crate::engine::registry::PhaseRegistry;
use crate::engine::sensitivity::annotate_sequence;
use crate::error::{Result, ThetaError};
use crate::profile::{AllocPoint, PhaseRecord, PhaseSequence, ProfileStore, Workload};
use crate::theta::sidecar_for;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Outcome of precomputing one workload's grid
#[derive(Debug)]
pub struct PrecomputeSummary {
    /// Workload the pass covered
    pub workload: Workload,
    /// Cells whose theta tables were computed this run
    pub cells_computed: usize,
    /// Cells satisfied from an existing sidecar
    pub cells_reused: usize,
    /// Total phase records annotated
    pub phases_annotated: usize,
    /// Wall-clock duration of the pass
    pub duration: Duration,
}

impl PrecomputeSummary {
    /// Print a human-readable summary
    pub fn print_summary(&self) {
        println!("=== Theta Precompute: {} ===", self.workload);
        println!("Cells computed:  {}", self.cells_computed);
        println!("Cells reused:    {}", self.cells_reused);
        println!("Phases:          {}", self.phases_annotated);
        println!("Duration:        {:.2?}", self.duration);
    }
}

enum CellOutcome {
    Computed(usize),
    Reused(usize),
}

/// Entry point for theta computation and lookup
pub struct ThetaEngine {
    config: ThetaConfig,
    store: ProfileStore,
    registry: PhaseRegistry,
    /// Cells whose sequences carry theta annotations
    annotated: RwLock<HashSet<(Workload, AllocPoint)>>,
    /// Cooperative cancellation, checked between phase iterations
    cancelled: Arc<AtomicBool>,
    show_progress: bool,
}

impl ThetaEngine {
    /// Create an engine over a profile source root
    pub fn new(config: ThetaConfig) -> Self {
        let store = ProfileStore::new(&config.root, config.grid);
        let registry = PhaseRegistry::new(config.grid);
        Self {
            config,
            store,
            registry,
            annotated: RwLock::new(HashSet::new()),
            cancelled: Arc::new(AtomicBool::new(false)),
            show_progress: false,
        }
    }

    /// Enable the precompute progress bar
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Engine configuration
    pub fn config(&self) -> &ThetaConfig {
        &self.config
    }

    /// Profile store backing this engine
    pub fn store(&self) -> &ProfileStore {
        &self.store
    }

    /// Shared cancellation flag for external controllers
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Request cooperative cancellation of in-flight computation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Load one cell's sequence, bounding the I/O by the configured timeout
    fn load_with_timeout(&self, workload: Workload, point: AllocPoint) -> Result<PhaseSequence> {
        let Some(timeout) = self.config.load_timeout else {
            return self.store.load(workload, point);
        };

        let store = self.store.clone();
        let (tx, rx) = crossbeam::channel::bounded(1);
        std::thread::spawn(move || {
            let _ = tx.send(store.load(workload, point));
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(_) => Err(ThetaError::Timeout(timeout)),
        }
    }

    /// Build (or return the already-built) phase sequence for one cell
    ///
    /// Absence of profile data is not an error here: the caller may skip
    /// that grid cell.
    pub fn get_phase_entries(
        &self,
        workload: Workload,
        point: AllocPoint,
    ) -> Result<Option<Arc<PhaseSequence>>> {
        if let Some(seq) = self.registry.get(workload, point) {
            return Ok(Some(seq));
        }

        match self.load_with_timeout(workload, point) {
            Ok(seq) => {
                let seq = Arc::new(seq);
                self.registry.insert(workload, Arc::clone(&seq));
                Ok(Some(seq))
            }
            Err(e) if e.is_recoverable() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Load every populated cell of a workload into the registry
    fn ensure_all_loaded(&self, workload: Workload) -> Result<()> {
        for point in self.store.scan_points(workload)? {
            self.get_phase_entries(workload, point)?;
        }
        Ok(())
    }

    fn is_annotated(&self, workload: Workload, point: AllocPoint) -> bool {
        self.annotated.read().unwrap().contains(&(workload, point))
    }

    fn mark_annotated(&self, workload: Workload, point: AllocPoint) {
        self.annotated.write().unwrap().insert((workload, point));
    }

    /// Compute (or reuse) theta tables for one cell and return the
    /// annotated sequence
    ///
    /// Every other populated cell of the workload is load-attempted first
    /// so cross-allocation comparisons see the full dataset; the result is
    /// cached and the sidecar persisted.
    pub fn get_theta_entries(
        &self,
        workload: Workload,
        point: AllocPoint,
    ) -> Result<Option<Arc<PhaseSequence>>> {
        if self.is_annotated(workload, point) {
            return Ok(self.registry.get(workload, point));
        }

        self.ensure_all_loaded(workload)?;
        let Some(seq) = self.registry.get(workload, point) else {
            return Ok(None);
        };

        let (annotated, _) = self.annotate_cell(workload, &seq)?;
        let annotated = Arc::new(annotated);
        self.registry.insert(workload, Arc::clone(&annotated));
        self.mark_annotated(workload, point);
        Ok(Some(annotated))
    }

    /// Direct indexed access to one annotated phase record
    pub fn get_theta_sub_entry(
        &self,
        workload: Workload,
        point: AllocPoint,
        index: usize,
    ) -> Result<PhaseRecord> {
        let seq = self
            .get_theta_entries(workload, point)?
            .ok_or(ThetaError::ProfileNotFound { workload, point })?;
        seq.get(index).cloned()
    }

    /// Release every cached phase sequence for every workload
    pub fn release_all(&self) {
        self.registry.release_all();
        self.annotated.write().unwrap().clear();
        debug!("released all phase sequences");
    }

    /// Annotate one cell, honoring the sidecar reuse path
    fn annotate_cell(
        &self,
        workload: Workload,
        seq: &PhaseSequence,
    ) -> Result<(PhaseSequence, CellOutcome)> {
        let sidecar = sidecar_for(self.store.root(), workload, seq.point());

        if self.config.reuse_existing && sidecar.exists() {
            let annotated = sidecar.read_into(seq)?;
            debug!(workload = %workload, point = %seq.point(), "reused theta sidecar");
            let phases = annotated.len();
            return Ok((annotated, CellOutcome::Reused(phases)));
        }

        let snapshot = self.registry.snapshot(workload);
        let annotated = annotate_sequence(&snapshot, seq, &self.cancelled)?;
        sidecar.write_sequence(&annotated)?;
        let phases = annotated.len();
        Ok((annotated, CellOutcome::Computed(phases)))
    }

    /// Precompute theta tables for every populated cell of a workload
    ///
    /// Sequences are loaded up front and shared read-only; the cells are
    /// then sharded across a rayon pool, each worker owning exactly one
    /// cell's annotation and sidecar write.
    pub fn precompute(&self, workload: Workload) -> Result<PrecomputeSummary> {
        let started = Instant::now();

        let points = self.store.scan_points(workload)?;
        if points.is_empty() {
            warn!(workload = %workload, "no populated allocation points");
            return Ok(PrecomputeSummary {
                workload,
                cells_computed: 0,
                cells_reused: 0,
                phases_annotated: 0,
                duration: started.elapsed(),
            });
        }

        for &point in &points {
            if self.cancelled.load(Ordering::SeqCst) {
                return Err(ThetaError::Cancelled);
            }
            self.get_phase_entries(workload, point)?;
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.effective_threads())
            .build()
            .map_err(|e| ThetaError::ThreadPoolError(e.to_string()))?;

        let progress = if self.show_progress {
            let bar = ProgressBar::new(points.len() as u64);
            bar.set_style(
                ProgressStyle::with_template(
                    "{msg} [{bar:40.cyan/blue}] {pos}/{len} cells ({eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
            );
            bar.set_message(workload.as_str());
            bar
        } else {
            ProgressBar::hidden()
        };

        let outcomes: Result<Vec<CellOutcome>> = pool.install(|| {
            points
                .par_iter()
                .map(|&point| {
                    if self.cancelled.load(Ordering::SeqCst) {
                        return Err(ThetaError::Cancelled);
                    }
                    let seq = self
                        .registry
                        .get(workload, point)
                        .ok_or(ThetaError::ProfileNotFound { workload, point })?;

                    let (annotated, outcome) = self.annotate_cell(workload, &seq)?;
                    self.registry.insert(workload, Arc::new(annotated));
                    self.mark_annotated(workload, point);
                    progress.inc(1);
                    Ok(outcome)
                })
                .collect()
        });
        progress.finish_and_clear();
        let outcomes = outcomes?;

        let mut summary = PrecomputeSummary {
            workload,
            cells_computed: 0,
            cells_reused: 0,
            phases_annotated: 0,
            duration: started.elapsed(),
        };
        for outcome in outcomes {
            match outcome {
                CellOutcome::Computed(phases) => {
                    summary.cells_computed += 1;
                    summary.phases_annotated += phases;
                }
                CellOutcome::Reused(phases) => {
                    summary.cells_reused += 1;
                    summary.phases_annotated += phases;
                }
            }
        }

        debug!(
            workload = %workload,
            computed = summary.cells_computed,
            reused = summary.cells_reused,
            elapsed = ?summary.duration,
            "precompute finished"
        );
        Ok(summary)
    }
}
