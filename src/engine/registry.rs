//! Phase sequence registry
//!
//! One owned two-dimensional grid of phase sequences per workload, behind a
//! single map keyed by workload identity. Sequences are built once, cached
//! as `Arc`s, and shared read-only; annotating a cell swaps in a fresh
//! sequence rather than mutating the shared one.

use crate::config::GridConfig;
use crate::profile::{AllocPoint, PhaseSequence, Workload};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type Grid = Vec<Option<Arc<PhaseSequence>>>;

/// Read-only view of one workload's grid at a point in time
///
/// Taken before a sensitivity pass so cross-allocation comparisons see a
/// consistent set of sequences regardless of concurrent cell updates.
#[derive(Debug, Clone)]
pub struct GridSnapshot {
    grid: GridConfig,
    cells: Grid,
}

impl GridSnapshot {
    /// Grid dimensions of the snapshot
    pub fn grid(&self) -> GridConfig {
        self.grid
    }

    /// Sequence at an allocation point, if that cell is populated
    pub fn get(&self, point: AllocPoint) -> Option<&Arc<PhaseSequence>> {
        if self.grid.check_point(point).is_err() {
            return None;
        }
        self.cells[cell_index(self.grid, point)].as_ref()
    }

    /// Number of populated cells
    pub fn populated(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}

fn cell_index(grid: GridConfig, point: AllocPoint) -> usize {
    point.cache as usize * grid.membw_levels as usize + point.membw as usize
}

/// Cache of constructed phase sequences for all workloads
#[derive(Debug)]
pub struct PhaseRegistry {
    grid: GridConfig,
    workloads: RwLock<HashMap<Workload, Grid>>,
}

impl PhaseRegistry {
    /// Create an empty registry for the given grid dimensions
    pub fn new(grid: GridConfig) -> Self {
        Self {
            grid,
            workloads: RwLock::new(HashMap::new()),
        }
    }

    /// Grid dimensions
    pub fn grid(&self) -> GridConfig {
        self.grid
    }

    /// Cached sequence for one cell, if present
    pub fn get(&self, workload: Workload, point: AllocPoint) -> Option<Arc<PhaseSequence>> {
        if self.grid.check_point(point).is_err() {
            return None;
        }
        let map = self.workloads.read().unwrap();
        map.get(&workload)
            .and_then(|grid| grid[cell_index(self.grid, point)].clone())
    }

    /// Cache (or replace) the sequence for one cell
    pub fn insert(&self, workload: Workload, seq: Arc<PhaseSequence>) {
        let point = seq.point();
        debug_assert!(self.grid.check_point(point).is_ok());
        debug_assert_eq!(seq.workload(), workload);

        let mut map = self.workloads.write().unwrap();
        let grid = map
            .entry(workload)
            .or_insert_with(|| vec![None; self.grid.cells()]);
        grid[cell_index(self.grid, point)] = Some(seq);
    }

    /// Take a read-only snapshot of one workload's grid
    pub fn snapshot(&self, workload: Workload) -> GridSnapshot {
        let map = self.workloads.read().unwrap();
        let cells = map
            .get(&workload)
            .cloned()
            .unwrap_or_else(|| vec![None; self.grid.cells()]);
        GridSnapshot {
            grid: self.grid,
            cells,
        }
    }

    /// Number of populated cells for a workload
    pub fn populated(&self, workload: Workload) -> usize {
        let map = self.workloads.read().unwrap();
        map.get(&workload)
            .map(|grid| grid.iter().filter(|c| c.is_some()).count())
            .unwrap_or(0)
    }

    /// Release every cached sequence for every workload
    pub fn release_all(&self) {
        self.workloads.write().unwrap().clear();
    }
}
