//! Configuration settings for Thetagen
//!
//! Defines CLI arguments, the runtime grid dimensions, and the engine
//! configuration assembled from them.

use crate::error::{Result, ThetaError};
use crate::profile::{AllocPoint, Workload};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Thetagen - theta table precomputation for real-time multicore schedulers
#[derive(Parser, Debug, Clone)]
#[command(name = "thetagen")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Precompute resource-sensitivity (theta) tables from phase profiles")]
#[command(long_about = r#"
Thetagen derives, for every phase of a profiled workload and every reachable
remaining-resource combination, the average throughput gain of granting more
cache ways or memory bandwidth. Results are written as theta sidecar tables
next to the phase profiles, for consumption by a runtime scheduling
controller.

Examples:
  thetagen --root ./profiles precompute
  thetagen --root ./profiles -w fft -w dedup -t 16 precompute
  thetagen --root ./profiles -w fft show --cache 2 --membw 3
"#)]
pub struct CliArgs {
    /// Profile source root directory
    #[arg(short = 'r', long = "root", value_name = "DIR", env = "THETAGEN_ROOT")]
    pub root: PathBuf,

    /// Workloads to operate on (repeatable; default: all supported)
    #[arg(short = 'w', long = "workload", value_enum, value_name = "NAME")]
    pub workloads: Vec<Workload>,

    /// Cache allocation levels in the grid
    #[arg(long, default_value = "20", value_name = "NUM")]
    pub cache_levels: u32,

    /// Memory bandwidth allocation levels in the grid
    #[arg(long, default_value = "20", value_name = "NUM")]
    pub membw_levels: u32,

    /// Number of worker threads (0 = auto-detect)
    #[arg(short = 't', long, default_value = "0", value_name = "NUM")]
    pub threads: usize,

    /// Reuse existing theta sidecars instead of recomputing
    #[arg(long)]
    pub reuse_existing: bool,

    /// Timeout for a single profile load (e.g. 5s, 500ms; 0 = unbounded)
    #[arg(long, default_value = "0s", value_name = "DURATION")]
    pub load_timeout: String,

    /// Quiet mode (suppress the progress bar)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// JSON config file; replaces the flag-derived configuration wholesale
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Compute theta tables for every populated allocation point
    Precompute,
    /// Print the annotated phase sequence for one allocation point
    Show {
        /// Cache allocation level
        #[arg(long, value_name = "LEVEL")]
        cache: u32,
        /// Memory bandwidth allocation level
        #[arg(long, value_name = "LEVEL")]
        membw: u32,
    },
    /// List populated allocation points per workload
    Scan,
}

/// Runtime grid dimensions for the allocation space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Number of cache allocation levels
    pub cache_levels: u32,
    /// Number of bandwidth allocation levels
    pub membw_levels: u32,
}

impl GridConfig {
    /// Create a grid; both dimensions must be non-zero
    pub fn new(cache_levels: u32, membw_levels: u32) -> Result<Self> {
        if cache_levels == 0 || membw_levels == 0 {
            return Err(ThetaError::config("grid dimensions must be non-zero"));
        }
        Ok(Self {
            cache_levels,
            membw_levels,
        })
    }

    /// Verify a point lies inside the grid
    pub fn check_point(&self, point: AllocPoint) -> Result<()> {
        if point.cache >= self.cache_levels || point.membw >= self.membw_levels {
            return Err(ThetaError::PointOutOfGrid {
                point,
                cache_levels: self.cache_levels,
                membw_levels: self.membw_levels,
            });
        }
        Ok(())
    }

    /// Largest remaining cache budget from `point`
    pub fn max_rem_cache(&self, point: AllocPoint) -> u32 {
        self.cache_levels - 1 - point.cache
    }

    /// Largest remaining bandwidth budget from `point`
    pub fn max_rem_membw(&self, point: AllocPoint) -> u32 {
        self.membw_levels - 1 - point.membw
    }

    /// Total number of grid cells
    pub fn cells(&self) -> usize {
        self.cache_levels as usize * self.membw_levels as usize
    }

    /// Iterate every allocation point in the grid
    pub fn points(&self) -> impl Iterator<Item = AllocPoint> + '_ {
        let membw_levels = self.membw_levels;
        (0..self.cache_levels)
            .flat_map(move |c| (0..membw_levels).map(move |b| AllocPoint::new(c, b)))
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cache_levels: 20,
            membw_levels: 20,
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThetaConfig {
    /// Profile source root
    pub root: PathBuf,
    /// Allocation grid dimensions
    pub grid: GridConfig,
    /// Worker threads for grid precomputation (0 = auto)
    pub threads: usize,
    /// Skip recomputation when a theta sidecar already exists
    pub reuse_existing: bool,
    /// Per-profile load timeout; `None` = unbounded
    pub load_timeout: Option<Duration>,
}

impl ThetaConfig {
    /// Build configuration from parsed CLI arguments
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        if let Some(path) = &args.config {
            return Self::load(path);
        }

        let timeout = args
            .load_timeout
            .parse::<humantime::Duration>()
            .map_err(|e| ThetaError::config(format!("invalid --load-timeout: {e}")))?;
        let load_timeout = if timeout.as_nanos() == 0 {
            None
        } else {
            Some(*timeout)
        };

        Ok(Self {
            root: args.root.clone(),
            grid: GridConfig::new(args.cache_levels, args.membw_levels)?,
            threads: args.threads,
            reuse_existing: args.reuse_existing,
            load_timeout,
        })
    }

    /// Workloads selected on the CLI, defaulting to all supported
    pub fn selected_workloads(args: &CliArgs) -> Vec<Workload> {
        if args.workloads.is_empty() {
            Workload::ALL.to_vec()
        } else {
            let mut ws: Vec<Workload> = Vec::new();
            for w in &args.workloads {
                if !ws.contains(w) {
                    ws.push(*w);
                }
            }
            ws
        }
    }

    /// Effective worker thread count
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ThetaError::io(path, e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| ThetaError::config(format!("bad config file: {e}")))?;
        GridConfig::new(config.grid.cache_levels, config.grid.membw_levels)?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ThetaError::config(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| ThetaError::io(path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_grid_bounds() {
        let grid = GridConfig::new(4, 6).unwrap();
        assert!(grid.check_point(AllocPoint::new(3, 5)).is_ok());
        assert!(grid.check_point(AllocPoint::new(4, 0)).is_err());
        assert!(grid.check_point(AllocPoint::new(0, 6)).is_err());
        assert!(GridConfig::new(0, 6).is_err());
    }

    #[test]
    fn test_remaining_budgets() {
        let grid = GridConfig::default();
        let point = AllocPoint::new(2, 3);
        assert_eq!(grid.max_rem_cache(point), 17);
        assert_eq!(grid.max_rem_membw(point), 16);
    }

    #[test]
    fn test_grid_points_enumeration() {
        let grid = GridConfig::new(2, 3).unwrap();
        let points: Vec<_> = grid.points().collect();
        assert_eq!(points.len(), grid.cells());
        assert_eq!(points[0], AllocPoint::new(0, 0));
        assert_eq!(points[5], AllocPoint::new(1, 2));
    }

    #[test]
    fn test_config_save_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("thetagen.json");
        let config = ThetaConfig {
            root: PathBuf::from("/profiles"),
            grid: GridConfig::new(8, 8).unwrap(),
            threads: 4,
            reuse_existing: true,
            load_timeout: Some(Duration::from_secs(5)),
        };
        config.save(&path).unwrap();

        let loaded = ThetaConfig::load(&path).unwrap();
        assert_eq!(loaded.grid, config.grid);
        assert!(loaded.reuse_existing);
        assert_eq!(loaded.load_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_from_cli_timeout_parse() {
        let args = CliArgs::try_parse_from([
            "thetagen",
            "--root",
            "/profiles",
            "--load-timeout",
            "250ms",
            "precompute",
        ])
        .unwrap();
        let config = ThetaConfig::from_cli(&args).unwrap();
        assert_eq!(config.load_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.grid, GridConfig::default());

        let args =
            CliArgs::try_parse_from(["thetagen", "--root", "/profiles", "precompute"]).unwrap();
        let config = ThetaConfig::from_cli(&args).unwrap();
        assert_eq!(config.load_timeout, None);
    }

    #[test]
    fn test_selected_workloads_default_all() {
        let args =
            CliArgs::try_parse_from(["thetagen", "--root", "/p", "precompute"]).unwrap();
        assert_eq!(ThetaConfig::selected_workloads(&args).len(), 4);

        let args = CliArgs::try_parse_from([
            "thetagen", "--root", "/p", "-w", "fft", "-w", "fft", "precompute",
        ])
        .unwrap();
        assert_eq!(ThetaConfig::selected_workloads(&args), vec![Workload::Fft]);
    }
}
