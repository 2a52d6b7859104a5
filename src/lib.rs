//! # Thetagen - Resource-Sensitivity Table Precomputation
//!
//! Thetagen precomputes, for a workload executing under a real-time
//! multicore scheduler, tables of resource-sensitivity scores ("theta")
//! that estimate how much a running program phase would gain from
//! additional cache-way and memory-bandwidth allocation. A runtime
//! scheduling controller consumes the tables to decide which resource
//! dimension to grant when capacity becomes available.
//!
//! ## Pipeline
//!
//! - **Profile Store**: parses per-allocation phase tables
//!   (`<root>/<workload>/<cache-bits>_<membw>/phases.txt`) into ordered,
//!   contiguous phase sequences, rejecting any integrity violation.
//! - **Phase Locator**: maps an instruction count to the covering phase,
//!   extrapolating with the final phase past known history.
//! - **Sensitivity Engine**: for every phase and every reachable
//!   remaining-resource pair, averages the (clamped) throughput gains over
//!   all candidate allocations and picks the better axis.
//! - **Theta Store**: persists the scores as `theta.txt` sidecars so later
//!   runs can reuse them.
//!
//! ## Quick Start
//!
//! ```no_run
//! use thetagen::config::{GridConfig, ThetaConfig};
//! use thetagen::engine::ThetaEngine;
//! use thetagen::profile::{AllocPoint, Workload};
//!
//! let config = ThetaConfig {
//!     root: "/profiles".into(),
//!     grid: GridConfig::default(),
//!     threads: 0,
//!     reuse_existing: false,
//!     load_timeout: None,
//! };
//! let engine = ThetaEngine::new(config);
//!
//! let summary = engine.precompute(Workload::Fft).unwrap();
//! summary.print_summary();
//!
//! // controller hot path
//! let record = engine
//!     .get_theta_sub_entry(Workload::Fft, AllocPoint::new(2, 3), 0)
//!     .unwrap();
//! println!("theta at rem (1,0): {:?}", record.theta.value(1, 0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod error;
pub mod profile;
pub mod theta;

// Re-export commonly used types
pub use config::{GridConfig, ThetaConfig};
pub use engine::ThetaEngine;
pub use error::{Result, ThetaError};
pub use profile::{AllocPoint, PhaseRecord, PhaseSequence, Workload};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use thetagen::prelude::*;
    //! ```

    pub use crate::config::{CliArgs, GridConfig, ThetaConfig};
    pub use crate::engine::{PrecomputeSummary, ThetaEngine};
    pub use crate::error::{Result, ThetaError};
    pub use crate::profile::{
        AllocPoint, AxisPreference, PhaseRecord, PhaseSequence, ProfileStore, ThetaEntry,
        ThetaTable, Workload,
    };
    pub use crate::theta::ThetaSidecar;
}
