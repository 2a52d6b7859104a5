//! Sensitivity engine module
//!
//! Provides the per-phase theta computation, the workload sequence
//! registry, and the orchestrating engine with its parallel grid
//! precomputation.

mod registry;
mod runner;
mod sensitivity;

pub use registry::{GridSnapshot, PhaseRegistry};
pub use runner::{PrecomputeSummary, ThetaEngine};
pub use sensitivity::{annotate_sequence, compute_phase_theta};
