//! Execution profile module
//!
//! Provides the phase-record data model, the on-disk profile layout, and
//! the store that parses per-allocation phase tables into validated
//! sequences.

pub mod layout;
mod record;
mod store;

pub use record::{
    AllocPoint, AxisPreference, PhaseRecord, PhaseSequence, ThetaEntry, ThetaTable, Workload,
    THETA_UNDEFINED,
};
pub use store::ProfileStore;
