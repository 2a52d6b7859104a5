//! Theta persistence module
//!
//! Sidecar tables memoizing computed sensitivity scores next to the phase
//! profiles they annotate.

mod sidecar;

pub use sidecar::{format_row, parse_row, sidecar_for, ThetaRow, ThetaSidecar};
