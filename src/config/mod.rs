//! Configuration module for Thetagen
//!
//! Provides CLI argument parsing, runtime grid dimensions, and the engine
//! configuration.

mod settings;

pub use settings::*;
