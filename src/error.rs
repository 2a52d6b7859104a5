//! Error types for Thetagen
//!
//! Separates the two failure classes of the theta pipeline: recoverable
//! absence (a grid cell simply has no profile data) and fatal integrity
//! violations (malformed or inconsistent profile data), plus distinct I/O
//! and operational errors.

use crate::profile::{AllocPoint, Workload};
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for theta precomputation operations
#[derive(Error, Debug)]
pub enum ThetaError {
    /// I/O error during profile or sidecar operations
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No profile data exists for this allocation point (recoverable)
    #[error("no profile for {workload} at cache {}, membw {}", point.cache, point.membw)]
    ProfileNotFound { workload: Workload, point: AllocPoint },

    /// Profile data failed an integrity check (fatal, non-continuable)
    #[error("corrupt profile '{path}' (line {line}): {message}")]
    CorruptProfile {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Sidecar theta table is malformed
    #[error("sidecar error at '{path}': {message}")]
    SidecarError { path: PathBuf, message: String },

    /// Observed rate violates the dataset's positivity contract (fatal)
    #[error("inconsistent rate for {workload} at {point}, phase {phase_idx}")]
    InconsistentRate {
        workload: Workload,
        point: AllocPoint,
        phase_idx: u32,
    },

    /// Requested phase index is out of range for the sequence
    #[error("phase index {index} out of range (sequence has {len} records)")]
    PhaseIndexOutOfRange { index: usize, len: usize },

    /// Allocation point outside the configured grid
    #[error("allocation point (cache {}, membw {}) outside {cache_levels}x{membw_levels} grid", point.cache, point.membw)]
    PointOutOfGrid {
        point: AllocPoint,
        cache_levels: u32,
        membw_levels: u32,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Thread pool error
    #[error("thread pool error: {0}")]
    ThreadPoolError(String),

    /// Operation cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// Profile load timed out
    #[error("profile load timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl ThetaError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a fatal profile-integrity error
    pub fn corrupt(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::CorruptProfile {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Create a sidecar parse/format error
    pub fn sidecar(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::SidecarError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Check if this error is recoverable (the caller may skip the cell)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ProfileNotFound { .. })
    }

    /// Check if this error is a fatal data-integrity violation
    pub fn is_integrity_violation(&self) -> bool {
        matches!(
            self,
            Self::CorruptProfile { .. }
                | Self::SidecarError { .. }
                | Self::InconsistentRate { .. }
        )
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. }
            | Self::CorruptProfile { path, .. }
            | Self::SidecarError { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Result type alias for theta operations
pub type Result<T> = std::result::Result<T, ThetaError>;

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| ThetaError::io(path, e))
    }
}
