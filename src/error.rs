//! Crate-level error taxonomy
//!
//! Cancellation is not represented here: a cancelled sweep returns its partial
//! best with `complete = false`.

use crate::oracle::SimulationError;
use crate::sources::SourceError;
use crate::storage::StoreError;

/// Errors surfaced by the optimization engine.
#[derive(Debug, thiserror::Error)]
pub enum WakeSteerError {
    /// Invalid range/step/threshold input. Caught before a sweep starts.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The oracle could not evaluate the all-zero baseline.
    #[error("baseline simulation failed: {0}")]
    SimulationFailure(#[from] SimulationError),

    /// A forecast or measured wind condition outside its physical range.
    #[error("invalid wind condition: {0}")]
    InvalidCondition(String),

    #[error("forecast unavailable: {0}")]
    ForecastUnavailable(SourceError),

    #[error("actual conditions unavailable: {0}")]
    ActualDataUnavailable(SourceError),

    #[error("prediction store: {0}")]
    Store(#[from] StoreError),

    /// A blocking sweep task panicked or was aborted.
    #[error("worker task failed: {0}")]
    Worker(String),
}

impl From<crate::config::ConfigError> for WakeSteerError {
    fn from(err: crate::config::ConfigError) -> Self {
        WakeSteerError::Configuration(err.to_string())
    }
}

pub type Result<T, E = WakeSteerError> = std::result::Result<T, E>;
