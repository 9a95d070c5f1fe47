//! Steering Pipeline Module
//!
//! ```text
//! DAY-AHEAD  forecast source ──► stage 1 sweep ──► prediction store
//!                 │ (unavailable: fail, or reuse latest prediction)
//! REAL-TIME  actual source ──► latest prediction ──► stage 2 ──► result
//!                 │ (unavailable: always fail)  │ (none stored: FULL search)
//! ```
//!
//! Sweeps are CPU-bound and run on tokio's blocking pool; sources are async.

mod service;

pub use service::{DayAheadRun, PipelineStats, RealtimeRun, SteeringService};

use serde::{Deserialize, Serialize};

/// What the day-ahead stage does when the forecast cannot be fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastFallback {
    /// Surface `ForecastUnavailable`
    #[default]
    Fail,
    /// Keep serving the most recent stored prediction
    ReuseLatest,
}
