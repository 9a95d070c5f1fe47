//! Wind-condition sources
//!
//! Forecast and measured conditions arrive through [`ConditionSource`]. A
//! source distinguishes a failed fetch from a window with no data so the
//! pipeline can apply its fallback policy; it never substitutes defaults.

mod json_lines;

pub use json_lines::{load_records, ConditionRecord, JsonLinesSource};

use async_trait::async_trait;
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

use crate::types::WindCondition;

/// Half-open time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn hour_starting(start: DateTime<Utc>) -> Self {
        Self::new(start, start + Duration::hours(1))
    }

    /// The clock hour `t` falls in.
    pub fn hour_containing(t: DateTime<Utc>) -> Self {
        let start = t.duration_trunc(Duration::hours(1)).unwrap_or(t);
        Self::hour_starting(start)
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t < self.end
    }

    pub fn midpoint(&self) -> DateTime<Utc> {
        self.start + (self.end - self.start) / 2
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} .. {}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    /// The source could not be reached or read.
    #[error("fetch failed: {0}")]
    Fetch(String),
    /// The source answered but holds nothing for the window.
    #[error("no data for {0}")]
    NoData(TimeWindow),
    /// The source returned a physically invalid condition.
    #[error("invalid condition: {0}")]
    Invalid(String),
}

/// Supplies the wind condition for a time window.
#[async_trait]
pub trait ConditionSource: Send + Sync {
    async fn fetch(&self, window: &TimeWindow) -> Result<WindCondition, SourceError>;

    /// Human-readable name for logging (e.g. "static", "jsonl:forecast.jsonl").
    fn source_name(&self) -> &str;
}

// ============================================================================
// Static Source (fixed condition, CLI flags and tests)
// ============================================================================

/// Answers every window with the same outcome.
pub struct StaticSource {
    outcome: Result<WindCondition, String>,
    has_data: bool,
}

impl StaticSource {
    pub fn new(condition: WindCondition) -> Self {
        Self {
            outcome: Ok(condition),
            has_data: true,
        }
    }

    /// A reachable source with no data.
    pub fn empty() -> Self {
        Self {
            outcome: Err(String::new()),
            has_data: false,
        }
    }

    /// An unreachable source.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            outcome: Err(reason.into()),
            has_data: true,
        }
    }
}

#[async_trait]
impl ConditionSource for StaticSource {
    async fn fetch(&self, window: &TimeWindow) -> Result<WindCondition, SourceError> {
        match (&self.outcome, self.has_data) {
            (Ok(condition), _) => {
                condition.validate().map_err(SourceError::Invalid)?;
                Ok(*condition)
            }
            (Err(_), false) => Err(SourceError::NoData(*window)),
            (Err(reason), true) => Err(SourceError::Fetch(reason.clone())),
        }
    }

    fn source_name(&self) -> &str {
        "static"
    }
}
