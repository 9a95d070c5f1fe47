//! JSON-lines condition files
//!
//! One record per line:
//! `{"timestamp":"2026-03-01T12:00:00Z","wind_speed":8.5,"wind_direction":270,"turbulence_intensity":0.07}`
//! Turbulence may be omitted and defaults to 8 %.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{ConditionSource, SourceError, TimeWindow};
use crate::types::WindCondition;

const DEFAULT_TURBULENCE_INTENSITY: f64 = 0.08;

fn default_turbulence() -> f64 {
    DEFAULT_TURBULENCE_INTENSITY
}

/// One timestamped condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConditionRecord {
    pub timestamp: DateTime<Utc>,
    pub wind_speed: f64,
    pub wind_direction: f64,
    #[serde(default = "default_turbulence")]
    pub turbulence_intensity: f64,
}

impl ConditionRecord {
    pub fn condition(&self) -> WindCondition {
        WindCondition::new(
            self.wind_speed,
            self.wind_direction,
            self.turbulence_intensity,
        )
    }
}

/// Read every record of a JSON-lines file. Blank and malformed lines are
/// skipped with a warning.
pub async fn load_records(path: &Path) -> Result<Vec<ConditionRecord>, SourceError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SourceError::Fetch(format!("{}: {e}", path.display())))?;

    let mut records = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ConditionRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(file = %path.display(), line = n + 1, error = %e, "Skipping malformed condition record");
            }
        }
    }
    Ok(records)
}

/// File-backed source: answers a window with the record nearest its midpoint.
pub struct JsonLinesSource {
    path: PathBuf,
    name: String,
}

impl JsonLinesSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = format!("jsonl:{}", path.display());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConditionSource for JsonLinesSource {
    async fn fetch(&self, window: &TimeWindow) -> Result<WindCondition, SourceError> {
        let records = load_records(&self.path).await?;
        let mid = window.midpoint();

        let nearest = records
            .iter()
            .filter(|r| window.contains(r.timestamp))
            .min_by_key(|r| (r.timestamp - mid).num_milliseconds().abs())
            .ok_or(SourceError::NoData(*window))?;

        let condition = nearest.condition();
        condition.validate().map_err(SourceError::Invalid)?;
        debug!(source = %self.name, at = %nearest.timestamp, condition = %condition, "Condition fetched");
        Ok(condition)
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}
