//! PredictionStore trait and the in-memory backend

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::types::Prediction;

/// Append-only store of predictions keyed by `created_at`.
///
/// Implementations must be thread-safe (Send + Sync): stage-2 runs read the
/// latest prediction from blocking worker threads.
pub trait PredictionStore: Send + Sync {
    /// Store a new prediction. Fails with `AlreadyExists` if one with the same
    /// creation time (nanosecond resolution) is present.
    fn put(&self, prediction: &Prediction) -> Result<(), StoreError>;

    /// Most recently created prediction, or `NotFound` when the store is empty.
    fn get_latest(&self) -> Result<Prediction, StoreError>;

    /// Prediction created at exactly `created_at`.
    fn get(&self, created_at: DateTime<Utc>) -> Result<Option<Prediction>, StoreError>;

    /// Most recent first.
    fn list_recent(&self, limit: usize) -> Result<Vec<Prediction>, StoreError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no prediction stored")]
    NotFound,
    #[error("a prediction created at {0} is already stored")]
    AlreadyExists(DateTime<Utc>),
    #[error("prediction timestamp {0} is outside the storable range")]
    InvalidTimestamp(DateTime<Utc>),
    #[error("database error: {0}")]
    Database(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("storage lock poisoned: {0}")]
    Poisoned(String),
}

/// Big-endian nanosecond key: byte order equals chronological order.
/// Representable from 1970 to 2262.
pub(crate) fn storage_key(created_at: DateTime<Utc>) -> Result<[u8; 8], StoreError> {
    created_at
        .timestamp_nanos_opt()
        .and_then(|nanos| u64::try_from(nanos).ok())
        .map(u64::to_be_bytes)
        .ok_or(StoreError::InvalidTimestamp(created_at))
}

/// In-memory store. Thread-safe via `RwLock`, not durable.
#[derive(Default)]
pub struct InMemoryPredictionStore {
    predictions: RwLock<BTreeMap<[u8; 8], Prediction>>,
}

impl InMemoryPredictionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.predictions.read().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PredictionStore for InMemoryPredictionStore {
    fn put(&self, prediction: &Prediction) -> Result<(), StoreError> {
        let key = storage_key(prediction.created_at)?;
        let mut store = self
            .predictions
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        if store.contains_key(&key) {
            return Err(StoreError::AlreadyExists(prediction.created_at));
        }
        store.insert(key, prediction.clone());
        Ok(())
    }

    fn get_latest(&self) -> Result<Prediction, StoreError> {
        let store = self
            .predictions
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        store
            .values()
            .next_back()
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn get(&self, created_at: DateTime<Utc>) -> Result<Option<Prediction>, StoreError> {
        let key = storage_key(created_at)?;
        let store = self
            .predictions
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(store.get(&key).cloned())
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<Prediction>, StoreError> {
        let store = self
            .predictions
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(store.values().rev().take(limit).cloned().collect())
    }

    fn backend_name(&self) -> &'static str {
        "in-memory"
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{ConfidenceLevel, RangeMode, WindCondition, YawVector};
    use chrono::TimeZone;

    pub(crate) fn make_prediction(secs: i64, speed: f64) -> Prediction {
        Prediction {
            forecast: WindCondition::new(speed, 270.0, 0.07),
            predicted_yaw: YawVector::new(vec![-5.0, -4.0, -3.0, 0.0]),
            per_turbine_confidence: vec![ConfidenceLevel::Medium; 4],
            search_half_width: 2.0,
            created_at: Utc.timestamp_opt(1_760_000_000 + secs, 0).unwrap(),
            range_mode: RangeMode::Balanced,
            expected_total_power: 4600.0,
            expected_improvement_percent: 4.5,
            complete: true,
        }
    }

    #[test]
    fn empty_store_reports_not_found() {
        let store = InMemoryPredictionStore::new();
        assert!(matches!(store.get_latest(), Err(StoreError::NotFound)));
        assert!(store.is_empty());
    }

    #[test]
    fn latest_is_by_creation_time_not_insertion_order() {
        let store = InMemoryPredictionStore::new();
        store.put(&make_prediction(3600, 9.0)).unwrap();
        store.put(&make_prediction(0, 8.0)).unwrap();

        assert_eq!(store.get_latest().unwrap().forecast.wind_speed, 9.0);
        let recent = store.list_recent(5).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[1].forecast.wind_speed, 8.0);
    }

    #[test]
    fn put_is_append_only() {
        let store = InMemoryPredictionStore::new();
        let p = make_prediction(0, 8.0);
        store.put(&p).unwrap();
        let err = store.put(&make_prediction(0, 12.0)).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
        assert_eq!(store.get(p.created_at).unwrap(), Some(p));
    }

    #[test]
    fn predictions_within_one_millisecond_are_both_kept() {
        let store = InMemoryPredictionStore::new();
        let first = make_prediction(0, 8.0);
        let mut second = make_prediction(0, 9.0);
        second.created_at = first.created_at + chrono::Duration::microseconds(1);

        store.put(&first).unwrap();
        store.put(&second).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_latest().unwrap(), second);
        assert_eq!(store.get(first.created_at).unwrap(), Some(first));
    }

    #[test]
    fn keys_sort_chronologically() {
        let early = storage_key(Utc.timestamp_opt(255, 0).unwrap()).unwrap();
        let late = storage_key(Utc.timestamp_opt(256, 0).unwrap()).unwrap();
        assert!(early < late);
        assert!(storage_key(Utc.timestamp_opt(-1, 0).unwrap()).is_err());
        assert!(storage_key(Utc.with_ymd_and_hms(2300, 1, 1, 0, 0, 0).unwrap()).is_err());
    }
}
