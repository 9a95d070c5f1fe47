//! Sled-backed prediction store
//!
//! One tree, keys are big-endian creation nanoseconds, values are JSON.

use chrono::{DateTime, Utc};
use sled::Db;
use std::path::Path;
use tracing::{debug, info};

use super::persistence::{storage_key, PredictionStore, StoreError};
use crate::types::Prediction;

const TREE: &str = "predictions";

pub struct SledPredictionStore {
    db: Db,
    tree: sled::Tree,
}

impl SledPredictionStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref())?;
        let tree = db.open_tree(TREE)?;
        info!(path = %path.as_ref().display(), stored = tree.len(), "Prediction store opened");
        Ok(Self { db, tree })
    }

    /// Temporary store, removed on drop.
    pub fn open_temp() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        let tree = db.open_tree(TREE)?;
        Ok(Self { db, tree })
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Prediction, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl PredictionStore for SledPredictionStore {
    fn put(&self, prediction: &Prediction) -> Result<(), StoreError> {
        let key = storage_key(prediction.created_at)?;
        let value = serde_json::to_vec(prediction)?;
        self.tree
            .compare_and_swap(key, None as Option<&[u8]>, Some(value))?
            .map_err(|_| StoreError::AlreadyExists(prediction.created_at))?;
        self.tree.flush()?;
        debug!(created_at = %prediction.created_at, "Prediction stored");
        Ok(())
    }

    fn get_latest(&self) -> Result<Prediction, StoreError> {
        match self.tree.last()? {
            Some((_, value)) => Self::decode(&value),
            None => Err(StoreError::NotFound),
        }
    }

    fn get(&self, created_at: DateTime<Utc>) -> Result<Option<Prediction>, StoreError> {
        let key = storage_key(created_at)?;
        self.tree
            .get(key)?
            .map(|value| Self::decode(&value))
            .transpose()
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<Prediction>, StoreError> {
        self.tree
            .iter()
            .rev()
            .take(limit)
            .map(|entry| {
                let (_, value) = entry?;
                Self::decode(&value)
            })
            .collect()
    }

    fn backend_name(&self) -> &'static str {
        "sled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::persistence::tests::make_prediction;

    #[test]
    fn round_trips_and_orders_by_creation_time() {
        let store = SledPredictionStore::open_temp().unwrap();
        assert!(matches!(store.get_latest(), Err(StoreError::NotFound)));

        store.put(&make_prediction(7200, 10.0)).unwrap();
        store.put(&make_prediction(3600, 9.0)).unwrap();
        assert_eq!(store.len(), 2);

        let latest = store.get_latest().unwrap();
        assert_eq!(latest, make_prediction(7200, 10.0));
        let recent = store.list_recent(1).unwrap();
        assert_eq!(recent, vec![make_prediction(7200, 10.0)]);
    }

    #[test]
    fn rejects_overwrites() {
        let store = SledPredictionStore::open_temp().unwrap();
        store.put(&make_prediction(0, 8.0)).unwrap();
        let err = store.put(&make_prediction(0, 11.0)).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
        let kept = store.get(make_prediction(0, 0.0).created_at).unwrap().unwrap();
        assert_eq!(kept.forecast.wind_speed, 8.0);
    }

    #[test]
    fn sub_millisecond_predictions_do_not_collide() {
        let store = SledPredictionStore::open_temp().unwrap();
        let first = make_prediction(0, 8.0);
        let mut second = make_prediction(0, 9.0);
        second.created_at = first.created_at + chrono::Duration::nanoseconds(250);

        store.put(&first).unwrap();
        store.put(&second).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.get_latest().unwrap().forecast.wind_speed, 9.0);
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions");
        {
            let store = SledPredictionStore::open(&path).unwrap();
            store.put(&make_prediction(60, 8.5)).unwrap();
            store.flush().unwrap();
        }
        let store = SledPredictionStore::open(&path).unwrap();
        assert_eq!(store.get_latest().unwrap().forecast.wind_speed, 8.5);
    }
}
