//! Prediction persistence
//!
//! Day-ahead predictions are write-once records keyed by creation time:
//! - `InMemoryPredictionStore`: tests and one-shot CLI runs
//! - `SledPredictionStore`: durable embedded store for the service

mod persistence;
mod sled_store;

pub use persistence::{InMemoryPredictionStore, PredictionStore, StoreError};
pub use sled_store::SledPredictionStore;
