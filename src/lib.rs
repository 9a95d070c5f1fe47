//! Wake Steer: predictive wake-steering yaw optimization
//!
//! Picks per-turbine yaw offsets for a small wind farm so that upstream
//! wakes are deflected away from downstream rotors.
//!
//! ## Architecture
//!
//! - **Stage 1 (day-ahead)**: wide brute-force sweep under the forecast,
//!   stored as a [`Prediction`] with per-turbine confidence
//! - **Stage 2 (real-time)**: the forecast is validated against measured
//!   conditions and the search is scoped to NARROW, MODERATE or FULL
//! - **Oracle**: any [`SimulationOracle`]; a Gaussian-wake reference model ships
//!   with the crate

pub mod config;
pub mod error;
pub mod optimization;
pub mod oracle;
pub mod pipeline;
pub mod sources;
pub mod storage;
pub mod types;

pub use config::FarmConfig;
pub use error::{Result, WakeSteerError};

pub use types::{
    ConfidenceLevel, EvaluationResult, OptimizationResult, Prediction, PredictionAccuracy,
    RangeMode, RangeRecommendation, RealtimeOptimization, SearchBranch, SearchRecommendation,
    ValidationReport, WindCondition, WindParameter, YawVector,
};

pub use optimization::{
    BruteForceOptimizer, PredictiveOptimizer, RangeSelector, SearchSpace, SweepSettings,
    ToleranceConfig,
};

pub use oracle::{GaussianWakeModel, OracleOutput, SimulationError, SimulationOracle};

pub use pipeline::{ForecastFallback, SteeringService};
pub use sources::{ConditionSource, SourceError, TimeWindow};
pub use storage::{InMemoryPredictionStore, PredictionStore, SledPredictionStore, StoreError};
