//! Wake-steering optimization engine
//!
//! Exhaustive yaw search over an injected oracle, narrowed at run time by a
//! validated day-ahead prediction. Entirely deterministic given the oracle.
//!
//! - `search_space`: on-grid yaw candidates in a fixed enumeration order
//! - `brute_force`: parallel sweep with a deterministic max combiner
//! - `range_selector`: wind condition to search half-width and steering mode
//! - `forecast_validator`: forecast vs actual tolerance check
//! - `confidence`: per-turbine sensitivity around a day-ahead optimum
//! - `predictive`: the two-stage orchestrator

mod brute_force;
mod confidence;
mod forecast_validator;
mod predictive;
mod range_selector;
mod search_space;

pub use brute_force::{BruteForceOptimizer, ProgressCallback, SweepProgress, SweepSettings};
pub use confidence::{narrow_half_width, score_confidence, ConfidencePolicy, TurbineSensitivity};
pub use forecast_validator::{validate, ToleranceConfig, TolerancePreset, ValidationSettings};
pub use predictive::{PredictiveOptimizer, YawSettings};
pub use range_selector::{Combine, Interval, RangePolicy, RangeRule, RangeSelector};
pub use search_space::{
    floor_to_grid, grid_steps, yaw_power_loss_percent, SearchSpace, SearchSpaceIter,
};
