//! Sweep results and stage-2 outcome types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{RangeRecommendation, ValidationReport, WindCondition, YawVector};

/// One oracle evaluation of one yaw vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub yaw: YawVector,
    /// Farm power (kW)
    pub total_power: f64,
    /// Per-turbine power (kW), index-aligned to `yaw`
    pub per_turbine_power: Vec<f64>,
}

/// A candidate the oracle could not evaluate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateFailure {
    /// Position in the search space enumeration order
    pub index: u64,
    pub yaw: YawVector,
    pub reason: String,
}

/// Outcome of one brute-force sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    /// Condition the sweep was evaluated under
    pub wind: WindCondition,
    /// Highest-power vector among the baseline and every evaluated candidate
    pub best: EvaluationResult,
    /// Enumeration index of `best`, `None` when the baseline was never beaten
    pub best_index: Option<u64>,
    /// All-zero yaw evaluation
    pub baseline: EvaluationResult,
    /// Size of the searched space
    pub search_size: u64,
    /// Candidates actually evaluated (including failed ones)
    pub combinations_tested: u64,
    /// Candidates the oracle failed on, excluded from the maximum
    pub failed_candidates: u64,
    /// Lowest-index failures in enumeration order, capped by
    /// `sweep.max_failure_diagnostics`
    pub diagnostics: Vec<CandidateFailure>,
    /// (best − baseline) / baseline × 100, zero when the baseline produces nothing
    pub improvement_percent: f64,
    pub wall_time: Duration,
    /// False when the sweep was cancelled before covering the space
    pub complete: bool,
}

impl OptimizationResult {
    /// Result for a sweep that was skipped: the baseline is reported as optimal.
    pub fn baseline_only(wind: WindCondition, baseline: EvaluationResult, wall_time: Duration) -> Self {
        Self {
            wind,
            best: baseline.clone(),
            best_index: None,
            baseline,
            search_size: 0,
            combinations_tested: 0,
            failed_candidates: 0,
            diagnostics: Vec::new(),
            improvement_percent: 0.0,
            wall_time,
            complete: true,
        }
    }

    /// Extra farm power over the baseline (kW).
    pub fn power_gain_kw(&self) -> f64 {
        self.best.total_power - self.baseline.total_power
    }

    /// Extra energy per year if this gain were sustained (MWh/year).
    pub fn annual_energy_gain_mwh(&self, hours_per_year: f64) -> f64 {
        self.power_gain_kw() * hours_per_year / 1000.0
    }

    /// Extra revenue per year at `price_per_mwh`.
    pub fn annual_revenue_gain(&self, price_per_mwh: f64, hours_per_year: f64) -> f64 {
        self.annual_energy_gain_mwh(hours_per_year) * price_per_mwh
    }
}

/// Percentage improvement of `best` over `baseline`.
pub fn improvement_percent(best_power: f64, baseline_power: f64) -> f64 {
    if baseline_power > 0.0 {
        (best_power - baseline_power) / baseline_power * 100.0
    } else {
        0.0
    }
}

/// Which search the real-time stage ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchBranch {
    /// Prediction-centred search at the predicted half-width
    Narrow,
    /// Prediction-centred search at twice the predicted half-width
    Moderate,
    /// Zero-centred search over the range recommended for the actual condition
    Full,
}

impl std::fmt::Display for SearchBranch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchBranch::Narrow => write!(f, "NARROW"),
            SearchBranch::Moderate => write!(f, "MODERATE"),
            SearchBranch::Full => write!(f, "FULL"),
        }
    }
}

/// Stage-2 output: the sweep result annotated with how it was obtained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeOptimization {
    pub branch: SearchBranch,
    /// Validation of the forecast against the actual condition, absent when
    /// no prediction was available
    pub validation: Option<ValidationReport>,
    /// Range recommendation used by a FULL search
    pub range: Option<RangeRecommendation>,
    pub center: YawVector,
    pub half_width: f64,
    pub result: OptimizationResult,
}
