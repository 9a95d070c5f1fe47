//! Forecast-vs-actual validation report

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::WindParameter;

/// Outcome of comparing one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterCheck {
    /// Absolute deviation (direction wraps at 360°)
    pub deviation: f64,
    /// Effective tolerance the deviation was compared against
    pub threshold: f64,
    pub passed: bool,
}

impl ParameterCheck {
    /// deviation / threshold; infinite for a non-zero deviation on a zero threshold.
    pub fn severity(&self) -> f64 {
        if self.threshold > 0.0 {
            self.deviation / self.threshold
        } else if self.deviation > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    }
}

/// Search scope recommended by the forecast validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchRecommendation {
    Narrow,
    Moderate,
    Full,
}

impl std::fmt::Display for SearchRecommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchRecommendation::Narrow => write!(f, "NARROW"),
            SearchRecommendation::Moderate => write!(f, "MODERATE"),
            SearchRecommendation::Full => write!(f, "FULL"),
        }
    }
}

/// Per-parameter checks and the overall recommendation. Computed fresh on
/// every real-time run, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub per_parameter: BTreeMap<WindParameter, ParameterCheck>,
    /// |actual − forecast| / forecast wind speed, zero for a calm forecast
    pub wind_speed_relative_deviation: f64,
    pub recommendation: SearchRecommendation,
}

impl ValidationReport {
    pub fn all_passed(&self) -> bool {
        self.per_parameter.values().all(|c| c.passed)
    }

    pub fn failed(&self) -> impl Iterator<Item = (&WindParameter, &ParameterCheck)> {
        self.per_parameter.iter().filter(|(_, c)| !c.passed)
    }
}
