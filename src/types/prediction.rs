//! Day-ahead prediction artefact

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RangeMode, WindCondition, YawVector};

/// How sharply total power peaks around a turbine's predicted yaw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfidenceLevel::Low => write!(f, "low"),
            ConfidenceLevel::Medium => write!(f, "medium"),
            ConfidenceLevel::High => write!(f, "high"),
        }
    }
}

/// Stage-1 output. Written once, read by any number of stage-2 runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub forecast: WindCondition,
    pub predicted_yaw: YawVector,
    pub per_turbine_confidence: Vec<ConfidenceLevel>,
    /// Half-width (degrees) for a NARROW stage-2 search
    pub search_half_width: f64,
    pub created_at: DateTime<Utc>,
    /// Range mode the day-ahead sweep ran under
    pub range_mode: RangeMode,
    /// Farm power expected at `predicted_yaw` under the forecast (kW)
    pub expected_total_power: f64,
    /// Expected improvement over the baseline under the forecast (%)
    pub expected_improvement_percent: f64,
    /// False when the day-ahead sweep was cancelled early
    pub complete: bool,
}

/// How close a prediction came to the real-time optimum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionAccuracy {
    /// Mean absolute per-turbine yaw error (degrees)
    pub mean_abs_error_deg: f64,
    pub grade: AccuracyGrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyGrade {
    /// Within ±2°
    Excellent,
    /// Within ±4°
    Good,
    Poor,
}

impl PredictionAccuracy {
    pub fn between(predicted: &YawVector, optimal: &YawVector) -> Self {
        let mean_abs_error_deg = predicted.mean_abs_difference(optimal);
        let grade = if mean_abs_error_deg <= 2.0 {
            AccuracyGrade::Excellent
        } else if mean_abs_error_deg <= 4.0 {
            AccuracyGrade::Good
        } else {
            AccuracyGrade::Poor
        };
        Self {
            mean_abs_error_deg,
            grade,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_grades() {
        let p = YawVector::new(vec![-4.0, 3.0, 0.0, 1.0]);
        let exact = PredictionAccuracy::between(&p, &p);
        assert_eq!(exact.grade, AccuracyGrade::Excellent);
        assert_eq!(exact.mean_abs_error_deg, 0.0);

        let off = YawVector::new(vec![0.0, 0.0, 4.0, 5.0]);
        let acc = PredictionAccuracy::between(&p, &off);
        assert!((acc.mean_abs_error_deg - 3.75).abs() < 1e-9);
        assert_eq!(acc.grade, AccuracyGrade::Good);
    }
}
