//! Per-turbine confidence for a day-ahead optimum
//!
//! Each turbine is scored by how sharply farm power falls when that turbine
//! alone is moved one probe step either side of the optimum. A turbine whose
//! yaw barely matters is `low` confidence and gets the widest narrow search.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::brute_force::BruteForceOptimizer;
use super::search_space::floor_to_grid;
use crate::types::{ConfidenceLevel, EvaluationResult, WindCondition};

/// Thresholds and widths for confidence scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidencePolicy {
    /// Single-coordinate perturbation (degrees)
    pub probe_deg: f64,
    /// Power drop (% of optimum) at or above which a turbine is `high`
    pub high_drop_percent: f64,
    /// Power drop (% of optimum) at or above which a turbine is `medium`
    pub medium_drop_percent: f64,
    /// Stage-2 NARROW half-width per level (degrees)
    pub narrow_width_high: f64,
    pub narrow_width_medium: f64,
    pub narrow_width_low: f64,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            probe_deg: 1.0,
            high_drop_percent: 0.1,
            medium_drop_percent: 0.02,
            narrow_width_high: 1.0,
            narrow_width_medium: 2.0,
            narrow_width_low: 3.0,
        }
    }
}

impl ConfidencePolicy {
    pub fn classify(&self, drop_percent: f64) -> ConfidenceLevel {
        if drop_percent >= self.high_drop_percent {
            ConfidenceLevel::High
        } else if drop_percent >= self.medium_drop_percent {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn narrow_width(&self, level: ConfidenceLevel) -> f64 {
        match level {
            ConfidenceLevel::High => self.narrow_width_high,
            ConfidenceLevel::Medium => self.narrow_width_medium,
            ConfidenceLevel::Low => self.narrow_width_low,
        }
    }

    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.probe_deg.is_finite() || self.probe_deg <= 0.0 {
            problems.push(format!("confidence.probe_deg = {} must be > 0", self.probe_deg));
        }
        if !(self.high_drop_percent >= self.medium_drop_percent && self.medium_drop_percent >= 0.0)
        {
            problems.push(format!(
                "confidence thresholds must satisfy high ({}) >= medium ({}) >= 0",
                self.high_drop_percent, self.medium_drop_percent
            ));
        }
        let widths = [
            self.narrow_width_high,
            self.narrow_width_medium,
            self.narrow_width_low,
        ];
        if widths.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            problems.push("confidence narrow widths must be > 0".to_string());
        }
        if !(self.narrow_width_high <= self.narrow_width_medium
            && self.narrow_width_medium <= self.narrow_width_low)
        {
            problems.push(
                "confidence narrow widths must widen as confidence drops (high <= medium <= low)"
                    .to_string(),
            );
        }
        problems
    }
}

/// Sensitivity of one turbine around the optimum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurbineSensitivity {
    /// Relative power drop to the better probe (% of optimum); `None` when no
    /// probe could be evaluated
    pub drop_percent: Option<f64>,
    pub level: ConfidenceLevel,
}

/// Probe every turbine of `best` by ±`probe_deg`.
///
/// Probes beyond `limit_deg` or that the oracle rejects are skipped. A
/// negative drop (a probe beat the optimum, as at the edge of a clipped
/// search) counts as no drop.
pub fn score_confidence(
    optimizer: &BruteForceOptimizer,
    wind: &WindCondition,
    best: &EvaluationResult,
    limit_deg: f64,
    policy: &ConfidencePolicy,
) -> Vec<TurbineSensitivity> {
    (0..best.yaw.len())
        .map(|turbine| {
            let probe_power = probe_turbine(optimizer, wind, best, turbine, limit_deg, policy);
            let drop_percent = probe_power.map(|p| relative_drop(best.total_power, p));
            let level = drop_percent
                .map(|d| policy.classify(d.max(0.0)))
                .unwrap_or(ConfidenceLevel::Low);
            debug!(turbine, ?drop_percent, %level, "Turbine confidence");
            TurbineSensitivity {
                drop_percent,
                level,
            }
        })
        .collect()
}

/// Best farm power among the admissible probes of one turbine.
fn probe_turbine(
    optimizer: &BruteForceOptimizer,
    wind: &WindCondition,
    best: &EvaluationResult,
    turbine: usize,
    limit_deg: f64,
    policy: &ConfidencePolicy,
) -> Option<f64> {
    let center = best.yaw[turbine];
    [center - policy.probe_deg, center + policy.probe_deg]
        .into_iter()
        .filter(|angle| angle.abs() <= limit_deg + 1e-9)
        .filter_map(|angle| {
            let yaw = best.yaw.with_component(turbine, angle);
            optimizer.evaluate(&yaw, wind).ok().map(|e| e.total_power)
        })
        .reduce(f64::max)
}

fn relative_drop(optimum: f64, probe: f64) -> f64 {
    if optimum > 0.0 {
        (optimum - probe) / optimum * 100.0
    } else {
        0.0
    }
}

/// Stage-2 NARROW half-width: the widest per-turbine width, on the yaw grid
/// and never below one step.
pub fn narrow_half_width(levels: &[ConfidenceLevel], policy: &ConfidencePolicy, step: f64) -> f64 {
    let widest = levels
        .iter()
        .map(|l| policy.narrow_width(*l))
        .fold(0.0, f64::max);
    floor_to_grid(widest, step).max(step)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::SweepSettings;
    use crate::oracle::{OracleOutput, SimulationError, SimulationOracle};
    use crate::types::YawVector;
    use std::sync::Arc;

    /// 1000 kW per turbine at its target, falling with per-turbine curvature.
    struct Bowl {
        target: Vec<f64>,
        curvature: Vec<f64>,
        reject_above: f64,
    }

    impl SimulationOracle for Bowl {
        fn evaluate(
            &self,
            yaw: &YawVector,
            _wind: &WindCondition,
        ) -> Result<OracleOutput, SimulationError> {
            if yaw.iter().any(|a| *a > self.reject_above) {
                return Err(SimulationError::InvalidYaw(format!("{yaw}")));
            }
            let per = yaw
                .iter()
                .zip(&self.target)
                .zip(&self.curvature)
                .map(|((a, t), c)| 1000.0 - c * (a - t).powi(2))
                .collect();
            Ok(OracleOutput::from_turbines(per))
        }

        fn turbine_count(&self) -> usize {
            self.target.len()
        }
    }

    fn optimizer(oracle: Bowl) -> BruteForceOptimizer {
        BruteForceOptimizer::new(Arc::new(oracle), SweepSettings::sequential()).unwrap()
    }

    fn at(opt: &BruteForceOptimizer, yaw: Vec<f64>) -> EvaluationResult {
        opt.evaluate(&YawVector::new(yaw), &WindCondition::new(8.0, 270.0, 0.06))
            .unwrap()
    }

    #[test]
    fn sharper_peaks_score_higher() {
        let opt = optimizer(Bowl {
            target: vec![-4.0, 2.0, 0.0],
            curvature: vec![6.0, 1.0, 0.1],
            reject_above: 90.0,
        });
        let best = at(&opt, vec![-4.0, 2.0, 0.0]);
        let scores = score_confidence(
            &opt,
            &WindCondition::new(8.0, 270.0, 0.06),
            &best,
            30.0,
            &ConfidencePolicy::default(),
        );
        let levels: Vec<_> = scores.iter().map(|s| s.level).collect();
        assert_eq!(
            levels,
            vec![ConfidenceLevel::High, ConfidenceLevel::Medium, ConfidenceLevel::Low]
        );
        // 6 kW out of 3000 kW
        assert!((scores[0].drop_percent.unwrap() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn probes_beyond_the_limit_are_skipped() {
        // Power still rises past the 30° limit: the outward probe would beat
        // the optimum, the inward one is worse.
        let opt = optimizer(Bowl {
            target: vec![31.0, 0.0],
            curvature: vec![10.0, 10.0],
            reject_above: 90.0,
        });
        let best = at(&opt, vec![30.0, 0.0]);
        let scores = score_confidence(
            &opt,
            &WindCondition::new(8.0, 270.0, 0.06),
            &best,
            30.0,
            &ConfidencePolicy::default(),
        );
        let drop = scores[0].drop_percent.unwrap();
        assert!((drop - 30.0 / 1990.0 * 100.0).abs() < 1e-9, "{drop}");
        assert_eq!(scores[0].level, ConfidenceLevel::High);
    }

    #[test]
    fn rejected_probes_leave_a_turbine_low() {
        let opt = optimizer(Bowl {
            target: vec![5.0, 5.0],
            curvature: vec![10.0, 10.0],
            reject_above: 4.5,
        });
        let best = EvaluationResult {
            yaw: YawVector::new(vec![5.0, 5.0]),
            total_power: 2000.0,
            per_turbine_power: vec![1000.0, 1000.0],
        };
        let scores = score_confidence(
            &opt,
            &WindCondition::new(8.0, 270.0, 0.06),
            &best,
            30.0,
            &ConfidencePolicy::default(),
        );
        for s in scores {
            assert_eq!(s.drop_percent, None);
            assert_eq!(s.level, ConfidenceLevel::Low);
        }
    }

    #[test]
    fn a_better_probe_means_low_confidence() {
        let opt = optimizer(Bowl {
            target: vec![8.0],
            curvature: vec![50.0],
            reject_above: 90.0,
        });
        // Optimum clipped at 5° while power keeps rising towards 8°
        let best = at(&opt, vec![5.0]);
        let scores = score_confidence(
            &opt,
            &WindCondition::new(8.0, 270.0, 0.06),
            &best,
            30.0,
            &ConfidencePolicy::default(),
        );
        assert!(scores[0].drop_percent.unwrap() < 0.0);
        assert_eq!(scores[0].level, ConfidenceLevel::Low);
    }

    #[test]
    fn narrow_width_is_the_widest_level() {
        let policy = ConfidencePolicy::default();
        use ConfidenceLevel::*;
        assert_eq!(narrow_half_width(&[High, High], &policy, 1.0), 1.0);
        assert_eq!(narrow_half_width(&[High, Medium], &policy, 1.0), 2.0);
        assert_eq!(narrow_half_width(&[High, Low, Medium], &policy, 1.0), 3.0);
        assert_eq!(narrow_half_width(&[High], &policy, 2.0), 2.0);
        assert_eq!(narrow_half_width(&[Low], &policy, 2.0), 2.0);
    }

    #[test]
    fn default_policy_is_consistent() {
        assert!(ConfidencePolicy::default().problems().is_empty());
        let inverted = ConfidencePolicy {
            narrow_width_high: 4.0,
            ..ConfidencePolicy::default()
        };
        assert_eq!(inverted.problems().len(), 1);
    }
}
