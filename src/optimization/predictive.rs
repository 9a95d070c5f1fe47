//! Two-stage predictive optimizer
//!
//! Stage 1 (`predict_day_ahead`) runs the full exploratory sweep for a
//! forecast once per day and stores the optimum as a [`Prediction`].
//! Stage 2 (`optimize_realtime`) validates that forecast against the measured
//! condition and searches around the predicted yaw when it still holds,
//! falling back to a full zero-centred sweep when it does not.
//!
//! The two stages share nothing but the stored prediction. Stage 2 only ever
//! borrows it.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::brute_force::BruteForceOptimizer;
use super::confidence::{narrow_half_width, score_confidence, ConfidencePolicy};
use super::forecast_validator::{validate, ToleranceConfig};
use super::range_selector::RangeSelector;
use super::search_space::{floor_to_grid, SearchSpace};
use crate::error::{Result, WakeSteerError};
use crate::storage::PredictionStore;
use crate::types::{
    ConfidenceLevel, OptimizationResult, Prediction, RangeRecommendation, RealtimeOptimization,
    SearchBranch, SearchRecommendation, ValidationReport, WindCondition, YawVector,
};

/// Admissible yaw and grid, independent of any search range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YawSettings {
    /// Hard farm limit (degrees either side of zero)
    pub limit_deg: f64,
    /// Grid step (degrees)
    pub step: f64,
}

impl Default for YawSettings {
    fn default() -> Self {
        Self {
            limit_deg: 30.0,
            step: 1.0,
        }
    }
}

impl YawSettings {
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.step.is_finite() || self.step <= 0.0 {
            problems.push(format!("yaw.step = {} must be > 0", self.step));
        }
        if !self.limit_deg.is_finite() || self.limit_deg < 0.0 || self.limit_deg > 90.0 {
            problems.push(format!("yaw.limit_deg = {} must be within [0, 90]", self.limit_deg));
        }
        problems
    }

    /// Largest on-grid half-width within the limit.
    pub fn max_half_width(&self) -> f64 {
        floor_to_grid(self.limit_deg, self.step)
    }

    /// Clamp a half-width to the limit and floor it onto the grid.
    pub fn clamp_half_width(&self, half_width: f64) -> f64 {
        floor_to_grid(half_width.min(self.limit_deg), self.step)
    }

    /// Shift each component inward so `center ± half_width` stays admissible.
    pub fn clamp_center(&self, center: &YawVector, half_width: f64) -> YawVector {
        let reach = (self.limit_deg - half_width).max(0.0);
        center.iter().map(|c| c.clamp(-reach, reach)).collect::<Vec<_>>().into()
    }
}

/// Stage-1 and stage-2 orchestration over one oracle.
pub struct PredictiveOptimizer {
    sweep: BruteForceOptimizer,
    ranges: RangeSelector,
    tolerances: ToleranceConfig,
    confidence: ConfidencePolicy,
    yaw: YawSettings,
    store: Option<Arc<dyn PredictionStore>>,
}

impl PredictiveOptimizer {
    pub fn new(
        sweep: BruteForceOptimizer,
        ranges: RangeSelector,
        tolerances: ToleranceConfig,
        confidence: ConfidencePolicy,
        yaw: YawSettings,
    ) -> Self {
        Self {
            sweep,
            ranges,
            tolerances,
            confidence,
            yaw,
            store: None,
        }
    }

    /// Persist complete stage-1 predictions to `store`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn PredictionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn brute_force(&self) -> &BruteForceOptimizer {
        &self.sweep
    }

    pub fn range_selector(&self) -> &RangeSelector {
        &self.ranges
    }

    pub fn tolerances(&self) -> &ToleranceConfig {
        &self.tolerances
    }

    pub fn yaw_settings(&self) -> &YawSettings {
        &self.yaw
    }

    pub fn store(&self) -> Option<&Arc<dyn PredictionStore>> {
        self.store.as_ref()
    }

    // ========================================================================
    // Stage 1
    // ========================================================================

    /// Full exploratory sweep for `forecast`; persists the prediction when the
    /// sweep covered the whole space.
    pub fn predict_day_ahead(
        &self,
        forecast: &WindCondition,
        cancel: &CancellationToken,
    ) -> Result<Prediction> {
        forecast
            .validate()
            .map_err(|e| WakeSteerError::InvalidCondition(format!("forecast: {e}")))?;

        let range = self.ranges.recommend_range(forecast);
        let n = self.sweep.turbine_count();
        info!(forecast = %forecast, mode = %range.mode, half_width = range.half_width, "Stage 1: day-ahead prediction");

        let prediction = if range.is_disabled() {
            let baseline = self.sweep.evaluate_baseline(forecast)?;
            Prediction {
                forecast: *forecast,
                predicted_yaw: YawVector::zeros(n),
                per_turbine_confidence: vec![ConfidenceLevel::Low; n],
                search_half_width: 0.0,
                created_at: Utc::now(),
                range_mode: range.mode,
                expected_total_power: baseline.total_power,
                expected_improvement_percent: 0.0,
                complete: true,
            }
        } else {
            let half_width = self.yaw.clamp_half_width(range.half_width);
            let space = SearchSpace::new(YawVector::zeros(n), half_width, self.yaw.step)?;
            let result = self.sweep.optimize(forecast, &space, cancel)?;

            let sensitivities = score_confidence(
                &self.sweep,
                forecast,
                &result.best,
                self.yaw.limit_deg,
                &self.confidence,
            );
            let levels: Vec<ConfidenceLevel> = sensitivities.iter().map(|s| s.level).collect();
            let search_half_width = narrow_half_width(&levels, &self.confidence, self.yaw.step);

            Prediction {
                forecast: *forecast,
                predicted_yaw: result.best.yaw.clone(),
                per_turbine_confidence: levels,
                search_half_width,
                created_at: Utc::now(),
                range_mode: range.mode,
                expected_total_power: result.best.total_power,
                expected_improvement_percent: result.improvement_percent,
                complete: result.complete,
            }
        };

        info!(
            yaw = %prediction.predicted_yaw,
            confidence = ?prediction.per_turbine_confidence,
            search_half_width = prediction.search_half_width,
            improvement_percent = prediction.expected_improvement_percent,
            "Prediction ready"
        );

        match (&self.store, prediction.complete) {
            (Some(store), true) => {
                store.put(&prediction)?;
                info!(backend = store.backend_name(), created_at = %prediction.created_at, "Prediction stored");
            }
            (Some(_), false) => {
                warn!("Day-ahead sweep was cancelled; incomplete prediction not stored");
            }
            (None, _) => {}
        }

        Ok(prediction)
    }

    // ========================================================================
    // Stage 2
    // ========================================================================

    /// Validate `prediction` against `actual` and run the scoped search.
    pub fn optimize_realtime(
        &self,
        prediction: &Prediction,
        actual: &WindCondition,
        cancel: &CancellationToken,
    ) -> Result<RealtimeOptimization> {
        actual
            .validate()
            .map_err(|e| WakeSteerError::InvalidCondition(format!("actual condition: {e}")))?;
        if prediction.predicted_yaw.len() != self.sweep.turbine_count() {
            return Err(WakeSteerError::Configuration(format!(
                "prediction has {} turbines, the farm has {}",
                prediction.predicted_yaw.len(),
                self.sweep.turbine_count()
            )));
        }

        let report = validate(&prediction.forecast, actual, &self.tolerances);
        info!(
            forecast = %prediction.forecast,
            actual = %actual,
            recommendation = %report.recommendation,
            "Stage 2: forecast validated"
        );

        match report.recommendation {
            SearchRecommendation::Narrow => self.centred_search(
                SearchBranch::Narrow,
                prediction,
                prediction.search_half_width,
                actual,
                report,
                cancel,
            ),
            SearchRecommendation::Moderate => self.centred_search(
                SearchBranch::Moderate,
                prediction,
                prediction.search_half_width * 2.0,
                actual,
                report,
                cancel,
            ),
            SearchRecommendation::Full => self.full_search(actual, Some(report), cancel),
        }
    }

    /// FULL search with no prediction to validate against.
    pub fn optimize_without_prediction(
        &self,
        actual: &WindCondition,
        cancel: &CancellationToken,
    ) -> Result<RealtimeOptimization> {
        actual
            .validate()
            .map_err(|e| WakeSteerError::InvalidCondition(format!("actual condition: {e}")))?;
        info!(actual = %actual, "Stage 2: no prediction available, running full search");
        self.full_search(actual, None, cancel)
    }

    fn centred_search(
        &self,
        branch: SearchBranch,
        prediction: &Prediction,
        half_width: f64,
        actual: &WindCondition,
        report: ValidationReport,
        cancel: &CancellationToken,
    ) -> Result<RealtimeOptimization> {
        let half_width = self.yaw.clamp_half_width(half_width);
        let center = self.yaw.clamp_center(&prediction.predicted_yaw, half_width);
        let space = SearchSpace::new(center.clone(), half_width, self.yaw.step)?;
        info!(%branch, center = %center, half_width, combinations = space.len(), "Prediction-centred search");

        let result = self.sweep.optimize(actual, &space, cancel)?;
        Ok(RealtimeOptimization {
            branch,
            validation: Some(report),
            range: None,
            center,
            half_width,
            result,
        })
    }

    fn full_search(
        &self,
        actual: &WindCondition,
        report: Option<ValidationReport>,
        cancel: &CancellationToken,
    ) -> Result<RealtimeOptimization> {
        let started = Instant::now();
        let n = self.sweep.turbine_count();
        let range = self.ranges.recommend_range(actual);
        let center = YawVector::zeros(n);

        let (range, result) = if range.is_disabled() {
            info!(actual = %actual, "Steering disabled for these conditions; baseline is optimal");
            let baseline = self.sweep.evaluate_baseline(actual)?;
            let result = OptimizationResult::baseline_only(*actual, baseline, started.elapsed());
            (range, result)
        } else {
            let half_width = self.yaw.clamp_half_width(range.half_width);
            let space = SearchSpace::new(center.clone(), half_width, self.yaw.step)?;
            info!(
                branch = %SearchBranch::Full,
                mode = %range.mode,
                half_width,
                combinations = space.len(),
                "Full search"
            );
            let result = self.sweep.optimize(actual, &space, cancel)?;
            (
                RangeRecommendation {
                    half_width,
                    mode: range.mode,
                },
                result,
            )
        };

        Ok(RealtimeOptimization {
            branch: SearchBranch::Full,
            validation: report,
            half_width: range.half_width,
            range: Some(range),
            center,
            result,
        })
    }
}
