//! Async steering service

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::ForecastFallback;
use crate::error::{Result, WakeSteerError};
use crate::optimization::PredictiveOptimizer;
use crate::sources::{ConditionSource, TimeWindow};
use crate::storage::{PredictionStore, StoreError};
use crate::types::{Prediction, PredictionAccuracy, RealtimeOptimization, SearchBranch};

/// Outcome of a day-ahead run.
#[derive(Debug, Clone, Serialize)]
pub struct DayAheadRun {
    pub prediction: Prediction,
    /// True when the forecast was unavailable and a stored prediction was reused
    pub reused: bool,
}

/// Outcome of a real-time run.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeRun {
    pub optimization: RealtimeOptimization,
    /// Creation time of the prediction that was validated, if any
    pub prediction_created_at: Option<DateTime<Utc>>,
    /// Distance between the predicted yaw and the real-time optimum
    pub accuracy: Option<PredictionAccuracy>,
}

/// Run counters.
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub day_ahead_runs: AtomicU64,
    pub predictions_reused: AtomicU64,
    pub narrow_runs: AtomicU64,
    pub moderate_runs: AtomicU64,
    pub full_runs: AtomicU64,
    pub failed_runs: AtomicU64,
}

impl PipelineStats {
    fn record_branch(&self, branch: SearchBranch) {
        let counter = match branch {
            SearchBranch::Narrow => &self.narrow_runs,
            SearchBranch::Moderate => &self.moderate_runs,
            SearchBranch::Full => &self.full_runs,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn realtime_runs(&self) -> u64 {
        self.narrow_runs.load(Ordering::Relaxed)
            + self.moderate_runs.load(Ordering::Relaxed)
            + self.full_runs.load(Ordering::Relaxed)
    }
}

/// Wires condition sources and the prediction store around the optimizer.
pub struct SteeringService {
    optimizer: Arc<PredictiveOptimizer>,
    store: Arc<dyn PredictionStore>,
    forecast: Arc<dyn ConditionSource>,
    actual: Arc<dyn ConditionSource>,
    fallback: ForecastFallback,
    stats: Arc<PipelineStats>,
}

impl SteeringService {
    /// Stage-1 predictions are persisted to `store`.
    pub fn new(
        optimizer: PredictiveOptimizer,
        store: Arc<dyn PredictionStore>,
        forecast: Arc<dyn ConditionSource>,
        actual: Arc<dyn ConditionSource>,
        fallback: ForecastFallback,
    ) -> Self {
        Self {
            optimizer: Arc::new(optimizer.with_store(Arc::clone(&store))),
            store,
            forecast,
            actual,
            fallback,
            stats: Arc::new(PipelineStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    pub fn optimizer(&self) -> &Arc<PredictiveOptimizer> {
        &self.optimizer
    }

    /// Stage 1 for the forecast covering `window`.
    pub async fn run_day_ahead(
        &self,
        window: &TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<DayAheadRun> {
        let forecast = match self.forecast.fetch(window).await {
            Ok(forecast) => forecast,
            Err(e) => return self.forecast_fallback(window, e),
        };

        let optimizer = Arc::clone(&self.optimizer);
        let cancel = cancel.clone();
        let prediction = tokio::task::spawn_blocking(move || {
            optimizer.predict_day_ahead(&forecast, &cancel)
        })
        .await
        .map_err(|e| WakeSteerError::Worker(e.to_string()))??;

        self.stats.day_ahead_runs.fetch_add(1, Ordering::Relaxed);
        Ok(DayAheadRun {
            prediction,
            reused: false,
        })
    }

    fn forecast_fallback(
        &self,
        window: &TimeWindow,
        cause: crate::sources::SourceError,
    ) -> Result<DayAheadRun> {
        match self.fallback {
            ForecastFallback::Fail => {
                warn!(source = self.forecast.source_name(), %window, error = %cause, "Forecast unavailable");
                Err(WakeSteerError::ForecastUnavailable(cause))
            }
            ForecastFallback::ReuseLatest => match self.store.get_latest() {
                Ok(prediction) => {
                    warn!(
                        source = self.forecast.source_name(),
                        error = %cause,
                        created_at = %prediction.created_at,
                        "Forecast unavailable, reusing latest stored prediction"
                    );
                    self.stats.predictions_reused.fetch_add(1, Ordering::Relaxed);
                    Ok(DayAheadRun {
                        prediction,
                        reused: true,
                    })
                }
                Err(StoreError::NotFound) => {
                    warn!(error = %cause, "Forecast unavailable and no stored prediction to reuse");
                    Err(WakeSteerError::ForecastUnavailable(cause))
                }
                Err(e) => Err(e.into()),
            },
        }
    }

    /// Stage 2 against the measured condition for `window`.
    pub async fn run_realtime(
        &self,
        window: &TimeWindow,
        cancel: &CancellationToken,
    ) -> Result<RealtimeRun> {
        let actual = self
            .actual
            .fetch(window)
            .await
            .map_err(WakeSteerError::ActualDataUnavailable)?;

        let prediction = match self.store.get_latest() {
            Ok(p) => Some(p),
            Err(StoreError::NotFound) => None,
            Err(e) => return Err(e.into()),
        };

        let optimizer = Arc::clone(&self.optimizer);
        let cancel = cancel.clone();
        let run = tokio::task::spawn_blocking(move || -> Result<RealtimeRun> {
            match prediction {
                Some(prediction) => {
                    let optimization = optimizer.optimize_realtime(&prediction, &actual, &cancel)?;
                    let accuracy = PredictionAccuracy::between(
                        &prediction.predicted_yaw,
                        &optimization.result.best.yaw,
                    );
                    Ok(RealtimeRun {
                        optimization,
                        prediction_created_at: Some(prediction.created_at),
                        accuracy: Some(accuracy),
                    })
                }
                None => Ok(RealtimeRun {
                    optimization: optimizer.optimize_without_prediction(&actual, &cancel)?,
                    prediction_created_at: None,
                    accuracy: None,
                }),
            }
        })
        .await
        .map_err(|e| WakeSteerError::Worker(e.to_string()))??;

        self.stats.record_branch(run.optimization.branch);
        info!(
            branch = %run.optimization.branch,
            yaw = %run.optimization.result.best.yaw,
            improvement_percent = run.optimization.result.improvement_percent,
            evaluated = run.optimization.result.combinations_tested,
            accuracy = ?run.accuracy.map(|a| a.grade),
            "Real-time optimization complete"
        );
        Ok(run)
    }

    /// Real-time runs every `interval` until `cancel` fires. Failed runs are
    /// logged and counted; the loop keeps going.
    pub async fn run_schedule(
        &self,
        interval: Duration,
        cancel: CancellationToken,
        mut on_result: impl FnMut(&RealtimeRun) + Send,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(interval_s = interval.as_secs(), "Real-time schedule started");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let window = TimeWindow::hour_containing(Utc::now());
            match self.run_realtime(&window, &cancel).await {
                Ok(run) => on_result(&run),
                Err(e) => {
                    self.stats.failed_runs.fetch_add(1, Ordering::Relaxed);
                    error!(error = %e, %window, "Real-time run failed");
                }
            }
        }

        info!(
            runs = self.stats.realtime_runs(),
            failed = self.stats.failed_runs.load(Ordering::Relaxed),
            "Real-time schedule stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::{
        BruteForceOptimizer, ConfidencePolicy, RangeSelector, SweepSettings, ToleranceConfig,
        YawSettings,
    };
    use crate::oracle::{OracleOutput, SimulationError, SimulationOracle};
    use crate::sources::{SourceError, StaticSource};
    use crate::storage::InMemoryPredictionStore;
    use crate::types::{WindCondition, YawVector};
    use chrono::TimeZone;

    struct Peak;

    impl SimulationOracle for Peak {
        fn evaluate(
            &self,
            yaw: &YawVector,
            _wind: &WindCondition,
        ) -> std::result::Result<OracleOutput, SimulationError> {
            let target = [-2.0, 1.0];
            let per = yaw
                .iter()
                .zip(target)
                .map(|(a, t)| 1000.0 - 5.0 * (a - t).powi(2))
                .collect();
            Ok(OracleOutput::from_turbines(per))
        }

        fn turbine_count(&self) -> usize {
            2
        }
    }

    fn make_service(
        forecast: StaticSource,
        actual: StaticSource,
        fallback: ForecastFallback,
    ) -> (SteeringService, Arc<InMemoryPredictionStore>) {
        let optimizer = PredictiveOptimizer::new(
            BruteForceOptimizer::new(Arc::new(Peak), SweepSettings::sequential()).unwrap(),
            RangeSelector::default(),
            ToleranceConfig::CONSERVATIVE,
            ConfidencePolicy::default(),
            YawSettings::default(),
        );
        let store = Arc::new(InMemoryPredictionStore::new());
        let service = SteeringService::new(
            optimizer,
            store.clone(),
            Arc::new(forecast),
            Arc::new(actual),
            fallback,
        );
        (service, store)
    }

    fn window() -> TimeWindow {
        TimeWindow::hour_starting(Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap())
    }

    fn forecast() -> WindCondition {
        WindCondition::new(8.5, 270.0, 0.07)
    }

    #[tokio::test]
    async fn day_ahead_then_realtime_uses_the_stored_prediction() {
        let (service, store) = make_service(
            StaticSource::new(forecast()),
            StaticSource::new(WindCondition::new(8.3, 268.0, 0.065)),
            ForecastFallback::Fail,
        );
        let cancel = CancellationToken::new();

        let day = service.run_day_ahead(&window(), &cancel).await.unwrap();
        assert!(!day.reused);
        assert_eq!(store.len(), 1);

        let rt = service.run_realtime(&window(), &cancel).await.unwrap();
        assert_eq!(rt.optimization.branch, SearchBranch::Narrow);
        assert_eq!(rt.prediction_created_at, Some(day.prediction.created_at));
        assert_eq!(rt.optimization.result.best.yaw.as_slice(), &[-2.0, 1.0]);
        assert_eq!(rt.accuracy.unwrap().mean_abs_error_deg, 0.0);
        assert_eq!(service.stats().narrow_runs.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn forecast_outage_fails_by_default() {
        let (service, _) = make_service(
            StaticSource::failing("timeout"),
            StaticSource::new(forecast()),
            ForecastFallback::Fail,
        );
        let err = service
            .run_day_ahead(&window(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WakeSteerError::ForecastUnavailable(SourceError::Fetch(_))
        ));
    }

    #[tokio::test]
    async fn forecast_outage_can_reuse_the_latest_prediction() {
        let (service, store) = make_service(
            StaticSource::empty(),
            StaticSource::new(forecast()),
            ForecastFallback::ReuseLatest,
        );
        let cancel = CancellationToken::new();

        // Nothing to reuse yet
        let err = service.run_day_ahead(&window(), &cancel).await.unwrap_err();
        assert!(matches!(
            err,
            WakeSteerError::ForecastUnavailable(SourceError::NoData(_))
        ));

        let stored = service
            .optimizer()
            .predict_day_ahead(&forecast(), &cancel)
            .unwrap();
        assert_eq!(store.len(), 1);

        let day = service.run_day_ahead(&window(), &cancel).await.unwrap();
        assert!(day.reused);
        assert_eq!(day.prediction, stored);
    }

    #[tokio::test]
    async fn realtime_without_prediction_runs_full_search() {
        let (service, _) = make_service(
            StaticSource::new(forecast()),
            StaticSource::new(forecast()),
            ForecastFallback::Fail,
        );
        let rt = service
            .run_realtime(&window(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(rt.optimization.branch, SearchBranch::Full);
        assert!(rt.optimization.validation.is_none());
        assert!(rt.accuracy.is_none());
    }

    #[tokio::test]
    async fn missing_actual_data_always_fails() {
        let (service, _) = make_service(
            StaticSource::new(forecast()),
            StaticSource::empty(),
            ForecastFallback::ReuseLatest,
        );
        let cancel = CancellationToken::new();
        service.run_day_ahead(&window(), &cancel).await.unwrap();

        let err = service.run_realtime(&window(), &cancel).await.unwrap_err();
        assert!(matches!(err, WakeSteerError::ActualDataUnavailable(_)));
    }

    #[tokio::test]
    async fn schedule_stops_on_cancel() {
        let (service, _) = make_service(
            StaticSource::new(forecast()),
            StaticSource::new(forecast()),
            ForecastFallback::Fail,
        );
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        let mut seen = 0;
        service
            .run_schedule(Duration::from_millis(5), cancel, |run| {
                seen += 1;
                assert_eq!(run.optimization.branch, SearchBranch::Full);
                if seen == 2 {
                    stopper.cancel();
                }
            })
            .await;
        assert_eq!(seen, 2);
        assert_eq!(service.stats().realtime_runs(), 2);
    }
}
