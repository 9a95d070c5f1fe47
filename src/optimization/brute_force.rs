//! Brute-force yaw sweep
//!
//! Evaluates every candidate of a [`SearchSpace`] through the oracle and keeps
//! the highest total power. The space is cut into fixed-size batches by
//! enumeration index; each batch returns its local best and the batches are
//! merged with [`prefer`], a total order on (power desc, index asc). The
//! combiner, not the scheduler, decides ties, so sequential and parallel
//! sweeps return the same winner.
//!
//! Cancellation is checked between batches. A cancelled sweep returns the
//! best among the candidates it did evaluate with `complete = false`.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::search_space::SearchSpace;
use crate::error::{Result, WakeSteerError};
use crate::oracle::{SimulationError, SimulationOracle};
use crate::types::{
    improvement_percent, CandidateFailure, EvaluationResult, OptimizationResult, WindCondition,
    YawVector,
};

/// Upper bound for `estimated_evaluation_ms`: one hour per candidate.
pub const MAX_EVALUATION_MS: f64 = 3_600_000.0;

/// Sweep execution knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    /// Worker threads; 1 runs the sweep on the calling thread
    pub concurrency: usize,
    /// Candidates per batch (cancellation is checked between batches)
    pub batch_size: u64,
    /// Emit a progress callback every N evaluated candidates (0 disables)
    pub progress_interval: u64,
    /// Failed candidates kept verbatim in the result
    pub max_failure_diagnostics: usize,
    /// Expected oracle cost per candidate (ms), for ETA estimates only
    pub estimated_evaluation_ms: f64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            concurrency: std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
            batch_size: 256,
            progress_interval: 1000,
            max_failure_diagnostics: 100,
            estimated_evaluation_ms: 3.0,
        }
    }
}

impl SweepSettings {
    pub fn sequential() -> Self {
        Self {
            concurrency: 1,
            ..Self::default()
        }
    }

    /// Wall-time estimate for sweeping `space` with this pool.
    pub fn estimated_duration(&self, space: &SearchSpace) -> Duration {
        let per_evaluation = Duration::try_from_secs_f64(self.estimated_evaluation_ms.max(0.0) / 1000.0)
            .unwrap_or(Duration::MAX);
        let workers = u32::try_from(self.concurrency.max(1)).unwrap_or(u32::MAX);
        space.estimated_duration(per_evaluation) / workers
    }

    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.concurrency == 0 {
            problems.push("sweep.concurrency must be at least 1".to_string());
        }
        if self.batch_size == 0 {
            problems.push("sweep.batch_size must be at least 1".to_string());
        }
        if !(0.0..=MAX_EVALUATION_MS).contains(&self.estimated_evaluation_ms) {
            problems.push(format!(
                "sweep.estimated_evaluation_ms = {} must be within [0, {MAX_EVALUATION_MS}]",
                self.estimated_evaluation_ms
            ));
        }
        problems
    }
}

/// Monotonic progress snapshot passed to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepProgress {
    pub evaluated: u64,
    pub total: u64,
}

pub type ProgressCallback = Arc<dyn Fn(SweepProgress) + Send + Sync>;

/// Best candidate seen by one batch (or the merge of several).
#[derive(Debug, Clone)]
struct Incumbent {
    index: u64,
    eval: EvaluationResult,
}

/// Deterministic max combiner: higher power wins, equal power goes to the
/// earlier enumeration index.
fn prefer(a: Option<Incumbent>, b: Option<Incumbent>) -> Option<Incumbent> {
    match (a, b) {
        (None, other) | (other, None) => other,
        (Some(a), Some(b)) => {
            let b_wins = b.eval.total_power > a.eval.total_power
                || (b.eval.total_power == a.eval.total_power && b.index < a.index);
            Some(if b_wins { b } else { a })
        }
    }
}

/// Keep the `cap` lowest-index failures whatever order batches finish in.
fn keep_lowest(kept: &mut Vec<CandidateFailure>, failure: CandidateFailure, cap: usize) {
    if kept.len() < cap {
        kept.push(failure);
        return;
    }
    let highest = kept
        .iter()
        .enumerate()
        .max_by_key(|(_, f)| f.index)
        .map(|(i, f)| (i, f.index));
    if let Some((slot, index)) = highest {
        if failure.index < index {
            kept[slot] = failure;
        }
    }
}

/// Shared counters for one sweep. The only state batches touch concurrently.
struct SweepState {
    evaluated: AtomicU64,
    failed: AtomicU64,
    last_reported: Mutex<u64>,
    diagnostics: Mutex<Vec<CandidateFailure>>,
}

impl SweepState {
    fn new() -> Self {
        Self {
            evaluated: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            last_reported: Mutex::new(0),
            diagnostics: Mutex::new(Vec::new()),
        }
    }
}

/// Exhaustive optimizer over an injected oracle.
pub struct BruteForceOptimizer {
    oracle: Arc<dyn SimulationOracle>,
    settings: SweepSettings,
    pool: Option<rayon::ThreadPool>,
    progress: Option<ProgressCallback>,
}

impl BruteForceOptimizer {
    pub fn new(oracle: Arc<dyn SimulationOracle>, settings: SweepSettings) -> Result<Self> {
        let problems = settings.problems();
        if !problems.is_empty() {
            return Err(WakeSteerError::Configuration(problems.join("; ")));
        }

        let pool = if settings.concurrency > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(settings.concurrency)
                .thread_name(|i| format!("yaw-sweep-{i}"))
                .build()
                .map_err(|e| WakeSteerError::Configuration(format!("sweep thread pool: {e}")))?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            oracle,
            settings,
            pool,
            progress: None,
        })
    }

    /// Attach a progress callback. It never influences the result.
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn oracle(&self) -> &Arc<dyn SimulationOracle> {
        &self.oracle
    }

    pub fn settings(&self) -> &SweepSettings {
        &self.settings
    }

    pub fn turbine_count(&self) -> usize {
        self.oracle.turbine_count()
    }

    /// Evaluate a single yaw vector.
    pub fn evaluate(
        &self,
        yaw: &YawVector,
        wind: &WindCondition,
    ) -> std::result::Result<EvaluationResult, SimulationError> {
        let out = self.oracle.evaluate(yaw, wind)?;
        if !out.total_power.is_finite() {
            return Err(SimulationError::Diverged(format!(
                "total power {} for {yaw}",
                out.total_power
            )));
        }
        if out.per_turbine_power.len() != yaw.len() {
            return Err(SimulationError::Diverged(format!(
                "oracle returned {} turbine powers for {} turbines",
                out.per_turbine_power.len(),
                yaw.len()
            )));
        }
        Ok(EvaluationResult {
            yaw: yaw.clone(),
            total_power: out.total_power,
            per_turbine_power: out.per_turbine_power,
        })
    }

    /// All-zero evaluation. Failure here is fatal for every downstream percentage.
    pub fn evaluate_baseline(&self, wind: &WindCondition) -> Result<EvaluationResult> {
        let zeros = YawVector::zeros(self.oracle.turbine_count());
        self.evaluate(&zeros, wind)
            .map_err(WakeSteerError::SimulationFailure)
    }

    /// Sweep `space` under `wind`.
    pub fn optimize(
        &self,
        wind: &WindCondition,
        space: &SearchSpace,
        cancel: &CancellationToken,
    ) -> Result<OptimizationResult> {
        if space.turbine_count() != self.oracle.turbine_count() {
            return Err(WakeSteerError::Configuration(format!(
                "search space has {} turbines, oracle '{}' models {}",
                space.turbine_count(),
                self.oracle.name(),
                self.oracle.turbine_count()
            )));
        }

        let started = Instant::now();
        let baseline = self.evaluate_baseline(wind)?;
        let total = space.len();

        info!(
            wind = %wind,
            combinations = total,
            half_width = space.half_width(),
            step = space.step(),
            concurrency = self.settings.concurrency,
            eta_s = self.settings.estimated_duration(space).as_secs_f64(),
            "Starting yaw sweep"
        );

        let state = SweepState::new();
        let batch = self.settings.batch_size;
        let n_batches = total.div_ceil(batch);

        let run_batch = |b: u64| -> Option<Incumbent> {
            if cancel.is_cancelled() {
                return None;
            }
            let start = b * batch;
            let end = (start + batch).min(total);
            self.sweep_batch(wind, space, start..end, &state)
        };

        let space_best = match &self.pool {
            None => {
                let mut best = None;
                for b in 0..n_batches {
                    if cancel.is_cancelled() {
                        break;
                    }
                    best = prefer(best, run_batch(b));
                }
                best
            }
            Some(pool) => pool.install(|| {
                (0..n_batches)
                    .into_par_iter()
                    .map(run_batch)
                    .reduce(|| None, prefer)
            }),
        };

        let evaluated = state.evaluated.load(Ordering::SeqCst);
        let failed = state.failed.load(Ordering::SeqCst);
        let mut diagnostics = state
            .diagnostics
            .into_inner()
            .unwrap_or_else(|e| e.into_inner());
        diagnostics.sort_by_key(|f| f.index);
        let complete = evaluated == total;

        // Baseline is the incumbent before enumeration: a candidate must beat it strictly.
        let (best, best_index) = match space_best {
            Some(inc) if inc.eval.total_power > baseline.total_power => (inc.eval, Some(inc.index)),
            _ => (baseline.clone(), None),
        };

        if failed > 0 {
            warn!(
                failed,
                evaluated,
                first = diagnostics.first().map(|f| f.reason.as_str()).unwrap_or(""),
                "Oracle failed on some candidates; they were excluded from the maximum"
            );
        }
        if !complete {
            warn!(evaluated, total, "Yaw sweep cancelled; returning best found so far");
        }

        let result = OptimizationResult {
            wind: *wind,
            improvement_percent: improvement_percent(best.total_power, baseline.total_power),
            best,
            best_index,
            baseline,
            search_size: total,
            combinations_tested: evaluated,
            failed_candidates: failed,
            diagnostics,
            wall_time: started.elapsed(),
            complete,
        };

        info!(
            best = %result.best.yaw,
            total_power_kw = result.best.total_power,
            improvement_percent = result.improvement_percent,
            evaluated,
            elapsed_ms = result.wall_time.as_millis() as u64,
            "Yaw sweep finished"
        );

        Ok(result)
    }

    fn sweep_batch(
        &self,
        wind: &WindCondition,
        space: &SearchSpace,
        range: std::ops::Range<u64>,
        state: &SweepState,
    ) -> Option<Incumbent> {
        let mut best: Option<Incumbent> = None;
        let count = range.end - range.start;

        for index in range {
            let Some(yaw) = space.candidate(index) else {
                break;
            };
            match self.evaluate(&yaw, wind) {
                Ok(eval) => {
                    best = prefer(best, Some(Incumbent { index, eval }));
                }
                Err(e) => {
                    debug!(index, yaw = %yaw, error = %e, "Candidate evaluation failed");
                    state.failed.fetch_add(1, Ordering::Relaxed);
                    let failure = CandidateFailure {
                        index,
                        yaw,
                        reason: e.to_string(),
                    };
                    let mut diag = state
                        .diagnostics
                        .lock()
                        .unwrap_or_else(|e| e.into_inner());
                    keep_lowest(&mut diag, failure, self.settings.max_failure_diagnostics);
                }
            }
        }

        let done = state.evaluated.fetch_add(count, Ordering::SeqCst) + count;
        self.report_progress(done, count, space.len(), state);
        best
    }

    fn report_progress(&self, done: u64, just_finished: u64, total: u64, state: &SweepState) {
        let Some(callback) = &self.progress else {
            return;
        };
        let interval = self.settings.progress_interval;
        if interval == 0 {
            return;
        }
        let crossed = done / interval > (done - just_finished) / interval || done == total;
        if !crossed {
            return;
        }
        let mut last = state
            .last_reported
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if done > *last {
            *last = done;
            callback(SweepProgress {
                evaluated: done,
                total,
            });
        }
    }
}
