//! Wake-Steering Day Simulation
//!
//! Replays one synthetic day through both stages:
//! - draws a day-ahead forecast with Gaussian forecast error
//! - runs stage 1 once on that forecast
//! - walks the "true" condition hour by hour and runs stage 2 against it
//!
//! Each hour is written to stdout as one JSON line; the summary goes to the log.
//!
//! # Usage
//! ```bash
//! ./simulation --hours 24 --seed 7 --base 8.5,270,0.07 > day.jsonl
//! ./simulation --compare-full --speed-error 1.5
//! ```

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, DurationRound, Utc};
use clap::Parser;
use rand::prelude::*;
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use wake_steer::config::{defaults, FarmConfig};
use wake_steer::types::{PredictionAccuracy, SearchBranch, WindCondition};
use wake_steer::SimulationOracle;

// ============================================================================
// Weather Constants
// ============================================================================

/// Diurnal wind-speed swing amplitude (m/s)
const DIURNAL_SPEED_AMPLITUDE: f64 = 0.8;
/// Hour-to-hour random walk of the true condition
const SPEED_WALK_STD: f64 = 0.3;
const DIRECTION_WALK_STD: f64 = 2.0;
const TURBULENCE_WALK_STD: f64 = 0.003;
/// Turbulence intensity is kept inside this band
const TURBULENCE_BOUNDS: (f64, f64) = (0.02, 0.30);

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "wake-steer-simulation")]
#[command(about = "Synthetic day replay of the two-stage wake-steering optimizer")]
#[command(version = "1.0")]
struct Args {
    /// Hours to simulate
    #[arg(short = 'H', long, default_value = "24", value_parser = clap::value_parser!(u32).range(1..=72))]
    hours: u32,

    /// Day-mean condition as SPEED,DIRECTION,TI
    #[arg(long, default_value = "8.5,270,0.07")]
    base: String,

    /// Forecast error standard deviations
    #[arg(long, default_value_t = defaults::SIM_SPEED_ERROR_STD)]
    speed_error: f64,
    #[arg(long, default_value_t = defaults::SIM_DIRECTION_ERROR_STD)]
    direction_error: f64,
    #[arg(long, default_value_t = defaults::SIM_TURBULENCE_ERROR_STD)]
    turbulence_error: f64,

    /// Also run a FULL search every hour to measure what scoping gave up
    #[arg(long)]
    compare_full: bool,

    /// Farm config file (default: standard search order)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Only print the summary
    #[arg(short, long)]
    quiet: bool,
}

fn parse_base(s: &str) -> Result<WindCondition> {
    let values: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .with_context(|| format!("--base '{s}'"))?;
    let &[speed, direction, ti] = values.as_slice() else {
        return Err(anyhow!("--base expects SPEED,DIRECTION,TI, got '{s}'"));
    };
    let condition = WindCondition::new(speed, direction, ti);
    condition.validate().map_err(|e| anyhow!("--base: {e}"))?;
    Ok(condition)
}

// ============================================================================
// Synthetic Weather
// ============================================================================

struct Weather {
    rng: StdRng,
    base: WindCondition,
    current: WindCondition,
    speed_walk: Normal<f64>,
    direction_walk: Normal<f64>,
    turbulence_walk: Normal<f64>,
}

impl Weather {
    fn new(base: WindCondition, seed: Option<u64>) -> Result<Self> {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            rng,
            base,
            current: base,
            speed_walk: normal(SPEED_WALK_STD)?,
            direction_walk: normal(DIRECTION_WALK_STD)?,
            turbulence_walk: normal(TURBULENCE_WALK_STD)?,
        })
    }

    /// Day-ahead forecast: the day-mean condition plus forecast error.
    fn forecast(&mut self, speed_std: f64, direction_std: f64, ti_std: f64) -> Result<WindCondition> {
        let speed = self.base.wind_speed + normal(speed_std)?.sample(&mut self.rng);
        let direction = self.base.wind_direction + normal(direction_std)?.sample(&mut self.rng);
        let ti = self.base.turbulence_intensity + normal(ti_std)?.sample(&mut self.rng);
        Ok(WindCondition::new(
            speed.max(0.0),
            direction,
            ti.clamp(TURBULENCE_BOUNDS.0, TURBULENCE_BOUNDS.1),
        ))
    }

    /// Advance the true condition to `hour`.
    fn step(&mut self, hour: u32) -> WindCondition {
        let diurnal = DIURNAL_SPEED_AMPLITUDE
            * (2.0 * std::f64::consts::PI * f64::from(hour) / 24.0).sin();
        let drift = self.current.wind_speed - self.base.wind_speed
            + self.speed_walk.sample(&mut self.rng);
        let speed = (self.base.wind_speed + 0.7 * drift + 0.3 * diurnal).max(0.0);
        let direction = self.current.wind_direction + self.direction_walk.sample(&mut self.rng);
        let ti = (self.current.turbulence_intensity + self.turbulence_walk.sample(&mut self.rng))
            .clamp(TURBULENCE_BOUNDS.0, TURBULENCE_BOUNDS.1);
        self.current = WindCondition::new(speed, direction, ti);
        self.current
    }
}

fn normal(std_dev: f64) -> Result<Normal<f64>> {
    Normal::new(0.0, std_dev).map_err(|e| anyhow!("normal distribution with std {std_dev}: {e}"))
}

// ============================================================================
// Output
// ============================================================================

#[derive(Debug, Serialize)]
struct HourRecord {
    hour: u32,
    timestamp: DateTime<Utc>,
    actual: WindCondition,
    branch: SearchBranch,
    half_width: f64,
    combinations: u64,
    improvement_percent: f64,
    power_gain_kw: f64,
    wall_ms: f64,
    accuracy: PredictionAccuracy,
    /// FULL-search improvement for the same hour, with `--compare-full`
    #[serde(skip_serializing_if = "Option::is_none")]
    full_improvement_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    full_combinations: Option<u64>,
}

#[derive(Debug, Default)]
struct Summary {
    hours: u32,
    branches: BTreeMap<String, u32>,
    combinations: u64,
    full_combinations: u64,
    improvement_sum: f64,
    full_improvement_sum: f64,
    energy_gain_kwh: f64,
}

impl Summary {
    fn record(&mut self, r: &HourRecord) {
        self.hours += 1;
        *self.branches.entry(r.branch.to_string()).or_default() += 1;
        self.combinations += r.combinations;
        self.improvement_sum += r.improvement_percent;
        self.energy_gain_kwh += r.power_gain_kw;
        if let (Some(imp), Some(n)) = (r.full_improvement_percent, r.full_combinations) {
            self.full_improvement_sum += imp;
            self.full_combinations += n;
        }
    }

    fn log(&self, compared: bool) {
        let hours = f64::from(self.hours.max(1));
        info!(
            hours = self.hours,
            branches = ?self.branches,
            evaluations = self.combinations,
            mean_improvement_percent = self.improvement_sum / hours,
            energy_gain_kwh = self.energy_gain_kwh,
            "Simulation summary"
        );
        if compared && self.full_combinations > 0 {
            info!(
                full_evaluations = self.full_combinations,
                evaluation_ratio = self.combinations as f64 / self.full_combinations as f64,
                full_mean_improvement_percent = self.full_improvement_sum / hours,
                "Compared with FULL search every hour"
            );
        }
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,simulation=info")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let base = parse_base(&args.base)?;

    let config = match &args.config {
        Some(p) => FarmConfig::load_from_file(p)
            .with_context(|| format!("loading farm config {}", p.display()))?,
        None => FarmConfig::load(),
    };
    let oracle: Arc<dyn SimulationOracle> = Arc::new(config.wake_model());
    let optimizer = config.build_optimizer(oracle)?;
    let cancel = CancellationToken::new();

    let mut weather = Weather::new(base, args.seed)?;
    let forecast = weather.forecast(args.speed_error, args.direction_error, args.turbulence_error)?;
    info!(base = %base, forecast = %forecast, turbines = config.farm.turbines.len(), "Starting day simulation");

    let prediction = optimizer.predict_day_ahead(&forecast, &cancel)?;
    info!(
        yaw = %prediction.predicted_yaw,
        mode = %prediction.range_mode,
        half_width = prediction.search_half_width,
        "Stage 1 complete"
    );

    let start = Utc::now()
        .duration_trunc(ChronoDuration::days(1))
        .unwrap_or_else(|_| Utc::now());
    let mut summary = Summary::default();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for hour in 0..args.hours {
        let actual = weather.step(hour);
        let run = optimizer.optimize_realtime(&prediction, &actual, &cancel)?;
        let result = &run.result;

        let full = if args.compare_full {
            Some(optimizer.optimize_without_prediction(&actual, &cancel)?)
        } else {
            None
        };

        let record = HourRecord {
            hour,
            timestamp: start + ChronoDuration::hours(i64::from(hour)),
            actual,
            branch: run.branch,
            half_width: run.half_width,
            combinations: result.combinations_tested,
            improvement_percent: result.improvement_percent,
            power_gain_kw: result.power_gain_kw(),
            wall_ms: result.wall_time.as_secs_f64() * 1000.0,
            accuracy: PredictionAccuracy::between(&prediction.predicted_yaw, &result.best.yaw),
            full_improvement_percent: full.as_ref().map(|f| f.result.improvement_percent),
            full_combinations: full.as_ref().map(|f| f.result.combinations_tested),
        };

        if let Some(full_imp) = record.full_improvement_percent {
            if full_imp - record.improvement_percent > 0.5 {
                warn!(hour, scoped = record.improvement_percent, full = full_imp, "Scoped search fell well short of FULL");
            }
        }

        if !args.quiet {
            let line = serde_json::to_string(&record)?;
            if writeln!(out, "{line}").is_err() {
                // Downstream closed the pipe
                break;
            }
        }
        summary.record(&record);
    }

    summary.log(args.compare_full);
    Ok(())
}
