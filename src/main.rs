//! Wake Steer operator CLI
//!
//! # Usage
//!
//! ```bash
//! # Day-ahead prediction from a forecast (speed m/s, direction °, TI)
//! wake-steer predict --forecast 8.5,270,0.07
//!
//! # Real-time optimization against measured conditions
//! wake-steer realtime --actual 8.3,268,0.065
//!
//! # Re-run the real-time stage every 10 minutes from a JSON-lines feed
//! wake-steer realtime --actual-file scada.jsonl --watch 600
//!
//! # One-off sweep, forecast validation, range recommendation
//! wake-steer sweep --wind 8,270,0.06 --half-width 5
//! wake-steer validate --forecast 8.5,270,0.07 --actual 8.3,285,0.07
//! wake-steer range --wind 5,270,0.04
//! ```
//!
//! # Environment Variables
//!
//! - `WAKE_STEER_CONFIG`: path to the farm config (default: `./farm_config.toml`)
//! - `RUST_LOG`: logging level (default: info)

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use wake_steer::config::{self, defaults, FarmConfig};
use wake_steer::optimization::{
    validate, yaw_power_loss_percent, BruteForceOptimizer, SearchSpace, SweepProgress,
};
use wake_steer::pipeline::{RealtimeRun, SteeringService};
use wake_steer::sources::{ConditionSource, JsonLinesSource, StaticSource, TimeWindow};
use wake_steer::storage::{InMemoryPredictionStore, PredictionStore, SledPredictionStore};
use wake_steer::types::{OptimizationResult, Prediction, WindCondition, YawVector};
use wake_steer::SimulationOracle;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "wake-steer")]
#[command(about = "Predictive wake-steering yaw optimization")]
#[command(version)]
struct CliArgs {
    /// Farm config file (overrides the standard search order)
    #[arg(long, global = true, env = "WAKE_STEER_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Print results as JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,

    /// Keep predictions in memory instead of the sled store
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Stage 1: sweep under the forecast and store the prediction
    Predict {
        /// Forecast as SPEED,DIRECTION,TI
        #[arg(long, value_parser = parse_condition, conflicts_with = "forecast_file")]
        forecast: Option<WindCondition>,
        /// JSON-lines file of timestamped forecast records
        #[arg(long)]
        forecast_file: Option<PathBuf>,
        /// Hour to read from the file (RFC 3339, default: current hour)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Stage 2: validate the latest prediction and run the scoped search
    Realtime {
        /// Measured condition as SPEED,DIRECTION,TI
        #[arg(long, value_parser = parse_condition, conflicts_with = "actual_file")]
        actual: Option<WindCondition>,
        /// JSON-lines file of timestamped measurements
        #[arg(long)]
        actual_file: Option<PathBuf>,
        /// Hour to read from the file (RFC 3339, default: current hour)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
        /// Repeat every N seconds until Ctrl-C
        #[arg(long, value_name = "SECONDS")]
        watch: Option<u64>,
    },

    /// Zero-centred brute-force sweep for one condition
    Sweep {
        /// Condition as SPEED,DIRECTION,TI
        #[arg(long, value_parser = parse_condition)]
        wind: WindCondition,
        /// Per-turbine half-width (default: the range policy's recommendation)
        #[arg(long)]
        half_width: Option<f64>,
    },

    /// Compare a forecast with a measured condition
    Validate {
        #[arg(long, value_parser = parse_condition)]
        forecast: WindCondition,
        #[arg(long, value_parser = parse_condition)]
        actual: WindCondition,
    },

    /// Recommended search range and its cost for one condition
    Range {
        #[arg(long, value_parser = parse_condition)]
        wind: WindCondition,
    },

    /// Write the default farm config
    InitConfig {
        #[arg(default_value = defaults::LOCAL_CONFIG_FILE)]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// `SPEED,DIRECTION,TI` with TI optional (default 0.08).
fn parse_condition(s: &str) -> Result<WindCondition, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if !(2..=3).contains(&parts.len()) {
        return Err(format!("expected SPEED,DIRECTION[,TI], got '{s}'"));
    }
    let num = |i: usize, name: &str| -> Result<f64, String> {
        parts[i]
            .parse::<f64>()
            .map_err(|e| format!("{name} '{}': {e}", parts[i]))
    };
    let ti = if parts.len() == 3 { num(2, "turbulence intensity")? } else { 0.08 };
    let condition = WindCondition::new(num(0, "wind speed")?, num(1, "wind direction")?, ti);
    condition.validate()?;
    Ok(condition)
}

// ============================================================================
// Wiring
// ============================================================================

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<FarmConfig> {
    let config = match path {
        Some(p) => FarmConfig::load_from_file(p)
            .with_context(|| format!("loading farm config {}", p.display()))?,
        None => FarmConfig::load(),
    };
    info!(
        farm = %config.farm.name,
        turbines = config.farm.turbines.len(),
        limit_deg = config.yaw.limit_deg,
        step = config.yaw.step,
        "Farm config ready"
    );
    Ok(config)
}

fn open_store(config: &FarmConfig, in_memory: bool) -> Result<Arc<dyn PredictionStore>> {
    if in_memory {
        return Ok(Arc::new(InMemoryPredictionStore::new()));
    }
    let store = SledPredictionStore::open(&config.storage.path)
        .with_context(|| format!("opening prediction store {}", config.storage.path.display()))?;
    Ok(Arc::new(store))
}

fn condition_source(
    condition: Option<WindCondition>,
    file: Option<PathBuf>,
    flag: &str,
) -> Result<Arc<dyn ConditionSource>> {
    match (condition, file) {
        (Some(c), _) => Ok(Arc::new(StaticSource::new(c))),
        (None, Some(path)) => Ok(Arc::new(JsonLinesSource::new(path))),
        (None, None) => bail!("either --{flag} or --{flag}-file is required"),
    }
}

fn current_window(at: Option<DateTime<Utc>>) -> TimeWindow {
    TimeWindow::hour_containing(at.unwrap_or_else(Utc::now))
}

fn shutdown_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl-C, cancelling; the partial best will be reported");
            token.cancel();
        }
    });
    cancel
}

// ============================================================================
// Reporting
// ============================================================================

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_result(result: &OptimizationResult, config: &FarmConfig) {
    let econ = &config.economics;
    println!("  Best yaw:          {}", result.best.yaw);
    println!(
        "  Farm power:        {:.1} kW (baseline {:.1} kW)",
        result.best.total_power, result.baseline.total_power
    );
    println!(
        "  Improvement:       {:+.3}% ({:+.1} kW)",
        result.improvement_percent,
        result.power_gain_kw()
    );
    println!(
        "  Annual gain:       {:.1} MWh, {:.0} at {:.0}/MWh",
        result.annual_energy_gain_mwh(econ.hours_per_year),
        result.annual_revenue_gain(econ.electricity_price_per_mwh, econ.hours_per_year),
        econ.electricity_price_per_mwh
    );
    println!(
        "  Evaluated:         {}/{} in {:.2?}{}",
        result.combinations_tested,
        result.search_size,
        result.wall_time,
        if result.complete { "" } else { " (cancelled, partial best)" }
    );
    if result.failed_candidates > 0 {
        println!("  Oracle failures:   {}", result.failed_candidates);
    }
}

fn print_prediction(prediction: &Prediction, reused: bool) {
    println!();
    println!(
        "  Day-ahead prediction{}",
        if reused { " (reused, forecast unavailable)" } else { "" }
    );
    println!("  Forecast:          {}", prediction.forecast);
    println!("  Range mode:        {}", prediction.range_mode);
    println!("  Predicted yaw:     {}", prediction.predicted_yaw);
    let levels: Vec<String> = prediction
        .per_turbine_confidence
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("  Confidence:        {}", levels.join(", "));
    println!("  Narrow half-width: ±{}°", prediction.search_half_width);
    println!(
        "  Expected gain:     {:+.3}% ({:.1} kW)",
        prediction.expected_improvement_percent, prediction.expected_total_power
    );
    if !prediction.complete {
        println!("  Sweep cancelled; prediction not stored");
    }
    println!();
}

fn print_realtime(run: &RealtimeRun, config: &FarmConfig) {
    let opt = &run.optimization;
    println!();
    println!("  Real-time optimization: {} search", opt.branch);
    if let Some(report) = &opt.validation {
        for (parameter, check) in &report.per_parameter {
            println!(
                "  {:<22} dev {:.3} / tol {:.3} {}",
                parameter.to_string(),
                check.deviation,
                check.threshold,
                if check.passed { "ok" } else { "FAILED" }
            );
        }
    } else {
        println!("  No stored prediction; searched the full recommended range");
    }
    if let Some(range) = &opt.range {
        println!("  Range mode:        {}", range.mode);
    }
    println!("  Centre:            {} ±{}°", opt.center, opt.half_width);
    print_result(&opt.result, config);
    if let Some(acc) = &run.accuracy {
        println!(
            "  Prediction error:  {:.2}° ({:?})",
            acc.mean_abs_error_deg, acc.grade
        );
    }
    println!();
}

// ============================================================================
// Commands
// ============================================================================

async fn run_sweep(
    config: &FarmConfig,
    oracle: Arc<dyn SimulationOracle>,
    wind: WindCondition,
    half_width: Option<f64>,
    json: bool,
) -> Result<()> {
    let recommendation = config.range_selector().recommend_range(&wind);
    let half_width = half_width.unwrap_or(recommendation.half_width);
    let half_width = config.yaw.clamp_half_width(half_width);
    info!(mode = %recommendation.mode, half_width, "Sweep range");

    let optimizer = BruteForceOptimizer::new(oracle, config.sweep.clone())?.with_progress(
        Arc::new(|p: SweepProgress| {
            info!(evaluated = p.evaluated, total = p.total, "Sweep progress");
        }),
    );

    let space = SearchSpace::new(
        YawVector::zeros(optimizer.turbine_count()),
        half_width,
        config.yaw.step,
    )?;
    if space.len() as f64 > defaults::LARGE_SEARCH_SPACE {
        warn!(
            combinations = space.len(),
            estimated = ?config.sweep.estimated_duration(&space),
            "Very large search space"
        );
    }

    let cancel = shutdown_on_ctrl_c();
    let result = tokio::task::spawn_blocking(move || optimizer.optimize(&wind, &space, &cancel))
        .await
        .context("sweep worker")??;

    if json {
        print_json(&result)
    } else {
        println!();
        println!("  Sweep at {wind}, ±{half_width}°");
        print_result(&result, config);
        println!();
        Ok(())
    }
}

fn run_range(config: &FarmConfig, wind: WindCondition, json: bool) -> Result<()> {
    let recommendation = config.range_selector().recommend_range(&wind);
    let half_width = config.yaw.clamp_half_width(recommendation.half_width);
    let space = SearchSpace::new(
        YawVector::zeros(config.farm.turbines.len()),
        half_width,
        config.yaw.step,
    )?;
    let estimated = config.sweep.estimated_duration(&space);

    if json {
        return print_json(&serde_json::json!({
            "wind": wind,
            "recommendation": recommendation,
            "combinations": space.len(),
            "estimated_seconds": estimated.as_secs_f64(),
            "max_yaw_power_loss_percent": yaw_power_loss_percent(half_width),
        }));
    }

    println!();
    println!("  Condition:         {wind}");
    println!("  Mode:              {}", recommendation.mode);
    println!("  Half-width:        ±{half_width}°");
    println!(
        "  Search space:      {} combinations ({} per turbine)",
        space.len(),
        space.points_per_turbine()
    );
    println!("  Estimated time:    {estimated:.2?}");
    println!(
        "  Max yaw loss:      {:.2}% per turbine",
        yaw_power_loss_percent(half_width)
    );
    println!();
    Ok(())
}

fn run_validate(
    config: &FarmConfig,
    forecast: WindCondition,
    actual: WindCondition,
    json: bool,
) -> Result<()> {
    let report = validate(&forecast, &actual, &config.tolerances());
    if json {
        return print_json(&report);
    }
    println!();
    for (parameter, check) in &report.per_parameter {
        println!(
            "  {:<22} dev {:.3} / tol {:.3} {}",
            parameter.to_string(),
            check.deviation,
            check.threshold,
            if check.passed { "ok" } else { "FAILED" }
        );
    }
    println!(
        "  Relative speed dev: {:.1}%",
        report.wind_speed_relative_deviation * 100.0
    );
    println!("  Recommendation:     {}", report.recommendation);
    println!();
    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    if let SubCommand::InitConfig { path, force } = &args.command {
        if path.exists() && !force {
            bail!("{} already exists (use --force to overwrite)", path.display());
        }
        FarmConfig::default().save_to_file(path)?;
        println!("Wrote default farm config to {}", path.display());
        return Ok(());
    }

    config::init(load_config(args.config.as_ref())?);
    let config = config::get();
    let oracle: Arc<dyn SimulationOracle> = Arc::new(config.wake_model());

    match args.command {
        SubCommand::Predict {
            forecast,
            forecast_file,
            at,
        } => {
            let service = SteeringService::new(
                config.build_optimizer(oracle)?,
                open_store(config, args.in_memory)?,
                condition_source(forecast, forecast_file, "forecast")?,
                Arc::new(StaticSource::empty()),
                config.pipeline.forecast_fallback,
            );
            let cancel = shutdown_on_ctrl_c();
            let run = service.run_day_ahead(&current_window(at), &cancel).await?;
            if args.json {
                print_json(&run)?;
            } else {
                print_prediction(&run.prediction, run.reused);
            }
        }

        SubCommand::Realtime {
            actual,
            actual_file,
            at,
            watch,
        } => {
            let service = SteeringService::new(
                config.build_optimizer(oracle)?,
                open_store(config, args.in_memory)?,
                Arc::new(StaticSource::empty()),
                condition_source(actual, actual_file, "actual")?,
                config.pipeline.forecast_fallback,
            );
            let cancel = shutdown_on_ctrl_c();
            let json = args.json;
            match watch {
                Some(secs) => {
                    service
                        .run_schedule(Duration::from_secs(secs.max(1)), cancel, |run| {
                            if json {
                                if let Ok(line) = serde_json::to_string(run) {
                                    println!("{line}");
                                }
                            } else {
                                print_realtime(run, config);
                            }
                        })
                        .await;
                }
                None => {
                    let run = service.run_realtime(&current_window(at), &cancel).await?;
                    if json {
                        print_json(&run)?;
                    } else {
                        print_realtime(&run, config);
                    }
                }
            }
        }

        SubCommand::Sweep { wind, half_width } => {
            run_sweep(config, oracle, wind, half_width, args.json).await?;
        }

        SubCommand::Validate { forecast, actual } => {
            run_validate(config, forecast, actual, args.json)?;
        }

        SubCommand::Range { wind } => run_range(config, wind, args.json)?,

        SubCommand::InitConfig { .. } => {}
    }

    Ok(())
}
