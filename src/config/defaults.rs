//! System-wide default constants.
//!
//! Values that are not operator-tunable, or that seed the `Default` impls of
//! the configuration sections. Grouped by subsystem.

// ============================================================================
// Configuration Loading
// ============================================================================

/// Environment variable naming a farm configuration file.
pub const CONFIG_ENV_VAR: &str = "WAKE_STEER_CONFIG";

/// Configuration file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "farm_config.toml";

// ============================================================================
// Economics
// ============================================================================

/// Wholesale electricity price used for revenue estimates ($/MWh).
pub const ELECTRICITY_PRICE_PER_MWH: f64 = 50.0;

/// Hours in a (non-leap) year.
pub const HOURS_PER_YEAR: f64 = 8_760.0;

// ============================================================================
// Search Cost
// ============================================================================

/// Spaces above this many candidates draw a configuration warning.
///
/// 10⁸ evaluations at 3 ms is about 3.5 days on one core.
pub const LARGE_SEARCH_SPACE: f64 = 1e8;

// ============================================================================
// Storage
// ============================================================================

/// Default sled directory for stored predictions.
pub const PREDICTION_STORE_PATH: &str = "./data/predictions";

// ============================================================================
// Simulation
// ============================================================================

/// Forecast error (1σ) applied by the replay binary: wind speed (m/s).
pub const SIM_SPEED_ERROR_STD: f64 = 0.6;

/// Forecast error (1σ) applied by the replay binary: direction (degrees).
pub const SIM_DIRECTION_ERROR_STD: f64 = 5.0;

/// Forecast error (1σ) applied by the replay binary: turbulence intensity.
pub const SIM_TURBULENCE_ERROR_STD: f64 = 0.01;
