//! Farm Configuration - layout, physics and search policy as TOML values
//!
//! Every section implements `Default` with the documented defaults, so an
//! empty file (or no file) runs the reference four-turbine row.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::defaults;
use crate::error::Result as EngineResult;
use crate::optimization::{
    BruteForceOptimizer, ConfidencePolicy, PredictiveOptimizer, RangePolicy, RangeSelector,
    SweepSettings, ToleranceConfig, ValidationSettings, YawSettings,
};
use crate::oracle::{GaussianWakeModel, SimulationOracle, TurbinePosition, WakeModelParams};
use crate::pipeline::ForecastFallback;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one farm.
///
/// Load with `FarmConfig::load()` which searches:
/// 1. `$WAKE_STEER_CONFIG`
/// 2. `./farm_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FarmConfig {
    #[serde(default)]
    pub farm: FarmInfo,

    /// Reference wake-model constants
    #[serde(default)]
    pub wake_model: WakeModelParams,

    /// Admissible yaw and grid step
    #[serde(default)]
    pub yaw: YawSettings,

    /// Adaptive range rules
    #[serde(default)]
    pub range_policy: RangePolicy,

    /// Forecast tolerances
    #[serde(default)]
    pub validation: ValidationSettings,

    /// Stage-1 confidence scoring
    #[serde(default)]
    pub confidence: ConfidencePolicy,

    /// Sweep execution
    #[serde(default)]
    pub sweep: SweepSettings,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub economics: EconomicsConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl FarmConfig {
    /// Load configuration using the standard search order. A file that fails
    /// to load is reported and skipped.
    pub fn load() -> Self {
        // 1. Env var
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), farm = %config.farm.name, "Loaded farm config from {}", defaults::CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", defaults::CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to a non-existent file, falling back", defaults::CONFIG_ENV_VAR);
            }
        }

        // 2. Working directory
        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(farm = %config.farm.name, "Loaded farm config from ./{}", defaults::LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", defaults::LOCAL_CONFIG_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No farm config found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file. Unknown keys warn; invalid values fail.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config = Self::from_toml_str(&contents)
            .map_err(|e| match e {
                ConfigError::Parse(_, err) => ConfigError::Parse(path.to_path_buf(), err),
                other => other,
            })?;
        Ok(config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        // Two-pass: unknown keys first (warnings only)
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Farm config saved");
        Ok(())
    }

    /// Every impossible value, across all sections. Suspicious values are
    /// logged as warnings and do not fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        errors.extend(self.yaw.problems());
        errors.extend(self.range_policy.problems());
        errors.extend(self.validation.tolerances().problems());
        errors.extend(self.confidence.problems());
        errors.extend(self.sweep.problems());

        let (physical, warnings) = super::validation::validate_physical_ranges(self);
        errors.extend(physical);
        for w in &warnings {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Forecast tolerances with overrides applied.
    pub fn tolerances(&self) -> ToleranceConfig {
        self.validation.tolerances()
    }

    pub fn range_selector(&self) -> RangeSelector {
        RangeSelector::new(self.range_policy.clone(), self.yaw.step)
    }

    /// Reference oracle over the configured layout.
    pub fn wake_model(&self) -> GaussianWakeModel {
        let params = WakeModelParams {
            max_yaw_deg: self.wake_model.max_yaw_deg.max(self.yaw.limit_deg),
            ..self.wake_model.clone()
        };
        GaussianWakeModel::new(self.farm.turbines.clone(), self.farm.rotor_diameter_m, params)
    }

    /// Two-stage optimizer over `oracle` with every policy from this config.
    pub fn build_optimizer(
        &self,
        oracle: Arc<dyn SimulationOracle>,
    ) -> EngineResult<PredictiveOptimizer> {
        let sweep = BruteForceOptimizer::new(oracle, self.sweep.clone())?;
        Ok(PredictiveOptimizer::new(
            sweep,
            self.range_selector(),
            self.tolerances(),
            self.confidence.clone(),
            self.yaw,
        ))
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Farm identification and layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmInfo {
    pub name: String,
    /// Metres
    pub rotor_diameter_m: f64,
    /// Hub positions, index-aligned to yaw vectors
    pub turbines: Vec<TurbinePosition>,
}

impl Default for FarmInfo {
    fn default() -> Self {
        let reference = GaussianWakeModel::reference_row();
        Self {
            name: "reference-row".to_string(),
            rotor_diameter_m: 126.0,
            turbines: reference.layout().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// sled directory for day-ahead predictions
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(defaults::PREDICTION_STORE_PATH),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomicsConfig {
    /// $/MWh
    pub electricity_price_per_mwh: f64,
    pub hours_per_year: f64,
}

impl Default for EconomicsConfig {
    fn default() -> Self {
        Self {
            electricity_price_per_mwh: defaults::ELECTRICITY_PRICE_PER_MWH,
            hours_per_year: defaults::HOURS_PER_YEAR,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// What stage 1 does when the forecast cannot be fetched
    pub forecast_fallback: ForecastFallback,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),
    #[error("config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("config validation failed:\n  - {}", .0.join("\n  - "))]
    Validation(Vec<String>),
}
