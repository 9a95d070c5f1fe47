//! Farm Configuration Module
//!
//! Layout, wake-model constants, search policy and service settings loaded
//! from TOML, with built-in defaults for everything.
//!
//! ## Loading Order
//!
//! 1. `WAKE_STEER_CONFIG` environment variable (path to TOML file)
//! 2. `farm_config.toml` in the current working directory
//! 3. Built-in defaults (the reference four-turbine row)
//!
//! ## Usage
//!
//! ```ignore
//! // In main():
//! config::init(FarmConfig::load());
//!
//! // Anywhere else:
//! let step = config::get().yaw.step;
//! ```

mod farm_config;
pub mod defaults;
pub mod validation;

pub use farm_config::*;

use std::sync::OnceLock;

static FARM_CONFIG: OnceLock<FarmConfig> = OnceLock::new();

/// Install the process-wide configuration. Later calls are ignored.
pub fn init(config: FarmConfig) {
    if FARM_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// The process-wide configuration, or built-in defaults if `init()` was never
/// called.
pub fn get() -> &'static FarmConfig {
    FARM_CONFIG.get_or_init(|| {
        tracing::warn!("config::get() called before config::init(), using built-in defaults");
        FarmConfig::default()
    })
}

pub fn is_initialized() -> bool {
    FARM_CONFIG.get().is_some()
}
