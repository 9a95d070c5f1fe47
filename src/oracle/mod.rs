//! Simulation oracle seam
//!
//! The wake/power simulator is an injected capability: the search and
//! validation logic only ever sees [`SimulationOracle`]. A deterministic
//! Gaussian-wake reference model ships for the CLI and the scenario tests.

mod gaussian_wake;

pub use gaussian_wake::{GaussianWakeModel, TurbinePosition, WakeModelParams};

use crate::types::{WindCondition, YawVector};

/// Per-turbine and total power for one yaw vector.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleOutput {
    /// kW, index-aligned to the yaw vector
    pub per_turbine_power: Vec<f64>,
    /// kW
    pub total_power: f64,
}

impl OracleOutput {
    /// Build from per-turbine powers, summing the total.
    pub fn from_turbines(per_turbine_power: Vec<f64>) -> Self {
        let total_power = per_turbine_power.iter().sum();
        Self {
            per_turbine_power,
            total_power,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    #[error("invalid yaw vector: {0}")]
    InvalidYaw(String),
    #[error("invalid wind condition: {0}")]
    InvalidWind(String),
    #[error("simulation did not converge: {0}")]
    Diverged(String),
}

/// Pure function of (yaw, wind) to power.
///
/// Implementations must be deterministic and safe to call from many threads
/// at once.
pub trait SimulationOracle: Send + Sync {
    fn evaluate(
        &self,
        yaw: &YawVector,
        wind: &WindCondition,
    ) -> Result<OracleOutput, SimulationError>;

    /// Number of turbines the oracle models.
    fn turbine_count(&self) -> usize;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "oracle"
    }
}

impl<T: SimulationOracle + ?Sized> SimulationOracle for std::sync::Arc<T> {
    fn evaluate(
        &self,
        yaw: &YawVector,
        wind: &WindCondition,
    ) -> Result<OracleOutput, SimulationError> {
        (**self).evaluate(yaw, wind)
    }

    fn turbine_count(&self) -> usize {
        (**self).turbine_count()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
