//! Adaptive search-range recommendation types

use serde::{Deserialize, Serialize};

/// How aggressively the farm should steer in a given condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeMode {
    Aggressive,
    Balanced,
    Conservative,
    /// Steering is counterproductive; report the baseline as optimal
    Disabled,
}

impl std::fmt::Display for RangeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeMode::Aggressive => write!(f, "AGGRESSIVE"),
            RangeMode::Balanced => write!(f, "BALANCED"),
            RangeMode::Conservative => write!(f, "CONSERVATIVE"),
            RangeMode::Disabled => write!(f, "DISABLED"),
        }
    }
}

/// Recommended per-turbine search half-width for a condition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeRecommendation {
    /// Degrees, always a multiple of the yaw step
    pub half_width: f64,
    pub mode: RangeMode,
}

impl RangeRecommendation {
    pub fn disabled() -> Self {
        Self {
            half_width: 0.0,
            mode: RangeMode::Disabled,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.mode == RangeMode::Disabled
    }
}
