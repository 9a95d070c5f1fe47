//! Per-turbine yaw angle vectors

use serde::{Deserialize, Serialize};

/// One yaw angle (degrees) per turbine, index-aligned to the farm layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct YawVector(Vec<f64>);

impl YawVector {
    pub fn new(angles: Vec<f64>) -> Self {
        Self(angles)
    }

    /// All turbines aligned with the wind (the baseline).
    pub fn zeros(n_turbines: usize) -> Self {
        Self(vec![0.0; n_turbines])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.0.iter()
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&a| a == 0.0)
    }

    /// Copy with one component replaced.
    pub fn with_component(&self, index: usize, angle: f64) -> Self {
        let mut angles = self.0.clone();
        angles[index] = angle;
        Self(angles)
    }

    /// True when every component lies within `[-limit, +limit]`.
    pub fn within_limit(&self, limit_deg: f64) -> bool {
        self.0
            .iter()
            .all(|a| a.is_finite() && a.abs() <= limit_deg + 1e-9)
    }

    /// Mean absolute per-turbine difference (degrees).
    pub fn mean_abs_difference(&self, other: &Self) -> f64 {
        if self.0.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        sum / self.0.len() as f64
    }
}

impl std::ops::Index<usize> for YawVector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl From<Vec<f64>> for YawVector {
    fn from(angles: Vec<f64>) -> Self {
        Self(angles)
    }
}

impl std::fmt::Display for YawVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, a) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{a:+.1}°")?;
        }
        write!(f, "]")
    }
}
