//! Atmospheric inflow conditions

use serde::{Deserialize, Serialize};

/// Free-stream inflow condition seen by the whole farm.
///
/// Immutable value. Direction is meteorological (where the wind blows
/// *from*), normalised into `[0, 360)` by [`WindCondition::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindCondition {
    /// Hub-height wind speed (m/s)
    pub wind_speed: f64,
    /// Wind direction (degrees, [0, 360))
    pub wind_direction: f64,
    /// Turbulence intensity (fraction, [0, 1))
    pub turbulence_intensity: f64,
}

impl WindCondition {
    pub fn new(wind_speed: f64, wind_direction: f64, turbulence_intensity: f64) -> Self {
        Self {
            wind_speed,
            wind_direction: wind_direction.rem_euclid(360.0),
            turbulence_intensity,
        }
    }

    /// Reject physically impossible inputs.
    pub fn validate(&self) -> Result<(), String> {
        if !self.wind_speed.is_finite() || self.wind_speed < 0.0 {
            return Err(format!(
                "wind_speed = {} must be a finite, non-negative value",
                self.wind_speed
            ));
        }
        if !self.wind_direction.is_finite() || !(0.0..360.0).contains(&self.wind_direction) {
            return Err(format!(
                "wind_direction = {} must lie in [0, 360)",
                self.wind_direction
            ));
        }
        if !self.turbulence_intensity.is_finite()
            || !(0.0..1.0).contains(&self.turbulence_intensity)
        {
            return Err(format!(
                "turbulence_intensity = {} must lie in [0, 1)",
                self.turbulence_intensity
            ));
        }
        Ok(())
    }

    /// Value of a single parameter.
    pub fn get(&self, parameter: WindParameter) -> f64 {
        match parameter {
            WindParameter::WindSpeed => self.wind_speed,
            WindParameter::WindDirection => self.wind_direction,
            WindParameter::TurbulenceIntensity => self.turbulence_intensity,
        }
    }

    /// Absolute deviation of `other` from `self` for one parameter.
    ///
    /// Direction wraps: 359° and 1° are 2° apart.
    pub fn deviation(&self, other: &Self, parameter: WindParameter) -> f64 {
        let diff = (other.get(parameter) - self.get(parameter)).abs();
        match parameter {
            WindParameter::WindDirection => {
                let diff = diff.rem_euclid(360.0);
                diff.min(360.0 - diff)
            }
            _ => diff,
        }
    }
}

impl std::fmt::Display for WindCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.0}° @ {:.1} m/s, TI {:.1}%",
            self.wind_direction,
            self.wind_speed,
            self.turbulence_intensity * 100.0
        )
    }
}

/// The three compared inflow parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindParameter {
    WindSpeed,
    WindDirection,
    TurbulenceIntensity,
}

impl WindParameter {
    pub const ALL: [Self; 3] = [
        Self::WindSpeed,
        Self::WindDirection,
        Self::TurbulenceIntensity,
    ];
}

impl std::fmt::Display for WindParameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindParameter::WindSpeed => write!(f, "wind_speed"),
            WindParameter::WindDirection => write!(f, "wind_direction"),
            WindParameter::TurbulenceIntensity => write!(f, "turbulence_intensity"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_is_normalised() {
        assert_eq!(WindCondition::new(8.0, 370.0, 0.06).wind_direction, 10.0);
        assert_eq!(WindCondition::new(8.0, -90.0, 0.06).wind_direction, 270.0);
    }

    #[test]
    fn direction_deviation_wraps() {
        let a = WindCondition::new(8.0, 359.0, 0.06);
        let b = WindCondition::new(8.0, 1.0, 0.06);
        let d = a.deviation(&b, WindParameter::WindDirection);
        assert!((d - 2.0).abs() < 1e-9, "got {d}");
    }

    #[test]
    fn validate_rejects_bad_turbulence() {
        assert!(WindCondition::new(8.0, 270.0, 1.2).validate().is_err());
        assert!(WindCondition::new(-1.0, 270.0, 0.1).validate().is_err());
        assert!(WindCondition::new(8.0, 270.0, 0.06).validate().is_ok());
    }
}
