//! Forecast validation
//!
//! Decides whether a day-ahead prediction can still anchor the real-time
//! search by comparing the forecast it was made for against the measured
//! condition. Pure: same inputs, same report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::types::{
    ParameterCheck, SearchRecommendation, ValidationReport, WindCondition, WindParameter,
};

/// Tolerances for one validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceConfig {
    /// m/s
    pub wind_speed_abs: f64,
    /// Fraction of the forecast speed; either speed bound passing is enough
    pub wind_speed_rel: f64,
    /// Degrees, compared on the shorter arc
    pub wind_direction_deg: f64,
    /// Absolute turbulence-intensity points
    pub turbulence_intensity_abs: f64,
    /// A lone failure within this multiple of its threshold yields MODERATE
    pub moderate_factor: f64,
    /// A shifted wind direction moves the wakes, so a prediction-centred
    /// search is never trusted after a direction failure
    pub direction_failure_forces_full: bool,
}

impl ToleranceConfig {
    /// Production default.
    pub const CONSERVATIVE: Self = Self {
        wind_speed_abs: 1.0,
        wind_speed_rel: 0.12,
        wind_direction_deg: 8.0,
        turbulence_intensity_abs: 0.02,
        moderate_factor: 2.0,
        direction_failure_forces_full: true,
    };

    /// Falls back to a full search more often.
    pub const TIGHT: Self = Self {
        wind_speed_abs: 0.5,
        wind_speed_rel: 0.08,
        wind_direction_deg: 5.0,
        turbulence_intensity_abs: 0.015,
        ..Self::CONSERVATIVE
    };

    pub const RELAXED: Self = Self {
        wind_speed_abs: 1.5,
        wind_speed_rel: 0.15,
        wind_direction_deg: 12.0,
        turbulence_intensity_abs: 0.03,
        ..Self::CONSERVATIVE
    };

    /// Effective threshold for one parameter given the forecast.
    pub fn threshold(&self, parameter: WindParameter, forecast: &WindCondition) -> f64 {
        match parameter {
            WindParameter::WindSpeed => {
                let relative = if forecast.wind_speed > 0.0 {
                    self.wind_speed_rel * forecast.wind_speed
                } else {
                    0.0
                };
                self.wind_speed_abs.max(relative)
            }
            WindParameter::WindDirection => self.wind_direction_deg,
            WindParameter::TurbulenceIntensity => self.turbulence_intensity_abs,
        }
    }

    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        let bounds = [
            ("wind_speed_abs", self.wind_speed_abs),
            ("wind_speed_rel", self.wind_speed_rel),
            ("wind_direction_deg", self.wind_direction_deg),
            ("turbulence_intensity_abs", self.turbulence_intensity_abs),
        ];
        for (name, value) in bounds {
            if !value.is_finite() || value < 0.0 {
                problems.push(format!("validation.{name} = {value} must be a finite value >= 0"));
            }
        }
        if self.wind_direction_deg > 180.0 {
            problems.push(format!(
                "validation.wind_direction_deg = {} exceeds the largest possible deviation (180)",
                self.wind_direction_deg
            ));
        }
        if !self.moderate_factor.is_finite() || self.moderate_factor < 1.0 {
            problems.push(format!(
                "validation.moderate_factor = {} must be >= 1",
                self.moderate_factor
            ));
        }
        problems
    }
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self::CONSERVATIVE
    }
}

/// Named tolerance presets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TolerancePreset {
    #[default]
    Conservative,
    Tight,
    Relaxed,
}

impl TolerancePreset {
    pub fn tolerances(self) -> ToleranceConfig {
        match self {
            TolerancePreset::Conservative => ToleranceConfig::CONSERVATIVE,
            TolerancePreset::Tight => ToleranceConfig::TIGHT,
            TolerancePreset::Relaxed => ToleranceConfig::RELAXED,
        }
    }
}

impl std::str::FromStr for TolerancePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "conservative" => Ok(TolerancePreset::Conservative),
            "tight" => Ok(TolerancePreset::Tight),
            "relaxed" => Ok(TolerancePreset::Relaxed),
            other => Err(format!(
                "unknown tolerance preset '{other}' (expected conservative, tight or relaxed)"
            )),
        }
    }
}

/// `[validation]` section: a preset plus optional per-field overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub preset: TolerancePreset,
    pub wind_speed_abs: Option<f64>,
    pub wind_speed_rel: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    pub turbulence_intensity_abs: Option<f64>,
    pub moderate_factor: f64,
    pub direction_failure_forces_full: bool,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            preset: TolerancePreset::Conservative,
            wind_speed_abs: None,
            wind_speed_rel: None,
            wind_direction_deg: None,
            turbulence_intensity_abs: None,
            moderate_factor: 2.0,
            direction_failure_forces_full: true,
        }
    }
}

impl ValidationSettings {
    pub fn tolerances(&self) -> ToleranceConfig {
        let base = self.preset.tolerances();
        ToleranceConfig {
            wind_speed_abs: self.wind_speed_abs.unwrap_or(base.wind_speed_abs),
            wind_speed_rel: self.wind_speed_rel.unwrap_or(base.wind_speed_rel),
            wind_direction_deg: self.wind_direction_deg.unwrap_or(base.wind_direction_deg),
            turbulence_intensity_abs: self
                .turbulence_intensity_abs
                .unwrap_or(base.turbulence_intensity_abs),
            moderate_factor: self.moderate_factor,
            direction_failure_forces_full: self.direction_failure_forces_full,
        }
    }
}

/// Compare `actual` to `forecast` parameter by parameter.
///
/// NARROW when everything passes. MODERATE when exactly one parameter fails
/// and its deviation is within `moderate_factor` times its threshold (never
/// for direction when `direction_failure_forces_full`). FULL otherwise.
pub fn validate(
    forecast: &WindCondition,
    actual: &WindCondition,
    tolerances: &ToleranceConfig,
) -> ValidationReport {
    let per_parameter: BTreeMap<WindParameter, ParameterCheck> = WindParameter::ALL
        .iter()
        .map(|&parameter| {
            let deviation = forecast.deviation(actual, parameter);
            let threshold = tolerances.threshold(parameter, forecast);
            let check = ParameterCheck {
                deviation,
                threshold,
                passed: deviation <= threshold,
            };
            (parameter, check)
        })
        .collect();

    let failed: Vec<(WindParameter, ParameterCheck)> = per_parameter
        .iter()
        .filter(|(_, c)| !c.passed)
        .map(|(p, c)| (*p, *c))
        .collect();

    let recommendation = match failed.as_slice() {
        [] => SearchRecommendation::Narrow,
        [(parameter, check)] => {
            let forced = *parameter == WindParameter::WindDirection
                && tolerances.direction_failure_forces_full;
            if !forced && check.severity() <= tolerances.moderate_factor {
                SearchRecommendation::Moderate
            } else {
                SearchRecommendation::Full
            }
        }
        _ => SearchRecommendation::Full,
    };

    let wind_speed_relative_deviation = if forecast.wind_speed > 0.0 {
        (actual.wind_speed - forecast.wind_speed).abs() / forecast.wind_speed
    } else {
        0.0
    };

    debug!(
        forecast = %forecast,
        actual = %actual,
        failed = failed.len(),
        recommendation = %recommendation,
        "Forecast validated"
    );

    ValidationReport {
        per_parameter,
        wind_speed_relative_deviation,
        recommendation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forecast() -> WindCondition {
        WindCondition::new(8.5, 270.0, 0.07)
    }

    #[test]
    fn close_conditions_allow_narrow_search() {
        let actual = WindCondition::new(8.3, 268.0, 0.065);
        let report = validate(&forecast(), &actual, &ToleranceConfig::CONSERVATIVE);

        assert!(report.all_passed());
        assert_eq!(report.recommendation, SearchRecommendation::Narrow);
        let dir = report.per_parameter[&WindParameter::WindDirection];
        assert!((dir.deviation - 2.0).abs() < 1e-9);
    }

    #[test]
    fn direction_shift_forces_full_search() {
        let actual = WindCondition::new(8.5, 285.0, 0.07);
        let report = validate(&forecast(), &actual, &ToleranceConfig::CONSERVATIVE);

        let dir = report.per_parameter[&WindParameter::WindDirection];
        assert!(!dir.passed);
        assert!((dir.deviation - 15.0).abs() < 1e-9);
        assert_eq!(report.failed().count(), 1);
        assert_eq!(report.recommendation, SearchRecommendation::Full);
    }

    #[test]
    fn lone_direction_failure_is_moderate_when_not_forced() {
        let tolerances = ToleranceConfig {
            direction_failure_forces_full: false,
            ..ToleranceConfig::CONSERVATIVE
        };
        let actual = WindCondition::new(8.5, 285.0, 0.07);
        let report = validate(&forecast(), &actual, &tolerances);
        assert_eq!(report.recommendation, SearchRecommendation::Moderate);

        let far = WindCondition::new(8.5, 290.0, 0.07);
        let report = validate(&forecast(), &far, &tolerances);
        assert_eq!(report.recommendation, SearchRecommendation::Full);
    }

    #[test]
    fn turbulence_drift_is_moderate_then_full() {
        // 0.03 deviation against 0.02 threshold: 1.5×
        let moderate = WindCondition::new(8.5, 270.0, 0.10);
        assert_eq!(
            validate(&forecast(), &moderate, &ToleranceConfig::CONSERVATIVE).recommendation,
            SearchRecommendation::Moderate
        );
        // 0.05 deviation: 2.5×
        let full = WindCondition::new(8.5, 270.0, 0.12);
        assert_eq!(
            validate(&forecast(), &full, &ToleranceConfig::CONSERVATIVE).recommendation,
            SearchRecommendation::Full
        );
    }

    #[test]
    fn two_failures_are_always_full() {
        let actual = WindCondition::new(8.5, 279.0, 0.095);
        let tolerances = ToleranceConfig {
            direction_failure_forces_full: false,
            ..ToleranceConfig::CONSERVATIVE
        };
        let report = validate(&forecast(), &actual, &tolerances);
        assert_eq!(report.failed().count(), 2);
        assert_eq!(report.recommendation, SearchRecommendation::Full);
    }

    #[test]
    fn speed_passes_on_either_bound() {
        // 1.8 m/s off a 16 m/s forecast: fails 1.0 absolute, passes 12 % relative
        let f = WindCondition::new(16.0, 270.0, 0.07);
        let a = WindCondition::new(17.8, 270.0, 0.07);
        let report = validate(&f, &a, &ToleranceConfig::CONSERVATIVE);
        let speed = report.per_parameter[&WindParameter::WindSpeed];
        assert!(speed.passed);
        assert!((speed.threshold - 1.92).abs() < 1e-9);
        assert!((report.wind_speed_relative_deviation - 0.1125).abs() < 1e-9);

        // 0.9 m/s off a 4 m/s forecast: fails 12 %, passes 1.0 absolute
        let f = WindCondition::new(4.0, 270.0, 0.07);
        let a = WindCondition::new(4.9, 270.0, 0.07);
        assert!(validate(&f, &a, &ToleranceConfig::CONSERVATIVE).all_passed());
    }

    #[test]
    fn direction_deviation_wraps_through_north() {
        let f = WindCondition::new(8.0, 359.0, 0.07);
        let a = WindCondition::new(8.0, 1.0, 0.07);
        let report = validate(&f, &a, &ToleranceConfig::TIGHT);
        let dir = report.per_parameter[&WindParameter::WindDirection];
        assert!((dir.deviation - 2.0).abs() < 1e-9);
        assert_eq!(report.recommendation, SearchRecommendation::Narrow);
    }

    #[test]
    fn validation_is_idempotent() {
        let actual = WindCondition::new(9.4, 261.0, 0.09);
        for tolerances in [
            ToleranceConfig::CONSERVATIVE,
            ToleranceConfig::TIGHT,
            ToleranceConfig::RELAXED,
        ] {
            let first = validate(&forecast(), &actual, &tolerances);
            let second = validate(&forecast(), &actual, &tolerances);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn presets_order_from_tight_to_relaxed() {
        let actual = WindCondition::new(8.5, 276.0, 0.07);
        let tight = validate(&forecast(), &actual, &ToleranceConfig::TIGHT);
        let default = validate(&forecast(), &actual, &ToleranceConfig::CONSERVATIVE);
        assert_eq!(tight.recommendation, SearchRecommendation::Full);
        assert_eq!(default.recommendation, SearchRecommendation::Narrow);
    }

    #[test]
    fn settings_override_the_preset() {
        let settings = ValidationSettings {
            preset: TolerancePreset::Relaxed,
            wind_direction_deg: Some(4.0),
            ..ValidationSettings::default()
        };
        let t = settings.tolerances();
        assert_eq!(t.wind_direction_deg, 4.0);
        assert_eq!(t.wind_speed_abs, 1.5);
        assert!(t.problems().is_empty());

        assert_eq!("TIGHT".parse::<TolerancePreset>().unwrap(), TolerancePreset::Tight);
        assert!("loose".parse::<TolerancePreset>().is_err());
    }
}
