//! Gaussian wake reference model
//!
//! Steady-state, single-height engineering model:
//! - Velocity deficit with a Gaussian cross-stream profile whose width grows
//!   linearly downstream at a rate set by turbulence intensity
//! - Yaw reduces the thrust seen by the flow (Ct·cos γ) and deflects the wake
//!   laterally by θ₀·x, θ₀ = 0.3·γ/cos γ·(1 − √(1 − Ct·cos γ))
//! - Overlapping wakes combine as the root-sum-square of deficits
//! - Power = power_curve(U_eff)·cos^p(γ), capped at rated power
//!
//! Deficits are evaluated at the hub point only and referenced to the
//! free-stream speed, so turbine ordering does not matter.

use serde::{Deserialize, Serialize};

use super::{OracleOutput, SimulationError, SimulationOracle};
use crate::types::{WindCondition, YawVector};

/// Hub position in farm coordinates (x east, y north, metres).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurbinePosition {
    pub x: f64,
    pub y: f64,
}

/// Reference-turbine and wake constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeModelParams {
    /// kg/m³
    pub air_density: f64,
    /// Rotor power coefficient below rated
    pub power_coefficient: f64,
    /// Rotor thrust coefficient (aligned)
    pub thrust_coefficient: f64,
    /// kW
    pub rated_power_kw: f64,
    /// m/s
    pub cut_in_speed: f64,
    /// m/s
    pub cut_out_speed: f64,
    /// Exponent p in cos^p(γ) yaw power loss
    pub yaw_power_exponent: f64,
    /// Wake growth rate per unit turbulence intensity
    pub wake_expansion_ti_slope: f64,
    /// Wake growth rate at zero turbulence
    pub wake_expansion_intercept: f64,
    /// Yaw magnitude beyond which the model refuses to evaluate (degrees)
    pub max_yaw_deg: f64,
}

impl Default for WakeModelParams {
    fn default() -> Self {
        // NREL 5 MW class rotor
        Self {
            air_density: 1.225,
            power_coefficient: 0.45,
            thrust_coefficient: 0.8,
            rated_power_kw: 5000.0,
            cut_in_speed: 3.0,
            cut_out_speed: 25.0,
            yaw_power_exponent: 1.88,
            wake_expansion_ti_slope: 0.38,
            wake_expansion_intercept: 0.004,
            max_yaw_deg: 30.0,
        }
    }
}

/// Deterministic wake/power oracle over a fixed layout.
#[derive(Debug, Clone)]
pub struct GaussianWakeModel {
    layout: Vec<TurbinePosition>,
    rotor_diameter_m: f64,
    params: WakeModelParams,
}

impl GaussianWakeModel {
    pub fn new(layout: Vec<TurbinePosition>, rotor_diameter_m: f64, params: WakeModelParams) -> Self {
        Self {
            layout,
            rotor_diameter_m,
            params,
        }
    }

    /// Four 126 m rotors in a west-east row, 5 D apart, each hub 40 m north
    /// of the one upwind so that wakes partially overlap in westerly flow.
    pub fn reference_row() -> Self {
        Self::new(
            vec![
                TurbinePosition { x: 0.0, y: 0.0 },
                TurbinePosition { x: 630.0, y: 40.0 },
                TurbinePosition { x: 1260.0, y: 80.0 },
                TurbinePosition { x: 1890.0, y: 120.0 },
            ],
            126.0,
            WakeModelParams::default(),
        )
    }

    pub fn layout(&self) -> &[TurbinePosition] {
        &self.layout
    }

    pub fn params(&self) -> &WakeModelParams {
        &self.params
    }

    /// Free-stream power of one aligned turbine (kW).
    pub fn power_curve(&self, speed: f64) -> f64 {
        let p = &self.params;
        if speed < p.cut_in_speed || speed >= p.cut_out_speed {
            return 0.0;
        }
        let radius = self.rotor_diameter_m / 2.0;
        let area = std::f64::consts::PI * radius * radius;
        let watts = 0.5 * p.air_density * area * p.power_coefficient * speed.powi(3);
        (watts / 1000.0).min(p.rated_power_kw)
    }

    /// Hub-height effective wind speed at every turbine.
    fn effective_speeds(&self, yaw: &YawVector, wind: &WindCondition) -> Vec<f64> {
        let p = &self.params;
        let n = self.layout.len();
        let d = self.rotor_diameter_m;

        // Unit vectors along and across the flow (wind blows *from* the direction)
        let theta = wind.wind_direction.to_radians();
        let along = (-theta.sin(), -theta.cos());
        let across = (theta.cos(), -theta.sin());

        let expansion = p.wake_expansion_ti_slope * wind.turbulence_intensity
            + p.wake_expansion_intercept;
        let sigma_0 = d / 8f64.sqrt();

        let mut deficit_sq = vec![0.0; n];
        for (i, src) in self.layout.iter().enumerate() {
            let gamma = yaw[i].to_radians();
            let ct = (p.thrust_coefficient * gamma.cos()).clamp(0.0, 1.0);
            let skew = 0.3 * gamma / gamma.cos() * (1.0 - (1.0 - ct).sqrt());

            for (j, dst) in self.layout.iter().enumerate() {
                if i == j {
                    continue;
                }
                let rx = dst.x - src.x;
                let ry = dst.y - src.y;
                let downstream = rx * along.0 + ry * along.1;
                if downstream <= 0.0 {
                    continue;
                }
                let lateral = rx * across.0 + ry * across.1;

                let sigma = expansion * downstream + sigma_0;
                let sigma_d = sigma / d;
                let radicand = (1.0 - ct / (8.0 * sigma_d * sigma_d)).max(0.0);
                let centre_deficit = 1.0 - radicand.sqrt();

                let offset = lateral - skew * downstream;
                let deficit = centre_deficit * (-(offset * offset) / (2.0 * sigma * sigma)).exp();
                deficit_sq[j] += deficit * deficit;
            }
        }

        deficit_sq
            .into_iter()
            .map(|sq| wind.wind_speed * (1.0 - sq.sqrt().min(1.0)))
            .collect()
    }
}

impl SimulationOracle for GaussianWakeModel {
    fn evaluate(
        &self,
        yaw: &YawVector,
        wind: &WindCondition,
    ) -> Result<OracleOutput, SimulationError> {
        if yaw.len() != self.layout.len() {
            return Err(SimulationError::InvalidYaw(format!(
                "expected {} angles, got {}",
                self.layout.len(),
                yaw.len()
            )));
        }
        if !yaw.within_limit(self.params.max_yaw_deg) {
            return Err(SimulationError::InvalidYaw(format!(
                "{yaw} exceeds ±{:.0}°",
                self.params.max_yaw_deg
            )));
        }
        wind.validate().map_err(SimulationError::InvalidWind)?;

        let speeds = self.effective_speeds(yaw, wind);
        let per_turbine: Vec<f64> = speeds
            .iter()
            .zip(yaw.iter())
            .map(|(&u, &angle)| {
                self.power_curve(u) * angle.to_radians().cos().powf(self.params.yaw_power_exponent)
            })
            .collect();

        if per_turbine.iter().any(|p| !p.is_finite()) {
            return Err(SimulationError::Diverged(format!(
                "non-finite turbine power for {yaw}"
            )));
        }
        Ok(OracleOutput::from_turbines(per_turbine))
    }

    fn turbine_count(&self) -> usize {
        self.layout.len()
    }

    fn name(&self) -> &str {
        "gaussian-wake"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn westerly() -> WindCondition {
        WindCondition::new(8.0, 270.0, 0.06)
    }

    fn aligned_pair() -> GaussianWakeModel {
        GaussianWakeModel::new(
            vec![
                TurbinePosition { x: 0.0, y: 0.0 },
                TurbinePosition { x: 630.0, y: 0.0 },
            ],
            126.0,
            WakeModelParams::default(),
        )
    }

    #[test]
    fn free_stream_power_matches_rotor_equation() {
        let model = aligned_pair();
        // 0.5 · 1.225 · π·63² · 0.45 · 8³ W
        let expected = 0.5 * 1.225 * std::f64::consts::PI * 63.0 * 63.0 * 0.45 * 512.0 / 1000.0;
        assert!((model.power_curve(8.0) - expected).abs() < 1e-6);
        assert_eq!(model.power_curve(2.0), 0.0);
        assert_eq!(model.power_curve(30.0), 0.0);
        assert_eq!(model.power_curve(20.0), 5000.0);
    }

    #[test]
    fn downstream_turbine_is_waked() {
        let model = aligned_pair();
        let out = model.evaluate(&YawVector::zeros(2), &westerly()).unwrap();
        assert!(out.per_turbine_power[1] < out.per_turbine_power[0] * 0.8);
        assert!((out.total_power - out.per_turbine_power.iter().sum::<f64>()).abs() < 1e-9);
    }

    #[test]
    fn opposite_flow_swaps_roles() {
        let model = aligned_pair();
        let easterly = WindCondition::new(8.0, 90.0, 0.06);
        let out = model.evaluate(&YawVector::zeros(2), &easterly).unwrap();
        assert!(out.per_turbine_power[0] < out.per_turbine_power[1]);
    }

    #[test]
    fn aligned_pair_is_symmetric_in_yaw_sign() {
        let model = aligned_pair();
        let plus = model.evaluate(&YawVector::new(vec![5.0, 0.0]), &westerly()).unwrap();
        let minus = model.evaluate(&YawVector::new(vec![-5.0, 0.0]), &westerly()).unwrap();
        assert!((plus.total_power - minus.total_power).abs() < 1e-6);
    }

    #[test]
    fn yawed_turbine_loses_own_power() {
        let model = aligned_pair();
        let base = model.evaluate(&YawVector::zeros(2), &westerly()).unwrap();
        let yawed = model.evaluate(&YawVector::new(vec![10.0, 0.0]), &westerly()).unwrap();
        assert!(yawed.per_turbine_power[0] < base.per_turbine_power[0]);
        assert!(yawed.per_turbine_power[1] > base.per_turbine_power[1]);
    }

    #[test]
    fn rejects_wrong_length_and_excess_yaw() {
        let model = aligned_pair();
        assert!(matches!(
            model.evaluate(&YawVector::zeros(3), &westerly()),
            Err(SimulationError::InvalidYaw(_))
        ));
        assert!(matches!(
            model.evaluate(&YawVector::new(vec![35.0, 0.0]), &westerly()),
            Err(SimulationError::InvalidYaw(_))
        ));
        assert!(matches!(
            model.evaluate(&YawVector::zeros(2), &WindCondition::new(8.0, 270.0, 1.5)),
            Err(SimulationError::InvalidWind(_))
        ));
    }

    #[test]
    fn steering_the_lead_turbine_helps_the_reference_row() {
        let model = GaussianWakeModel::reference_row();
        let wind = westerly();
        let base = model.evaluate(&YawVector::zeros(4), &wind).unwrap().total_power;
        let best_single = [-5.0, 5.0]
            .iter()
            .map(|&a| {
                model
                    .evaluate(&YawVector::new(vec![a, 0.0, 0.0, 0.0]), &wind)
                    .unwrap()
                    .total_power
            })
            .fold(f64::NEG_INFINITY, f64::max);
        assert!(best_single > base, "{best_single} <= {base}");
    }
}
