//! Yaw search-space enumeration
//!
//! The space is the Cartesian product of per-turbine grids
//! `{c − w, c − w + s, …, c + w}`. Candidates are addressed by a mixed-radix
//! index with turbine 0 as the most significant digit, so turbine 0 varies
//! slowest. Enumeration order is fixed and is the tie-break law of the sweep.

use crate::error::{Result, WakeSteerError};
use crate::types::YawVector;

const GRID_TOLERANCE: f64 = 1e-9;

/// Finite, restartable, index-addressable set of candidate yaw vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpace {
    center: YawVector,
    half_width: f64,
    step: f64,
    /// Grid points per turbine (2·w/s + 1)
    points_per_turbine: u64,
    len: u64,
}

impl SearchSpace {
    /// Build the space around `center`.
    ///
    /// Fails with a configuration error when the step is not positive, the
    /// half-width is negative, or the half-width is not a whole number of steps.
    pub fn new(center: YawVector, half_width: f64, step: f64) -> Result<Self> {
        if center.is_empty() {
            return Err(WakeSteerError::Configuration(
                "search center must contain at least one turbine".to_string(),
            ));
        }
        if center.iter().any(|a| !a.is_finite()) {
            return Err(WakeSteerError::Configuration(format!(
                "search center {center} contains non-finite angles"
            )));
        }
        let steps_each_side = grid_steps(half_width, step)?;
        let points_per_turbine = 2 * steps_each_side + 1;

        let exponent = u32::try_from(center.len()).map_err(|_| {
            WakeSteerError::Configuration(format!("{} turbines is too many", center.len()))
        })?;
        let len = points_per_turbine.checked_pow(exponent).ok_or_else(|| {
            WakeSteerError::Configuration(format!(
                "search space {points_per_turbine}^{exponent} overflows"
            ))
        })?;

        Ok(Self {
            center,
            half_width,
            step,
            points_per_turbine,
            len,
        })
    }

    /// `(2·half_width/step + 1)^N`, known before enumeration starts.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn center(&self) -> &YawVector {
        &self.center
    }

    pub fn half_width(&self) -> f64 {
        self.half_width
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn turbine_count(&self) -> usize {
        self.center.len()
    }

    pub fn points_per_turbine(&self) -> u64 {
        self.points_per_turbine
    }

    /// Candidate at enumeration position `index`, or `None` past the end.
    pub fn candidate(&self, index: u64) -> Option<YawVector> {
        if index >= self.len {
            return None;
        }
        let n = self.center.len();
        let mut angles = vec![0.0; n];
        let mut rest = index;
        // Least significant digit is the last turbine.
        for turbine in (0..n).rev() {
            let digit = rest % self.points_per_turbine;
            rest /= self.points_per_turbine;
            angles[turbine] = self.center[turbine] - self.half_width + digit as f64 * self.step;
        }
        Some(YawVector::new(angles))
    }

    /// Enumerate every candidate in order. Each call starts from the beginning.
    pub fn iter(&self) -> SearchSpaceIter<'_> {
        SearchSpaceIter {
            space: self,
            next: 0,
        }
    }

    /// Whether every candidate stays inside `[-limit, +limit]`.
    pub fn within_limit(&self, limit_deg: f64) -> bool {
        self.center
            .iter()
            .all(|c| (c.abs() + self.half_width) <= limit_deg + GRID_TOLERANCE)
    }

    /// Wall time a sequential sweep would take at `per_evaluation`.
    pub fn estimated_duration(&self, per_evaluation: std::time::Duration) -> std::time::Duration {
        std::time::Duration::try_from_secs_f64(per_evaluation.as_secs_f64() * self.len as f64)
            .unwrap_or(std::time::Duration::MAX)
    }
}

impl<'a> IntoIterator for &'a SearchSpace {
    type Item = YawVector;
    type IntoIter = SearchSpaceIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Ordered iterator over a [`SearchSpace`].
#[derive(Debug, Clone)]
pub struct SearchSpaceIter<'a> {
    space: &'a SearchSpace,
    next: u64,
}

impl Iterator for SearchSpaceIter<'_> {
    type Item = YawVector;

    fn next(&mut self) -> Option<YawVector> {
        let candidate = self.space.candidate(self.next)?;
        self.next += 1;
        Some(candidate)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.space.len - self.next).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SearchSpaceIter<'_> {}

/// Number of grid steps in `half_width`, rejecting off-grid widths.
pub fn grid_steps(half_width: f64, step: f64) -> Result<u64> {
    if !step.is_finite() || step <= 0.0 {
        return Err(WakeSteerError::Configuration(format!(
            "yaw step {step} must be a positive number of degrees"
        )));
    }
    if !half_width.is_finite() || half_width < 0.0 {
        return Err(WakeSteerError::Configuration(format!(
            "half-width {half_width} must be a non-negative number of degrees"
        )));
    }
    let ratio = half_width / step;
    let rounded = ratio.round();
    if (ratio - rounded).abs() > GRID_TOLERANCE * ratio.max(1.0) {
        return Err(WakeSteerError::Configuration(format!(
            "half-width {half_width}° is not a multiple of step {step}°"
        )));
    }
    Ok(rounded as u64)
}

/// Largest multiple of `step` not above `value`.
pub fn floor_to_grid(value: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return value;
    }
    ((value / step) + GRID_TOLERANCE).floor().max(0.0) * step
}

/// Fraction of aligned power lost at a yaw angle under the cos³ law (%).
pub fn yaw_power_loss_percent(yaw_deg: f64) -> f64 {
    (1.0 - yaw_deg.to_radians().cos().powi(3)) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn keys(v: &YawVector) -> Vec<i64> {
        v.iter().map(|a| (a * 1000.0).round() as i64).collect()
    }

    #[test]
    fn size_matches_closed_form() {
        let space = SearchSpace::new(YawVector::zeros(4), 5.0, 1.0).unwrap();
        assert_eq!(space.len(), 14_641);
        assert_eq!(space.iter().len(), 14_641);

        let space = SearchSpace::new(YawVector::zeros(3), 2.0, 0.5).unwrap();
        assert_eq!(space.len(), 9u64.pow(3));
    }

    #[test]
    fn candidates_are_distinct_and_on_grid() {
        let center = YawVector::new(vec![-4.0, 3.0, 0.0]);
        let space = SearchSpace::new(center, 2.0, 1.0).unwrap();
        let seen: HashSet<Vec<i64>> = space.iter().map(|v| keys(&v)).collect();
        assert_eq!(seen.len() as u64, space.len());
        for v in &space {
            assert!(v[0] >= -6.0 && v[0] <= -2.0);
            assert!(v[1] >= 1.0 && v[1] <= 5.0);
            assert!(v.iter().all(|a| (a - a.round()).abs() < 1e-9));
        }
    }

    #[test]
    fn first_turbine_varies_slowest() {
        let space = SearchSpace::new(YawVector::zeros(2), 1.0, 1.0).unwrap();
        let order: Vec<Vec<f64>> = space.iter().map(|v| v.as_slice().to_vec()).collect();
        assert_eq!(order[0], vec![-1.0, -1.0]);
        assert_eq!(order[1], vec![-1.0, 0.0]);
        assert_eq!(order[2], vec![-1.0, 1.0]);
        assert_eq!(order[3], vec![0.0, -1.0]);
        assert_eq!(order[8], vec![1.0, 1.0]);
    }

    #[test]
    fn enumeration_is_restartable_and_deterministic() {
        let space = SearchSpace::new(YawVector::new(vec![1.0, -2.0, 0.0]), 3.0, 1.0).unwrap();
        let a: Vec<YawVector> = space.iter().collect();
        let b: Vec<YawVector> = space.iter().collect();
        assert_eq!(a, b);

        let again = SearchSpace::new(YawVector::new(vec![1.0, -2.0, 0.0]), 3.0, 1.0).unwrap();
        let c: Vec<YawVector> = again.iter().collect();
        assert_eq!(a, c);
    }

    #[test]
    fn indexed_access_matches_iteration() {
        let space = SearchSpace::new(YawVector::zeros(3), 2.0, 1.0).unwrap();
        for (i, v) in space.iter().enumerate() {
            assert_eq!(space.candidate(i as u64).as_ref(), Some(&v));
        }
        assert!(space.candidate(space.len()).is_none());
    }

    #[test]
    fn zero_half_width_yields_center_only() {
        let center = YawVector::new(vec![2.0, -1.0]);
        let space = SearchSpace::new(center.clone(), 0.0, 1.0).unwrap();
        assert_eq!(space.len(), 1);
        assert_eq!(space.iter().next(), Some(center));
    }

    #[test]
    fn off_grid_half_width_is_rejected() {
        let err = SearchSpace::new(YawVector::zeros(2), 2.5, 1.0).unwrap_err();
        assert!(matches!(err, WakeSteerError::Configuration(_)));
        assert!(SearchSpace::new(YawVector::zeros(2), 2.0, 0.0).is_err());
        assert!(SearchSpace::new(YawVector::zeros(2), -1.0, 1.0).is_err());
        assert!(SearchSpace::new(YawVector::zeros(0), 1.0, 1.0).is_err());
    }

    #[test]
    fn overflow_is_a_configuration_error() {
        assert!(SearchSpace::new(YawVector::zeros(40), 30.0, 1.0).is_err());
    }

    #[test]
    fn floor_to_grid_snaps_down() {
        assert_eq!(floor_to_grid(7.9, 1.0), 7.0);
        assert_eq!(floor_to_grid(8.0, 1.0), 8.0);
        assert_eq!(floor_to_grid(5.4, 0.5), 5.0);
    }

    #[test]
    fn cos_cubed_power_loss() {
        assert_eq!(yaw_power_loss_percent(0.0), 0.0);
        let loss = yaw_power_loss_percent(25.0);
        assert!(loss > 25.0 && loss < 26.0, "got {loss}");
    }
}
