//! Adaptive search range
//!
//! Maps a wind condition to a search half-width and steering mode through an
//! ordered rule table; the first matching rule wins. Steering pays most in
//! low wind and low turbulence and is switched off when both are high.
//!
//! Rules are configuration. The defaults reproduce:
//!
//! | order | condition                                   | half-width | mode         |
//! |-------|---------------------------------------------|------------|--------------|
//! | 1     | wind ≥ 12 AND TI ≥ 0.13                     | 0°         | DISABLED     |
//! | 2     | wind ≥ 12 OR TI ≥ 0.13                      | 3°         | CONSERVATIVE |
//! | 3     | wind ≤ 6 AND TI ≤ 0.05                      | 12°→10°    | AGGRESSIVE   |
//! | 4     | 6 < wind < 11 AND 0.05 < TI < 0.12          | 8°→5°      | BALANCED     |
//! | else  |                                             | 5°         | BALANCED     |
//!
//! Where a rule gives a widest→narrowest pair, the half-width narrows linearly
//! across the rule's turbulence interval and is floored onto the yaw grid.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::search_space::floor_to_grid;
use crate::types::{RangeMode, RangeRecommendation, WindCondition};

/// Open/closed bounds on one variable. Unset bounds are unconstrained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Interval {
    pub gt: Option<f64>,
    pub ge: Option<f64>,
    pub lt: Option<f64>,
    pub le: Option<f64>,
}

impl Interval {
    pub fn at_least(v: f64) -> Self {
        Self { ge: Some(v), ..Self::default() }
    }

    pub fn at_most(v: f64) -> Self {
        Self { le: Some(v), ..Self::default() }
    }

    pub fn open(lo: f64, hi: f64) -> Self {
        Self { gt: Some(lo), lt: Some(hi), ..Self::default() }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.gt.is_none() && self.ge.is_none() && self.lt.is_none() && self.le.is_none()
    }

    pub fn contains(&self, v: f64) -> bool {
        if v.is_nan() {
            return false;
        }
        self.gt.map_or(true, |b| v > b)
            && self.ge.map_or(true, |b| v >= b)
            && self.lt.map_or(true, |b| v < b)
            && self.le.map_or(true, |b| v <= b)
    }

    /// Tightest lower bound, if any.
    fn lower(&self) -> Option<f64> {
        match (self.gt, self.ge) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    /// Tightest upper bound, if any.
    fn upper(&self) -> Option<f64> {
        match (self.lt, self.le) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// How a rule's constrained intervals combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combine {
    #[default]
    All,
    Any,
}

/// One row of the range table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeRule {
    pub mode: RangeMode,
    #[serde(default)]
    pub combine: Combine,
    #[serde(default)]
    pub wind_speed: Interval,
    #[serde(default)]
    pub turbulence_intensity: Interval,
    /// Half-width at the low-turbulence edge of the rule (degrees)
    pub half_width: f64,
    /// Half-width at the high-turbulence edge; `None` keeps `half_width` flat
    #[serde(default)]
    pub narrowest_half_width: Option<f64>,
}

impl RangeRule {
    /// Unconstrained intervals do not take part: `all` over nothing matches,
    /// `any` over nothing does not.
    pub fn matches(&self, wind: &WindCondition) -> bool {
        let checks = [
            (&self.wind_speed, wind.wind_speed),
            (&self.turbulence_intensity, wind.turbulence_intensity),
        ];
        let mut active = checks.iter().filter(|(i, _)| !i.is_unconstrained());
        match self.combine {
            Combine::All => active.all(|(i, v)| i.contains(*v)),
            Combine::Any => active.any(|(i, v)| i.contains(*v)),
        }
    }

    /// Half-width for a condition this rule matched, before grid flooring.
    fn raw_half_width(&self, turbulence_intensity: f64) -> f64 {
        let Some(narrowest) = self.narrowest_half_width else {
            return self.half_width;
        };
        // Turbulence is non-negative, so an open lower end starts at zero
        let lo = self.turbulence_intensity.lower().unwrap_or(0.0);
        let Some(hi) = self.turbulence_intensity.upper() else {
            return self.half_width;
        };
        if hi <= lo {
            return self.half_width;
        }
        let t = ((turbulence_intensity - lo) / (hi - lo)).clamp(0.0, 1.0);
        self.half_width + t * (narrowest - self.half_width)
    }
}

/// Ordered rule table plus the fallback used when nothing matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangePolicy {
    pub rules: Vec<RangeRule>,
    pub fallback_mode: RangeMode,
    pub fallback_half_width: f64,
}

impl Default for RangePolicy {
    fn default() -> Self {
        Self {
            rules: vec![
                RangeRule {
                    mode: RangeMode::Disabled,
                    combine: Combine::All,
                    wind_speed: Interval::at_least(12.0),
                    turbulence_intensity: Interval::at_least(0.13),
                    half_width: 0.0,
                    narrowest_half_width: None,
                },
                RangeRule {
                    mode: RangeMode::Conservative,
                    combine: Combine::Any,
                    wind_speed: Interval::at_least(12.0),
                    turbulence_intensity: Interval::at_least(0.13),
                    half_width: 3.0,
                    narrowest_half_width: None,
                },
                RangeRule {
                    mode: RangeMode::Aggressive,
                    combine: Combine::All,
                    wind_speed: Interval::at_most(6.0),
                    turbulence_intensity: Interval::at_most(0.05),
                    half_width: 12.0,
                    narrowest_half_width: Some(10.0),
                },
                RangeRule {
                    mode: RangeMode::Balanced,
                    combine: Combine::All,
                    wind_speed: Interval::open(6.0, 11.0),
                    turbulence_intensity: Interval::open(0.05, 0.12),
                    half_width: 8.0,
                    narrowest_half_width: Some(5.0),
                },
            ],
            fallback_mode: RangeMode::Balanced,
            fallback_half_width: 5.0,
        }
    }
}

impl RangePolicy {
    /// Problems with the table, empty when it is usable.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (i, rule) in self.rules.iter().enumerate() {
            let widths = [Some(rule.half_width), rule.narrowest_half_width];
            for w in widths.into_iter().flatten() {
                if !w.is_finite() || w < 0.0 {
                    problems.push(format!(
                        "range_policy.rules[{i}] ({}): half-width {w} must be a finite value >= 0",
                        rule.mode
                    ));
                }
            }
            if rule.mode == RangeMode::Disabled && rule.half_width != 0.0 {
                problems.push(format!(
                    "range_policy.rules[{i}]: DISABLED rules must have half_width = 0"
                ));
            }
            if rule.mode != RangeMode::Disabled && rule.half_width == 0.0 {
                problems.push(format!(
                    "range_policy.rules[{i}] ({}): half_width 0 is only valid for DISABLED",
                    rule.mode
                ));
            }
            for (name, iv) in [
                ("wind_speed", &rule.wind_speed),
                ("turbulence_intensity", &rule.turbulence_intensity),
            ] {
                if let (Some(lo), Some(hi)) = (iv.lower(), iv.upper()) {
                    if lo > hi {
                        problems.push(format!(
                            "range_policy.rules[{i}].{name}: lower bound {lo} exceeds upper bound {hi}"
                        ));
                    }
                }
            }
        }
        if !self.fallback_half_width.is_finite() || self.fallback_half_width < 0.0 {
            problems.push(format!(
                "range_policy.fallback_half_width {} must be a finite value >= 0",
                self.fallback_half_width
            ));
        }
        problems
    }
}

/// Applies a [`RangePolicy`] on a fixed yaw grid.
#[derive(Debug, Clone)]
pub struct RangeSelector {
    policy: RangePolicy,
    step: f64,
}

impl RangeSelector {
    pub fn new(policy: RangePolicy, step: f64) -> Self {
        Self { policy, step }
    }

    pub fn policy(&self) -> &RangePolicy {
        &self.policy
    }

    pub fn recommend_range(&self, wind: &WindCondition) -> RangeRecommendation {
        let matched = self.policy.rules.iter().position(|r| r.matches(wind));

        let (mode, raw) = match matched {
            Some(i) => {
                let rule = &self.policy.rules[i];
                (rule.mode, rule.raw_half_width(wind.turbulence_intensity))
            }
            None => (self.policy.fallback_mode, self.policy.fallback_half_width),
        };

        let recommendation = if mode == RangeMode::Disabled {
            RangeRecommendation::disabled()
        } else {
            RangeRecommendation {
                half_width: floor_to_grid(raw, self.step),
                mode,
            }
        };

        debug!(
            wind = %wind,
            rule = ?matched,
            mode = %recommendation.mode,
            half_width = recommendation.half_width,
            "Range recommendation"
        );
        recommendation
    }
}

impl Default for RangeSelector {
    fn default() -> Self {
        Self::new(RangePolicy::default(), 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recommend(speed: f64, ti: f64) -> RangeRecommendation {
        RangeSelector::default().recommend_range(&WindCondition::new(speed, 270.0, ti))
    }

    #[test]
    fn default_table_rows() {
        let low = recommend(5.0, 0.04);
        assert_eq!(low.mode, RangeMode::Aggressive);
        assert!((10.0..=12.0).contains(&low.half_width), "{}", low.half_width);

        let mid = recommend(8.5, 0.07);
        assert_eq!(mid.mode, RangeMode::Balanced);
        assert!((5.0..=8.0).contains(&mid.half_width), "{}", mid.half_width);

        let windy = recommend(13.0, 0.08);
        assert_eq!(windy.mode, RangeMode::Conservative);
        assert_eq!(windy.half_width, 3.0);

        let turbulent = recommend(8.0, 0.15);
        assert_eq!(turbulent.mode, RangeMode::Conservative);

        let both = recommend(14.0, 0.16);
        assert_eq!(both, RangeRecommendation::disabled());
        assert!(both.is_disabled());
    }

    #[test]
    fn gaps_fall_back_to_balanced() {
        // 11 < wind < 12 is covered by no rule
        let r = recommend(11.5, 0.08);
        assert_eq!(r.mode, RangeMode::Balanced);
        assert_eq!(r.half_width, 5.0);
    }

    #[test]
    fn half_width_narrows_with_turbulence_inside_a_band() {
        let calm = recommend(8.0, 0.051);
        let rough = recommend(8.0, 0.119);
        assert_eq!(calm.half_width, 7.0);
        assert_eq!(rough.half_width, 5.0);

        assert_eq!(recommend(4.0, 0.0).half_width, 12.0);
        assert_eq!(recommend(4.0, 0.05).half_width, 10.0);
    }

    #[test]
    fn widths_stay_on_the_grid() {
        let selector = RangeSelector::new(RangePolicy::default(), 0.5);
        let r = selector.recommend_range(&WindCondition::new(8.0, 270.0, 0.06));
        assert_eq!(r.half_width % 0.5, 0.0);
    }

    #[test]
    fn mode_only_degrades_as_turbulence_rises() {
        let mut previous: Option<RangeRecommendation> = None;
        for step in 0..=40 {
            let ti = 0.051 + step as f64 * 0.0025;
            let r = recommend(8.5, ti);
            if let Some(prev) = previous {
                assert!(r.mode >= prev.mode, "TI {ti}: {} after {}", r.mode, prev.mode);
                assert!(r.half_width <= prev.half_width, "TI {ti}");
            }
            previous = Some(r);
        }
        assert_eq!(recommend(8.5, 0.07).mode, RangeMode::Balanced);
        assert!(recommend(8.5, 0.14).mode >= RangeMode::Conservative);
    }

    #[test]
    fn combine_ignores_unconstrained_intervals() {
        let rule = RangeRule {
            mode: RangeMode::Conservative,
            combine: Combine::Any,
            wind_speed: Interval::default(),
            turbulence_intensity: Interval::at_least(0.2),
            half_width: 3.0,
            narrowest_half_width: None,
        };
        assert!(!rule.matches(&WindCondition::new(8.0, 0.0, 0.1)));
        assert!(rule.matches(&WindCondition::new(8.0, 0.0, 0.25)));
    }

    #[test]
    fn default_policy_has_no_problems() {
        assert!(RangePolicy::default().problems().is_empty());

        let mut bad = RangePolicy::default();
        bad.rules[0].half_width = 2.0;
        bad.rules[2].turbulence_intensity = Interval { ge: Some(0.2), le: Some(0.1), ..Interval::default() };
        assert_eq!(bad.problems().len(), 2);
    }

    #[test]
    fn policy_parses_from_toml() {
        let policy: RangePolicy = toml::from_str(
            r#"
            fallback_mode = "conservative"
            fallback_half_width = 2.0

            [[rules]]
            mode = "aggressive"
            wind_speed = { le = 7.0 }
            half_width = 9.0
            "#,
        )
        .unwrap();
        assert_eq!(policy.rules.len(), 1);
        assert_eq!(policy.rules[0].combine, Combine::All);
        assert_eq!(policy.fallback_mode, RangeMode::Conservative);
    }
}
