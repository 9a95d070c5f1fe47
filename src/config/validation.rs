//! Config validation: unknown-key detection with Levenshtein suggestions
//! and physical range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use super::defaults;
use crate::optimization::floor_to_grid;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Every valid dotted key path of `FarmConfig`. Elements of arrays of tables
/// appear under `name[]`.
///
/// Maintained by hand to match the section structs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [farm]
        "farm",
        "farm.name",
        "farm.rotor_diameter_m",
        "farm.turbines",
        "farm.turbines[].x",
        "farm.turbines[].y",
        // [wake_model]
        "wake_model",
        "wake_model.air_density",
        "wake_model.power_coefficient",
        "wake_model.thrust_coefficient",
        "wake_model.rated_power_kw",
        "wake_model.cut_in_speed",
        "wake_model.cut_out_speed",
        "wake_model.yaw_power_exponent",
        "wake_model.wake_expansion_ti_slope",
        "wake_model.wake_expansion_intercept",
        "wake_model.max_yaw_deg",
        // [yaw]
        "yaw",
        "yaw.limit_deg",
        "yaw.step",
        // [range_policy]
        "range_policy",
        "range_policy.fallback_mode",
        "range_policy.fallback_half_width",
        "range_policy.rules",
        "range_policy.rules[].mode",
        "range_policy.rules[].combine",
        "range_policy.rules[].half_width",
        "range_policy.rules[].narrowest_half_width",
        "range_policy.rules[].wind_speed",
        "range_policy.rules[].wind_speed.gt",
        "range_policy.rules[].wind_speed.ge",
        "range_policy.rules[].wind_speed.lt",
        "range_policy.rules[].wind_speed.le",
        "range_policy.rules[].turbulence_intensity",
        "range_policy.rules[].turbulence_intensity.gt",
        "range_policy.rules[].turbulence_intensity.ge",
        "range_policy.rules[].turbulence_intensity.lt",
        "range_policy.rules[].turbulence_intensity.le",
        // [validation]
        "validation",
        "validation.preset",
        "validation.wind_speed_abs",
        "validation.wind_speed_rel",
        "validation.wind_direction_deg",
        "validation.turbulence_intensity_abs",
        "validation.moderate_factor",
        "validation.direction_failure_forces_full",
        // [confidence]
        "confidence",
        "confidence.probe_deg",
        "confidence.high_drop_percent",
        "confidence.medium_drop_percent",
        "confidence.narrow_width_high",
        "confidence.narrow_width_medium",
        "confidence.narrow_width_low",
        // [sweep]
        "sweep",
        "sweep.concurrency",
        "sweep.batch_size",
        "sweep.progress_interval",
        "sweep.max_failure_diagnostics",
        "sweep.estimated_evaluation_ms",
        // [storage]
        "storage",
        "storage.path",
        // [economics]
        "economics",
        "economics.electricity_price_per_mwh",
        "economics.hours_per_year",
        // [pipeline]
        "pipeline",
        "pipeline.forecast_fallback",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// `{ a = { b = 1 }, r = [{ c = 2 }, { c = 3 }] }` yields
/// `["a", "a.b", "r", "r[].c"]`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            match v {
                toml::Value::Table(_) => keys.extend(walk_toml_keys(v, &path)),
                toml::Value::Array(items) => {
                    let element = format!("{path}[]");
                    for item in items.iter().filter(|i| i.is_table()) {
                        for key in walk_toml_keys(item, &element) {
                            if !keys.contains(&key) {
                                keys.push(key);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Closest known key within edit distance 3; ties go to the alphabetically
/// first key so suggestions are stable.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|k| (levenshtein(unknown, k), *k))
        .filter(|(dist, _)| *dist <= 3)
        .min()
        .map(|(_, k)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are reported by serde
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Physical Range Validation
// ============================================================================

/// Validate physical ranges on a parsed FarmConfig.
///
/// Returns (errors, warnings): errors are impossible values that must prevent
/// startup; warnings are suspicious but not fatal.
pub fn validate_physical_ranges(
    config: &super::FarmConfig,
) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Layout
    let farm = &config.farm;
    if farm.turbines.is_empty() {
        errors.push("farm.turbines must list at least one turbine".to_string());
    }
    if !(farm.rotor_diameter_m.is_finite() && farm.rotor_diameter_m > 0.0) {
        errors.push(format!(
            "farm.rotor_diameter_m = {} must be > 0",
            farm.rotor_diameter_m
        ));
    }
    for (i, t) in farm.turbines.iter().enumerate() {
        if !(t.x.is_finite() && t.y.is_finite()) {
            errors.push(format!("farm.turbines[{i}] has a non-finite position"));
        }
        for (j, other) in farm.turbines.iter().enumerate().skip(i + 1) {
            let spacing = (t.x - other.x).hypot(t.y - other.y);
            if spacing < 1e-6 {
                errors.push(format!("farm.turbines[{i}] and [{j}] share a position"));
            } else if spacing < 2.0 * farm.rotor_diameter_m {
                warnings.push(ValidationWarning {
                    field: "farm.turbines".to_string(),
                    message: format!(
                        "turbines {i} and {j} are {spacing:.0} m apart, under two rotor diameters"
                    ),
                    suggestion: None,
                });
            }
        }
    }

    // Wake model: Betz limit and sane thrust
    let w = &config.wake_model;
    if !(w.power_coefficient > 0.0 && w.power_coefficient <= 16.0 / 27.0) {
        errors.push(format!(
            "wake_model.power_coefficient = {} is outside (0, 0.593] (Betz limit)",
            w.power_coefficient
        ));
    }
    if !(w.thrust_coefficient > 0.0 && w.thrust_coefficient < 1.0) {
        errors.push(format!(
            "wake_model.thrust_coefficient = {} must be within (0, 1)",
            w.thrust_coefficient
        ));
    }
    if !(w.rated_power_kw > 0.0 && w.rated_power_kw.is_finite()) {
        errors.push(format!("wake_model.rated_power_kw = {} must be > 0", w.rated_power_kw));
    }
    if !(w.cut_in_speed >= 0.0 && w.cut_in_speed < w.cut_out_speed) {
        errors.push(format!(
            "wake_model.cut_in_speed ({}) must be >= 0 and below cut_out_speed ({})",
            w.cut_in_speed, w.cut_out_speed
        ));
    }
    if !(w.air_density > 0.0 && w.air_density.is_finite()) {
        errors.push(format!("wake_model.air_density = {} must be > 0", w.air_density));
    } else if !(1.0..=1.4).contains(&w.air_density) {
        warnings.push(ValidationWarning {
            field: "wake_model.air_density".to_string(),
            message: format!(
                "wake_model.air_density = {} kg/m³ is unusual for hub height",
                w.air_density
            ),
            suggestion: None,
        });
    }
    if !(w.yaw_power_exponent >= 0.0 && w.wake_expansion_ti_slope >= 0.0 && w.wake_expansion_intercept >= 0.0) {
        errors.push("wake_model exponents and expansion rates must be >= 0".to_string());
    }

    // Search cost
    let step = config.yaw.step;
    if step > 0.0 {
        let widest = config
            .range_policy
            .rules
            .iter()
            .map(|r| r.half_width)
            .chain(std::iter::once(config.range_policy.fallback_half_width))
            .fold(0.0, f64::max);
        if widest > config.yaw.limit_deg {
            warnings.push(ValidationWarning {
                field: "range_policy".to_string(),
                message: format!(
                    "widest half-width {widest}° exceeds yaw.limit_deg {}°; searches are clamped",
                    config.yaw.limit_deg
                ),
                suggestion: None,
            });
        }
        let c = &config.confidence;
        let configured = config
            .range_policy
            .rules
            .iter()
            .flat_map(|r| std::iter::once(r.half_width).chain(r.narrowest_half_width))
            .chain([
                config.range_policy.fallback_half_width,
                c.narrow_width_high,
                c.narrow_width_medium,
                c.narrow_width_low,
            ]);
        for w in configured.filter(|w| w.is_finite()) {
            let floored = floor_to_grid(w, step);
            if (w - floored).abs() > 1e-9 {
                warnings.push(ValidationWarning {
                    field: "yaw.step".to_string(),
                    message: format!("half-width {w}° is off the {step}° grid and will be floored to {floored}°"),
                    suggestion: None,
                });
            }
        }

        let points = 2.0 * widest.min(config.yaw.limit_deg) / step + 1.0;
        let size = points.powi(i32::try_from(farm.turbines.len()).unwrap_or(i32::MAX));
        if size > defaults::LARGE_SEARCH_SPACE {
            warnings.push(ValidationWarning {
                field: "range_policy".to_string(),
                message: format!(
                    "widest full search covers {size:.2e} candidates; expect very long sweeps"
                ),
                suggestion: None,
            });
        }
    }

    // Economics
    let e = &config.economics;
    if !(e.electricity_price_per_mwh >= 0.0 && e.electricity_price_per_mwh.is_finite()) {
        errors.push(format!(
            "economics.electricity_price_per_mwh = {} must be >= 0",
            e.electricity_price_per_mwh
        ));
    }
    if !(e.hours_per_year > 0.0 && e.hours_per_year <= 8_784.0) {
        errors.push(format!(
            "economics.hours_per_year = {} must be within (0, 8784]",
            e.hours_per_year
        ));
    }

    (errors, warnings)
}
