//! Config Validation Tests
//!
//! Exercises typo detection and physical range checks on whole documents,
//! independently of the optimizer.

use wake_steer::config::validation::{
    known_config_keys, suggest_correction, validate_physical_ranges, validate_unknown_keys,
};
use wake_steer::config::{ConfigError, FarmConfig};
use wake_steer::types::{RangeMode, WindCondition};

fn example_toml() -> String {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("farm_config.example.toml");
    std::fs::read_to_string(path).unwrap()
}

// ============================================================================
// Shipped Example
// ============================================================================

#[test]
fn example_config_has_no_unknown_keys() {
    let warnings = validate_unknown_keys(&example_toml());
    assert!(warnings.is_empty(), "{warnings:?}");
}

#[test]
fn example_config_matches_built_in_defaults() {
    let config = FarmConfig::from_toml_str(&example_toml()).unwrap();
    let defaults = FarmConfig::default();
    assert_eq!(config.range_policy, defaults.range_policy);
    assert_eq!(config.validation, defaults.validation);
    assert_eq!(config.confidence, defaults.confidence);
    assert_eq!(config.wake_model, defaults.wake_model);
    assert_eq!(config.farm.turbines, defaults.farm.turbines);
    assert_eq!(config.yaw, defaults.yaw);
}

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_tolerance_warns_with_suggestion() {
    let warnings = validate_unknown_keys(
        r#"
[validation]
wind_direction_dg = 6.0
"#,
    );
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].field.contains("wind_direction_dg"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("validation.wind_direction_deg")
    );
}

#[test]
fn typo_inside_interval_is_caught() {
    let warnings = validate_unknown_keys(
        r#"
[[range_policy.rules]]
mode = "balanced"
wind_speed = { gte = 6.0 }
half_width = 8.0
"#,
    );
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].field.ends_with("wind_speed.gte"));
    assert!(warnings[0].suggestion.is_some());
}

#[test]
fn far_off_keys_get_no_suggestion() {
    let known = known_config_keys();
    assert_eq!(suggest_correction("telemetry.endpoint", &known), None);
    assert_eq!(
        suggest_correction("sweep.batchsize", &known).as_deref(),
        Some("sweep.batch_size")
    );
}

#[test]
fn typos_never_fail_loading() {
    let config = FarmConfig::from_toml_str(
        r#"
[economics]
electricty_price_per_mwh = 80.0
"#,
    )
    .unwrap();
    assert_eq!(config.economics.electricity_price_per_mwh, 50.0);
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn half_width_off_the_grid_warns() {
    let config = FarmConfig::from_toml_str(
        r#"
[yaw]
step = 2.0

[range_policy]
fallback_half_width = 5.0
"#,
    )
    .unwrap();
    let (errors, warnings) = validate_physical_ranges(&config);
    assert!(errors.is_empty(), "{errors:?}");
    assert!(
        warnings.iter().any(|w| w.message.contains("5° is off the 2° grid")),
        "{warnings:?}"
    );
}

#[test]
fn inverted_confidence_thresholds_are_rejected() {
    let err = FarmConfig::from_toml_str(
        r#"
[confidence]
high_drop_percent = 0.01
medium_drop_percent = 0.05
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn close_spacing_only_warns() {
    let mut config = FarmConfig::default();
    config.farm.turbines[1].x = 150.0;
    config.farm.turbines[1].y = 0.0;
    let (errors, warnings) = validate_physical_ranges(&config);
    assert!(errors.is_empty(), "{errors:?}");
    assert!(!warnings.is_empty());
}

#[test]
fn custom_rule_table_drives_recommendations() {
    let config = FarmConfig::from_toml_str(
        r#"
[range_policy]
fallback_mode = "conservative"
fallback_half_width = 2.0

[[range_policy.rules]]
mode = "aggressive"
wind_speed = { lt = 7.0 }
half_width = 10.0
"#,
    )
    .unwrap();
    let selector = config.range_selector();

    let low = selector.recommend_range(&WindCondition::new(5.0, 270.0, 0.2));
    assert_eq!(low.mode, RangeMode::Aggressive);
    assert_eq!(low.half_width, 10.0);

    let high = selector.recommend_range(&WindCondition::new(9.0, 270.0, 0.05));
    assert_eq!(high.mode, RangeMode::Conservative);
    assert_eq!(high.half_width, 2.0);
}

#[test]
fn unbounded_evaluation_cost_fails_loading() {
    let err = FarmConfig::from_toml_str(
        r#"
[sweep]
estimated_evaluation_ms = 1e300
"#,
    )
    .unwrap_err();
    match err {
        ConfigError::Validation(problems) => {
            assert!(format!("{problems:?}").contains("estimated_evaluation_ms"));
        }
        other => panic!("expected validation error, got {other}"),
    }
}
