use std::time::Duration;

use cdk_a11y::{KeyNavConfig, Orientation};

#[test]
fn test_default_config() {
    let config = KeyNavConfig::default();
    assert!(!config.activation_follows_focus);
    assert_eq!(config.orientation, Orientation::Ltr);
    assert_eq!(config.typeahead_debounce(), Some(Duration::from_millis(200)));
}

#[test]
fn test_missing_fields_fall_back_to_defaults() {
    let config: KeyNavConfig = serde_json::from_str(r#"{ "orientation": "rtl" }"#).unwrap();
    assert_eq!(config.orientation, Orientation::Rtl);
    assert!(!config.activation_follows_focus);
    assert_eq!(config.typeahead_debounce_ms, Some(200));
}

#[test]
fn test_typeahead_can_be_disabled() {
    let config: KeyNavConfig =
        serde_json::from_str(r#"{ "activation_follows_focus": true, "typeahead_debounce_ms": null }"#)
            .unwrap();
    assert!(config.activation_follows_focus);
    assert_eq!(config.typeahead_debounce(), None);
}

#[test]
fn test_unknown_orientation_is_rejected() {
    let result: Result<KeyNavConfig, _> = serde_json::from_str(r#"{ "orientation": "up" }"#);
    assert!(result.is_err());
}

#[test]
fn test_config_round_trips_through_json() {
    let config = KeyNavConfig {
        activation_follows_focus: true,
        orientation: Orientation::Rtl,
        typeahead_debounce_ms: Some(350),
    };
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"rtl\""));
    let back: KeyNavConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}
