//! Scenario: Config layering, hashing and guards
//!
//! GREEN when:
//! - The same layers always produce the same hash, regardless of key order.
//! - A later layer overrides an earlier one and changes the hash.
//! - Literal secrets are refused.
//! - Unused keys are reported per role (warn) or refused (fail).
//! - The shipped base config loads into a valid typed view.

use ftk_config::{
    load_layered_yaml, load_layered_yaml_from_strings, report_unused_keys, ConfigRole,
    UnusedKeyPolicy,
};

const BASE_YAML: &str = r#"
confirmation:
  min_dwell_ms: 2500
  deadline_ms: 20000
store:
  base_url: "http://127.0.0.1:8787"
  timeout_ms: 5000
"#;

const BASE_YAML_REORDERED: &str = r#"
store:
  timeout_ms: 5000
  base_url: "http://127.0.0.1:8787"
confirmation:
  deadline_ms: 20000
  min_dwell_ms: 2500
"#;

const OVERLAY_YAML: &str = r#"
confirmation:
  deadline_ms: 12000
"#;

#[test]
fn hash_is_stable_across_key_order() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn overlay_overrides_and_changes_hash() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let layered = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, layered.config_hash);

    let cfg = layered.controller().unwrap();
    assert_eq!(cfg.confirmation.deadline_ms, 12_000);
    assert_eq!(cfg.confirmation.min_dwell_ms, 2_500);
}

#[test]
fn literal_secret_is_refused() {
    let yaml = r#"
store:
  api_key: "sk_live_0123456789abcdef"
"#;
    let err = load_layered_yaml_from_strings(&[yaml]).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("CONFIG_SECRET_DETECTED"));
    assert!(msg.contains("key=store.api_key"));
    assert!(!msg.contains("sk_live_0123"), "secret must be redacted");
}

#[test]
fn unused_keys_warn_then_fail() {
    let yaml = r#"
store:
  base_url: "http://127.0.0.1:8787"
menu:
  presets: ["margherita", "diavola"]
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();

    let report =
        report_unused_keys(ConfigRole::Client, &loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert_eq!(
        report.unused,
        vec!["menu.presets[0]".to_string(), "menu.presets[1]".to_string()]
    );

    let err = report_unused_keys(ConfigRole::Client, &loaded.config_json, UnusedKeyPolicy::Fail)
        .unwrap_err();
    assert!(err.to_string().contains("CONFIG_UNUSED_KEYS"));

    // The daemon does not read the store section either.
    let report =
        report_unused_keys(ConfigRole::Daemon, &loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
    assert!(report.unused.contains(&"store.base_url".to_string()));
}

#[test]
fn shipped_base_config_is_valid() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("config")
        .join("base.yaml");
    let path = path.to_string_lossy().to_string();
    let loaded = load_layered_yaml(&[path.as_str()]).unwrap();
    let cfg = loaded.controller().unwrap();
    assert!(cfg.confirmation.min_dwell_ms < cfg.confirmation.deadline_ms);
}
