//! Typed configuration view with defaults.
//!
//! Every section and every key is optional in YAML; missing values fall back
//! to the defaults below. Cross-field checks run in [`ControllerConfig::validate`].

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub confirmation: ConfirmationConfig,
    pub store: StoreConfig,
    pub audit: AuditConfig,
    pub server: ServerConfig,
}

/// Checkout confirmation timings, all in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmationConfig {
    /// Minimum time the "processing" state stays on screen.
    pub min_dwell_ms: u64,
    /// Hard redirect budget from session start.
    pub deadline_ms: u64,
    /// Deadline countdown tick.
    pub tick_ms: u64,
    /// Duration of the 0→100% completion animation.
    pub progress_ms: u64,
    /// Progress animation frame interval.
    pub progress_step_ms: u64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            min_dwell_ms: 2_500,
            deadline_ms: 20_000,
            tick_ms: 1_000,
            progress_ms: 1_500,
            progress_step_ms: 50,
        }
    }
}

impl ConfirmationConfig {
    pub fn min_dwell(&self) -> Duration {
        Duration::from_millis(self.min_dwell_ms)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn progress(&self) -> Duration {
        Duration::from_millis(self.progress_ms)
    }

    pub fn progress_step(&self) -> Duration {
        Duration::from_millis(self.progress_step_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8787".to_string(),
            timeout_ms: 5_000,
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// JSONL audit log; `None` disables the audit trail.
    pub path: Option<String>,
    pub hash_chain: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: None,
            hash_chain: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8787".to_string(),
        }
    }
}

impl ControllerConfig {
    pub fn from_json(v: &Value) -> Result<Self> {
        let cfg: ControllerConfig =
            serde_json::from_value(v.clone()).context("CONFIG_INVALID: typed decode failed")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.confirmation;
        for (name, v) in [
            ("confirmation.min_dwell_ms", c.min_dwell_ms),
            ("confirmation.deadline_ms", c.deadline_ms),
            ("confirmation.tick_ms", c.tick_ms),
            ("confirmation.progress_ms", c.progress_ms),
            ("confirmation.progress_step_ms", c.progress_step_ms),
            ("store.timeout_ms", self.store.timeout_ms),
        ] {
            if v == 0 {
                bail!("CONFIG_INVALID: {name} must be > 0");
            }
        }
        if c.min_dwell_ms >= c.deadline_ms {
            bail!(
                "CONFIG_INVALID: confirmation.min_dwell_ms ({}) must be < deadline_ms ({})",
                c.min_dwell_ms,
                c.deadline_ms
            );
        }
        if c.tick_ms > c.deadline_ms {
            bail!(
                "CONFIG_INVALID: confirmation.tick_ms ({}) must be <= deadline_ms ({})",
                c.tick_ms,
                c.deadline_ms
            );
        }
        if self.store.base_url.trim().is_empty() {
            bail!("CONFIG_INVALID: store.base_url must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = ControllerConfig::from_json(&json!({})).unwrap();
        assert_eq!(cfg, ControllerConfig::default());
        assert_eq!(cfg.confirmation.min_dwell(), Duration::from_millis(2_500));
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let cfg =
            ControllerConfig::from_json(&json!({ "confirmation": { "deadline_ms": 9000 } })).unwrap();
        assert_eq!(cfg.confirmation.deadline_ms, 9_000);
        assert_eq!(cfg.confirmation.tick_ms, 1_000);
    }

    #[test]
    fn dwell_must_fit_inside_deadline() {
        let err = ControllerConfig::from_json(&json!({
            "confirmation": { "min_dwell_ms": 5000, "deadline_ms": 5000 }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("min_dwell_ms"));
    }

    #[test]
    fn zero_durations_are_rejected() {
        let err =
            ControllerConfig::from_json(&json!({ "confirmation": { "tick_ms": 0 } })).unwrap_err();
        assert!(err.to_string().contains("tick_ms"));
    }
}
