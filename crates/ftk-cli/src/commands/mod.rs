//! Command handler modules for the `ftk` CLI.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod confirm;
pub mod inspect;
pub mod order;

use std::fs;

use anyhow::{Context, Result};
use ftk_config::{
    load_layered_yaml, report_unused_keys, ConfigRole, ControllerConfig, UnusedKeyPolicy,
};
use ftk_confirm::ConfirmationTimings;
use ftk_store::HttpOrderStore;
use serde_json::Value;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load a JSON payload from either an inline string or a file path.
pub fn load_payload(payload: Option<String>, payload_file: Option<String>) -> Result<Value> {
    if let Some(p) = payload_file {
        let bytes = fs::read(&p).with_context(|| format!("read payload-file failed: {}", p))?;
        // Strip UTF-8 BOM if present.
        let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
        let raw = String::from_utf8(bytes.to_vec()).context("payload-file must be UTF-8 text")?;
        let v: Value =
            serde_json::from_str(raw.trim()).context("payload-file must contain valid JSON")?;
        return Ok(v);
    }

    let raw = payload.context("must provide a JSON payload or --payload-file")?;
    let v: Value = serde_json::from_str(raw.trim()).context("payload must be valid JSON")?;
    Ok(v)
}

/// Client configuration: explicit `--config` layers first, then `FTK_CONFIG`
/// (comma-separated), then built-in defaults.
pub fn load_client_config(paths: &[String]) -> Result<ControllerConfig> {
    let from_env: Vec<String> = std::env::var("FTK_CONFIG")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    let layers = if paths.is_empty() { &from_env } else { paths };
    if layers.is_empty() {
        return Ok(ControllerConfig::default());
    }

    let refs: Vec<&str> = layers.iter().map(|s| s.as_str()).collect();
    let loaded = load_layered_yaml(&refs)?;
    let report = report_unused_keys(ConfigRole::Client, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    for key in &report.unused {
        debug!(key = %key, "config key not read by the client");
    }
    info!(config_hash = %loaded.config_hash, "config loaded");
    loaded.controller()
}

pub fn store_client(cfg: &ControllerConfig) -> Result<HttpOrderStore> {
    HttpOrderStore::new(&cfg.store.base_url, cfg.store.timeout())
        .with_context(|| format!("build order store client for {}", cfg.store.base_url))
}

pub fn timings(cfg: &ControllerConfig) -> ConfirmationTimings {
    let c = &cfg.confirmation;
    ConfirmationTimings {
        min_dwell: c.min_dwell(),
        deadline: c.deadline(),
        tick: c.tick(),
        progress: c.progress(),
        progress_step: c.progress_step(),
    }
}
