//! ftk-config
//!
//! Layered YAML configuration for the order daemon and its clients.
//!
//! - Layers are deep-merged in order (base, then site, then local).
//! - The merged document is serialized with sorted keys and hashed, so two
//!   deployments can prove they run the same settings.
//! - Literal payment secrets are refused; point at env vars instead.
//! - [`ControllerConfig`] is the typed view every binary reads.

mod typed;

pub use typed::{AuditConfig, ConfirmationConfig, ControllerConfig, ServerConfig, StoreConfig};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

/// Leaf strings starting with any of these abort loading.
const SECRET_PREFIXES: &[&str] = &[
    "sk_live",    // payment provider live key
    "sk_test",    // payment provider test key
    "rk_live",    // restricted key
    "whsec_",     // webhook signing secret
    "-----BEGIN", // PEM private key
];

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Typed view with defaults filled in and cross-field checks applied.
    pub fn controller(&self) -> Result<ControllerConfig> {
        ControllerConfig::from_json(&self.config_json)
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let docs = paths
        .iter()
        .map(|p| fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}")))
        .collect::<Result<Vec<_>>>()?;
    let refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&refs)
}

/// Earlier documents are the base; later ones override key by key.
pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(serde_json::Map::new());
    for (i, raw) in yaml_docs.iter().enumerate() {
        let layer: Value = serde_yaml::from_str(raw)
            .with_context(|| format!("invalid yaml in layer {}", i + 1))?;
        // An empty document parses as null and contributes nothing.
        if !layer.is_null() {
            overlay(&mut merged, layer);
        }
    }

    refuse_secret_literals(&merged)?;

    // serde_json's map is ordered by key, so this is already canonical.
    let canonical_json = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn overlay(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(into), Value::Object(from)) => {
            for (k, v) in from {
                match into.get_mut(&k) {
                    Some(existing) => overlay(existing, v),
                    None => {
                        into.insert(k, v);
                    }
                }
            }
        }
        (slot, v) => *slot = v,
    }
}

// ---------------------------------------------------------------------------
// Leaf walking
// ---------------------------------------------------------------------------

/// Every scalar in `v` with its dotted path (`store.base_url`, `menu.presets[1]`).
fn leaves(v: &Value) -> Vec<(String, &Value)> {
    fn walk<'a>(v: &'a Value, path: String, out: &mut Vec<(String, &'a Value)>) {
        match v {
            Value::Object(map) => {
                for (k, child) in map {
                    let next = if path.is_empty() {
                        k.clone()
                    } else {
                        format!("{path}.{k}")
                    };
                    walk(child, next, out);
                }
            }
            Value::Array(items) => {
                for (i, child) in items.iter().enumerate() {
                    walk(child, format!("{path}[{i}]"), out);
                }
            }
            _ => out.push((path, v)),
        }
    }
    let mut out = Vec::new();
    walk(v, String::new(), &mut out);
    out
}

fn refuse_secret_literals(v: &Value) -> Result<()> {
    for (path, leaf) in leaves(v) {
        if leaf.as_str().is_some_and(looks_like_secret) {
            bail!("CONFIG_SECRET_DETECTED key={} value=REDACTED", path);
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    t.len() >= 8 && SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

// ---------------------------------------------------------------------------
// Unused keys
// ---------------------------------------------------------------------------

/// Which binary is reading the config. Each reads different sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigRole {
    /// The order daemon hosting the authoritative store.
    Daemon,
    /// A client of the store: CLI dispatch and checkout confirmation.
    Client,
}

impl ConfigRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigRole::Daemon => "DAEMON",
            ConfigRole::Client => "CLIENT",
        }
    }

    /// Top-level sections this role reads.
    pub fn sections(self) -> &'static [&'static str] {
        match self {
            ConfigRole::Daemon => &["server", "audit"],
            ConfigRole::Client => &["store", "confirmation"],
        }
    }

    fn reads(self, path: &str) -> bool {
        let top = path.split(['.', '[']).next().unwrap_or(path);
        self.sections().contains(&top)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnusedKeyReport {
    pub role: ConfigRole,
    /// Dotted paths of leaves the role never reads, sorted.
    pub unused: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused.is_empty()
    }
}

/// `Fail` turns a non-clean report into an error; `Warn` always returns it.
pub fn report_unused_keys(
    role: ConfigRole,
    config_json: &Value,
    policy: UnusedKeyPolicy,
) -> Result<UnusedKeyReport> {
    let mut unused: Vec<String> = leaves(config_json)
        .into_iter()
        .map(|(path, _)| path)
        .filter(|path| !role.reads(path))
        .collect();
    unused.sort();

    let report = UnusedKeyReport { role, unused };
    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS (role={}): {} unused key(s): {}",
            role.as_str(),
            report.unused.len(),
            report.unused.iter().take(12).cloned().collect::<Vec<_>>().join(", ")
        );
    }
    Ok(report)
}
