//! Shared runtime state for ftk-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The order store is the
//! only mutable state and it synchronizes itself.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use ftk_audit::AuditWriter;
use ftk_config::ControllerConfig;
use ftk_notify::Notifier;
use ftk_store::InMemoryOrderStore;

/// Static build metadata included in health responses.
#[derive(Clone, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<InMemoryOrderStore>,
    pub build: BuildInfo,
    /// When set, every created order gets a status listener feeding this sink.
    pub notifier: Option<Arc<dyn Notifier>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    /// Fresh in-memory store, no audit trail, no notifications.
    pub fn new() -> Self {
        Self::with_store(InMemoryOrderStore::new())
    }

    pub fn with_store(store: InMemoryOrderStore) -> Self {
        Self {
            store: Arc::new(store),
            build: BuildInfo {
                service: "ftk-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Build the store described by `cfg`, resuming the audit chain if an
    /// audit path is configured.
    pub fn from_config(cfg: &ControllerConfig) -> anyhow::Result<Self> {
        let mut store = InMemoryOrderStore::new();
        if let Some(path) = &cfg.audit.path {
            let writer = AuditWriter::resume(path, cfg.audit.hash_chain)
                .with_context(|| format!("open audit log {path}"))?;
            info!(
                path = %path,
                hash_chain = cfg.audit.hash_chain,
                next_seq = writer.next_seq(),
                "audit trail attached"
            );
            store = store.with_audit(writer);
        }
        Ok(Self::with_store(store))
    }
}
