//! Request and response types for the ftk-daemon HTTP endpoints that are not
//! already wire types of `ftk-order` / `ftk-store`.
//!
//! No business logic lives here.

use serde::{Deserialize, Serialize};

use ftk_order::{ActionKind, OrderStatus};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// /v1/transitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRow {
    pub from: OrderStatus,
    pub action: ActionKind,
    pub to: OrderStatus,
}

/// The full transition table, for UIs that grey out impossible actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionTableResponse {
    pub transitions: Vec<TransitionRow>,
    pub terminal: Vec<OrderStatus>,
}
