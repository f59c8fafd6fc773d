//! ftk-store
//!
//! The order store contract and its two implementations:
//!
//! - [`InMemoryOrderStore`]: the authoritative arbiter. It alone assigns
//!   `updatedAtMs`, enforces the optimistic-concurrency stamp, consults the
//!   state machine and pushes every change to subscribers.
//! - [`HttpOrderStore`]: a client for the daemon hosting the arbiter. It
//!   validates locally first, so an invalid payload never goes on the wire.

mod clock;
mod http;
mod memory;
mod sse;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

use ftk_order::{Order, OrderError, TransitionRequest};

pub use clock::StoreClock;
pub use http::HttpOrderStore;
pub use memory::InMemoryOrderStore;
pub use sse::ORDER_EVENT;

/// Fixed endpoint for transition dispatch.
pub const TRANSITION_PATH: &str = "/v1/orders/transition";

/// Push feed of one order: yields the current record first, then every
/// subsequent change. Ends when the store stops publishing.
pub type OrderFeed = BoxStream<'static, Order>;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Success body of a transition: `{ "result": { "ok": true }, "order": {...} }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionAck {
    pub result: AckResult,
    /// The record after the transition. Older servers may omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResult {
    pub ok: bool,
}

impl TransitionAck {
    pub fn ok(order: Order) -> Self {
        Self {
            result: AckResult { ok: true },
            order: Some(order),
        }
    }
}

/// Body of `POST /v1/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrder {
    pub order_id: String,
}

// ---------------------------------------------------------------------------
// OrderStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Create an order in `RECEIVED`.
    async fn create(&self, order_id: &str) -> Result<Order, OrderError>;

    async fn get(&self, order_id: &str) -> Result<Order, OrderError>;

    /// Submit one transition and await the store's verdict.
    async fn dispatch(&self, req: &TransitionRequest) -> Result<TransitionAck, OrderError>;

    /// Payment webhook path: sets `paidAt` once.
    async fn mark_paid(&self, order_id: &str) -> Result<Order, OrderError>;

    async fn subscribe(&self, order_id: &str) -> Result<OrderFeed, OrderError>;
}
