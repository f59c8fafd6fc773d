use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

/// Every status an order can occupy in the kitchen.
///
/// Wire form is SCREAMING_SNAKE_CASE (`"HANDED_OFF"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Paid and queued; nobody in the kitchen has looked at it yet.
    Received,
    Accepted,
    Preparing,
    Ready,
    HandedOff,
    /// **Terminal.**
    Done,
    /// **Terminal.**
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Received,
        OrderStatus::Accepted,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::HandedOff,
        OrderStatus::Done,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Received => "RECEIVED",
            OrderStatus::Accepted => "ACCEPTED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Ready => "READY",
            OrderStatus::HandedOff => "HANDED_OFF",
            OrderStatus::Done => "DONE",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// Returns `true` if no further action is accepted, `CANCEL` included.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Done | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

/// The fixed action vocabulary. A status is only ever reached through one
/// of these, never by direct assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Accept,
    Start,
    Ready,
    Handoff,
    Done,
    Cancel,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        ActionKind::Accept,
        ActionKind::Start,
        ActionKind::Ready,
        ActionKind::Handoff,
        ActionKind::Done,
        ActionKind::Cancel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Accept => "ACCEPT",
            ActionKind::Start => "START",
            ActionKind::Ready => "READY",
            ActionKind::Handoff => "HANDOFF",
            ActionKind::Done => "DONE",
            ActionKind::Cancel => "CANCEL",
        }
    }

    /// Exact, case-sensitive match against the wire vocabulary.
    pub fn parse(s: &str) -> Option<Self> {
        ActionKind::ALL.into_iter().find(|a| a.as_str() == s)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// Read-only projection of an order record as issued by the order store.
///
/// `updated_at_ms` and `paid_at` are store-assigned. Clients copy
/// `updated_at_ms` into [`TransitionRequest::expected_updated_at_ms`] and
/// never fabricate either value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    pub status: OrderStatus,
    pub updated_at_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl Order {
    /// A freshly created order as the store would issue it.
    pub fn received(order_id: impl Into<String>, updated_at_ms: i64) -> Self {
        Self {
            order_id: order_id.into(),
            status: OrderStatus::Received,
            updated_at_ms,
            paid_at: None,
        }
    }

    /// Whether this record carries the paid marker observed by checkout.
    ///
    /// The webhook stamp `paid_at` is the primary marker. The kitchen only
    /// ever progresses paid orders, so any non-cancelled status past
    /// `RECEIVED` also counts.
    pub fn confirms_payment(&self) -> bool {
        if self.paid_at.is_some() {
            return true;
        }
        !matches!(self.status, OrderStatus::Received | OrderStatus::Cancelled)
    }
}

// ---------------------------------------------------------------------------
// TransitionRequest
// ---------------------------------------------------------------------------

/// A validated request to apply one action to one order.
///
/// Only ever produced by [`crate::validate`] from untrusted input, or built
/// in code through the constructors below. Serializes with `None` fields
/// omitted so the wire body carries only what was set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransitionRequest {
    pub order_id: String,
    pub action: ActionKind,
    /// Optimistic-concurrency stamp: the `updated_at_ms` the caller last saw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_updated_at_ms: Option<i64>,
    /// Human-authorized bypass of the stamp check. Always audited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_override: Option<bool>,
}

impl TransitionRequest {
    pub fn new(order_id: impl Into<String>, action: ActionKind) -> Self {
        Self {
            order_id: order_id.into(),
            action,
            expected_updated_at_ms: None,
            manager_override: None,
        }
    }

    /// Stamp the request with the caller's last known `updated_at_ms`.
    pub fn expecting(mut self, updated_at_ms: i64) -> Self {
        self.expected_updated_at_ms = Some(updated_at_ms);
        self
    }

    pub fn with_override(mut self) -> Self {
        self.manager_override = Some(true);
        self
    }

    pub fn is_override(&self) -> bool {
        self.manager_override == Some(true)
    }
}
