//! Order state machine.
//!
//! # Design
//!
//! The transition table is a **strict partial function** from
//! `(OrderStatus, ActionKind)` to `OrderStatus`. Every pair not listed below
//! is illegal and returns [`TransitionError`]; look-ups fail closed.
//!
//! ```text
//!   RECEIVED ─ACCEPT─► ACCEPTED ─START─► PREPARING ─READY─► READY ─HANDOFF─► HANDED_OFF ─DONE─► DONE (term.)
//!      │                  │                  │                │                  │
//!      └──────────────────┴──────CANCEL──────┴────────────────┴──────────────────┴──► CANCELLED (term.)
//! ```
//!
//! Every action except `CANCEL` is legal from exactly one source status.
//! `CANCEL` is legal from every non-terminal status. Nothing is legal from a
//! terminal status, `CANCEL` included.

use crate::error::OrderError;
use crate::types::{ActionKind, Order, OrderStatus, TransitionRequest};

// ---------------------------------------------------------------------------
// TransitionError
// ---------------------------------------------------------------------------

/// Returned when an action is not permitted from the current status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: OrderStatus,
    pub action: ActionKind,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "illegal order transition: {} + {}", self.from, self.action)
    }
}

impl std::error::Error for TransitionError {}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Look up the status reached by applying `action` in status `from`.
pub fn next_status(from: OrderStatus, action: ActionKind) -> Result<OrderStatus, TransitionError> {
    use ActionKind as A;
    use OrderStatus::*;

    let next = match (from, action) {
        (Received, A::Accept) => Accepted,
        (Accepted, A::Start) => Preparing,
        (Preparing, A::Ready) => Ready,
        (Ready, A::Handoff) => HandedOff,
        (HandedOff, A::Done) => Done,

        (Received | Accepted | Preparing | Ready | HandedOff, A::Cancel) => Cancelled,

        // Everything else is illegal, including anything from DONE/CANCELLED.
        (from, action) => return Err(TransitionError { from, action }),
    };

    Ok(next)
}

pub fn is_terminal(status: OrderStatus) -> bool {
    status.is_terminal()
}

/// Actions accepted from `status`, in vocabulary order.
pub fn allowed_actions(status: OrderStatus) -> Vec<ActionKind> {
    ActionKind::ALL
        .into_iter()
        .filter(|a| next_status(status, *a).is_ok())
        .collect()
}

/// Every legal `(from, action, to)` triple, derived from [`next_status`] so
/// there is exactly one source of truth.
pub fn transition_table() -> Vec<(OrderStatus, ActionKind, OrderStatus)> {
    let mut rows = Vec::new();
    for from in OrderStatus::ALL {
        for action in ActionKind::ALL {
            if let Ok(to) = next_status(from, action) {
                rows.push((from, action, to));
            }
        }
    }
    rows
}

/// Local pre-flight of `req` against a client-held projection.
///
/// Only the table is consulted here. The stamp check belongs to the store,
/// which is the only party that knows the current `updated_at_ms`.
pub fn check_transition(
    projection: &Order,
    req: &TransitionRequest,
) -> Result<OrderStatus, OrderError> {
    if projection.order_id != req.order_id {
        return Err(OrderError::UnknownOrder {
            order_id: req.order_id.clone(),
        });
    }
    next_status(projection.status, req.action).map_err(|e| OrderError::InvalidTransition {
        order_id: req.order_id.clone(),
        from: e.from,
        action: e.action,
    })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
