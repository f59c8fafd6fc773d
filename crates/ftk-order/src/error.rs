//! Error taxonomy for order transitions and its JSON wire form.
//!
//! | Variant               | Raised by                  | Retry                             |
//! |-----------------------|----------------------------|-----------------------------------|
//! | `InvalidPayload`      | validator (local)          | never; caller bug, never sent     |
//! | `InvalidTransition`   | store / `check_transition` | never automatically               |
//! | `ConcurrencyConflict` | store                      | only after re-fetch + re-validate |
//! | `UnknownOrder`        | store                      | never                             |
//! | `OrderExists`         | store (create)             | never                             |
//! | `AlreadyPaid`         | store (webhook)            | never; the first payment stands   |
//! | `TransportFailure`    | HTTP client                | caller decides                    |

use serde::{Deserialize, Serialize};

use crate::types::{ActionKind, OrderStatus};
use crate::validate::{FieldFault, InvalidPayload};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    InvalidPayload(InvalidPayload),
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        action: ActionKind,
    },
    ConcurrencyConflict {
        order_id: String,
        expected: i64,
        actual: i64,
    },
    UnknownOrder {
        order_id: String,
    },
    OrderExists {
        order_id: String,
    },
    AlreadyPaid {
        order_id: String,
    },
    TransportFailure(String),
}

impl OrderError {
    /// Stable machine-readable code, used as `error.code` on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::InvalidPayload(_) => "INVALID_PAYLOAD",
            OrderError::InvalidTransition { .. } => "INVALID_TRANSITION",
            OrderError::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            OrderError::UnknownOrder { .. } => "UNKNOWN_ORDER",
            OrderError::OrderExists { .. } => "ORDER_EXISTS",
            OrderError::AlreadyPaid { .. } => "ALREADY_PAID",
            OrderError::TransportFailure(_) => "TRANSPORT_FAILURE",
        }
    }

    /// `true` when a retry can succeed once the caller has refreshed its view.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OrderError::ConcurrencyConflict { .. } | OrderError::TransportFailure(_)
        )
    }

    pub fn to_wire(&self) -> ErrorEnvelope {
        let mut body = ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
            ..ErrorBody::default()
        };
        match self {
            OrderError::InvalidPayload(p) => {
                body.faults = Some(p.faults.clone());
                body.received_keys = Some(p.received_keys.clone());
            }
            OrderError::InvalidTransition {
                order_id,
                from,
                action,
            } => {
                body.order_id = Some(order_id.clone());
                body.from = Some(*from);
                body.action = Some(*action);
            }
            OrderError::ConcurrencyConflict {
                order_id,
                expected,
                actual,
            } => {
                body.order_id = Some(order_id.clone());
                body.expected = Some(*expected);
                body.actual = Some(*actual);
            }
            OrderError::UnknownOrder { order_id }
            | OrderError::OrderExists { order_id }
            | OrderError::AlreadyPaid { order_id } => {
                body.order_id = Some(order_id.clone());
            }
            OrderError::TransportFailure(_) => {}
        }
        ErrorEnvelope { error: body }
    }

    /// Rebuild a typed error from a store error body.
    ///
    /// A body whose code is unknown or whose details are incomplete is
    /// reported as a transport failure carrying the raw message.
    pub fn from_wire(body: ErrorBody) -> Self {
        let malformed = |b: &ErrorBody| {
            OrderError::TransportFailure(format!("malformed error body {}: {}", b.code, b.message))
        };

        match body.code.as_str() {
            "INVALID_PAYLOAD" => OrderError::InvalidPayload(InvalidPayload {
                faults: body.faults.clone().unwrap_or_default(),
                received_keys: body.received_keys.clone().unwrap_or_default(),
            }),
            "INVALID_TRANSITION" => match (&body.order_id, body.from, body.action) {
                (Some(order_id), Some(from), Some(action)) => OrderError::InvalidTransition {
                    order_id: order_id.clone(),
                    from,
                    action,
                },
                _ => malformed(&body),
            },
            "CONCURRENCY_CONFLICT" => match (&body.order_id, body.expected, body.actual) {
                (Some(order_id), Some(expected), Some(actual)) => {
                    OrderError::ConcurrencyConflict {
                        order_id: order_id.clone(),
                        expected,
                        actual,
                    }
                }
                _ => malformed(&body),
            },
            "UNKNOWN_ORDER" | "ORDER_EXISTS" | "ALREADY_PAID" => {
                let Some(order_id) = body.order_id.clone() else {
                    return malformed(&body);
                };
                match body.code.as_str() {
                    "UNKNOWN_ORDER" => OrderError::UnknownOrder { order_id },
                    "ORDER_EXISTS" => OrderError::OrderExists { order_id },
                    _ => OrderError::AlreadyPaid { order_id },
                }
            }
            "TRANSPORT_FAILURE" => OrderError::TransportFailure(body.message),
            _ => malformed(&body),
        }
    }
}

impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderError::InvalidPayload(p) => write!(f, "{p}"),
            OrderError::InvalidTransition {
                order_id,
                from,
                action,
            } => write!(
                f,
                "INVALID_TRANSITION: order {order_id} cannot {action} from {from}"
            ),
            OrderError::ConcurrencyConflict {
                order_id,
                expected,
                actual,
            } => write!(
                f,
                "CONCURRENCY_CONFLICT: order {order_id} expected updatedAtMs={expected}, store has {actual}; re-fetch and retry"
            ),
            OrderError::UnknownOrder { order_id } => write!(f, "UNKNOWN_ORDER: {order_id}"),
            OrderError::OrderExists { order_id } => write!(f, "ORDER_EXISTS: {order_id}"),
            OrderError::AlreadyPaid { order_id } => {
                write!(f, "ALREADY_PAID: order {order_id} already carries paidAt")
            }
            OrderError::TransportFailure(msg) => write!(f, "TRANSPORT_FAILURE: {msg}"),
        }
    }
}

impl std::error::Error for OrderError {}

impl From<InvalidPayload> for OrderError {
    fn from(p: InvalidPayload) -> Self {
        OrderError::InvalidPayload(p)
    }
}

// ---------------------------------------------------------------------------
// Wire form
// ---------------------------------------------------------------------------

/// `{ "error": { ... } }` as returned by the order store on rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faults: Option<Vec<FieldFault>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_keys: Option<Vec<String>>,
}
