//! Transition request validator.
//!
//! Classifies an untrusted JSON payload before anything is sent to the order
//! store. Pure: no IO, no state, same input → same result.
//!
//! # Rules, in evaluation order
//!
//! 1. The payload must be a JSON object.
//! 2. A direct-status field ([`FORBIDDEN_STATUS_FIELDS`]) fails the payload
//!    immediately. Nothing else is inspected, so the error names only the
//!    forbidden field(s).
//! 3. Every remaining rule is evaluated and **every** offending field is
//!    collected into one [`InvalidPayload`]:
//!    - `orderId`: required, non-empty string
//!    - `action`: required, member of the action vocabulary
//!    - `expectedUpdatedAtMs`: optional, finite integral number of ms
//!    - `managerOverride`: optional, boolean
//!    - any other key is unexpected

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{ActionKind, TransitionRequest};

/// The only keys a transition request may carry.
pub const RECOGNIZED_FIELDS: [&str; 4] = [
    "orderId",
    "action",
    "expectedUpdatedAtMs",
    "managerOverride",
];

/// Keys that would assign a status directly instead of going through the
/// action vocabulary.
pub const FORBIDDEN_STATUS_FIELDS: [&str; 3] = ["nextKitchenStatus", "nextStatus", "status"];

// ---------------------------------------------------------------------------
// Faults
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    NotAnObject,
    Forbidden,
    Missing,
    Empty,
    WrongType,
    UnknownAction,
    Unexpected,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::NotAnObject => "not_an_object",
            FaultKind::Forbidden => "forbidden",
            FaultKind::Missing => "missing",
            FaultKind::Empty => "empty",
            FaultKind::WrongType => "wrong_type",
            FaultKind::UnknownAction => "unknown_action",
            FaultKind::Unexpected => "unexpected",
        }
    }
}

/// One offending field and why it offended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFault {
    pub field: String,
    pub kind: FaultKind,
}

impl FieldFault {
    fn new(field: &str, kind: FaultKind) -> Self {
        Self {
            field: field.to_string(),
            kind,
        }
    }
}

/// Shape/type failure of a transition request.
///
/// Carries every offending field plus the full (sorted) key set received,
/// so a caller can tell "missing" from "unexpected" from "wrong type"
/// without re-parsing the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidPayload {
    pub faults: Vec<FieldFault>,
    pub received_keys: Vec<String>,
}

impl InvalidPayload {
    /// Names of all offending fields, in reporting order.
    pub fn offending_fields(&self) -> Vec<&str> {
        self.faults.iter().map(|f| f.field.as_str()).collect()
    }

    pub fn fault_for(&self, field: &str) -> Option<FaultKind> {
        self.faults.iter().find(|f| f.field == field).map(|f| f.kind)
    }

    pub fn is_forbidden_field(&self) -> bool {
        self.faults.iter().all(|f| f.kind == FaultKind::Forbidden) && !self.faults.is_empty()
    }
}

impl std::fmt::Display for InvalidPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let faults: Vec<String> = self
            .faults
            .iter()
            .map(|x| format!("{}({})", x.field, x.kind.as_str()))
            .collect();
        write!(
            f,
            "INVALID_PAYLOAD: offending=[{}] received_keys=[{}]",
            faults.join(", "),
            self.received_keys.join(", ")
        )
    }
}

impl std::error::Error for InvalidPayload {}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

/// Validate an untrusted transition payload.
pub fn validate(input: &Value) -> Result<TransitionRequest, InvalidPayload> {
    let Some(obj) = input.as_object() else {
        return Err(InvalidPayload {
            faults: vec![FieldFault::new("$", FaultKind::NotAnObject)],
            received_keys: Vec::new(),
        });
    };

    let mut received_keys: Vec<String> = obj.keys().cloned().collect();
    received_keys.sort();

    // Fail fast: a direct status assignment is reported alone.
    let forbidden: Vec<FieldFault> = FORBIDDEN_STATUS_FIELDS
        .iter()
        .filter(|k| obj.contains_key(**k))
        .map(|k| FieldFault::new(k, FaultKind::Forbidden))
        .collect();
    if !forbidden.is_empty() {
        return Err(InvalidPayload {
            faults: forbidden,
            received_keys,
        });
    }

    let mut faults = Vec::new();

    let order_id = match obj.get("orderId") {
        None => {
            faults.push(FieldFault::new("orderId", FaultKind::Missing));
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            faults.push(FieldFault::new("orderId", FaultKind::Empty));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            faults.push(FieldFault::new("orderId", FaultKind::WrongType));
            None
        }
    };

    let action = match obj.get("action") {
        None => {
            faults.push(FieldFault::new("action", FaultKind::Missing));
            None
        }
        Some(Value::String(s)) => {
            let parsed = ActionKind::parse(s);
            if parsed.is_none() {
                faults.push(FieldFault::new("action", FaultKind::UnknownAction));
            }
            parsed
        }
        Some(_) => {
            faults.push(FieldFault::new("action", FaultKind::WrongType));
            None
        }
    };

    let expected_updated_at_ms = match obj.get("expectedUpdatedAtMs") {
        None => None,
        Some(v) => {
            let stamp = stamp_millis(v);
            if stamp.is_none() {
                faults.push(FieldFault::new("expectedUpdatedAtMs", FaultKind::WrongType));
            }
            stamp
        }
    };

    let manager_override = match obj.get("managerOverride") {
        None => None,
        Some(Value::Bool(b)) => Some(*b),
        Some(_) => {
            faults.push(FieldFault::new("managerOverride", FaultKind::WrongType));
            None
        }
    };

    faults.extend(unexpected_keys(obj));

    match (order_id, action) {
        (Some(order_id), Some(action)) if faults.is_empty() => Ok(TransitionRequest {
            order_id,
            action,
            expected_updated_at_ms,
            manager_override,
        }),
        _ => Err(InvalidPayload {
            faults,
            received_keys,
        }),
    }
}

/// Stamps are store-issued epoch milliseconds. JSON cannot carry NaN or
/// infinity, so "finite" reduces to "a number"; a fractional or out-of-range
/// value can never equal a store stamp and is rejected as a wrong type.
fn stamp_millis(v: &Value) -> Option<i64> {
    let Value::Number(n) = v else {
        return None;
    };
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn unexpected_keys(obj: &Map<String, Value>) -> Vec<FieldFault> {
    let mut extra: Vec<&String> = obj
        .keys()
        .filter(|k| !RECOGNIZED_FIELDS.contains(&k.as_str()))
        .collect();
    extra.sort();
    extra
        .into_iter()
        .map(|k| FieldFault::new(k, FaultKind::Unexpected))
        .collect()
}
