//! Scenario: Transition payload validation
//!
//! # Invariants under test
//!
//! 1. Missing `orderId` or `action` fails with `InvalidPayload` naming every
//!    missing field.
//! 2. A forbidden direct-status field fails the payload on its own, before
//!    any other field is looked at.
//! 3. An action outside the vocabulary is named as the offending field.
//! 4. Validating the same payload twice yields the same result.
//! 5. Every valid action passes the validator regardless of order status
//!    (status is the state machine's concern, not the validator's).

use ftk_order::{validate, ActionKind, FaultKind, TransitionRequest};
use serde_json::json;

#[test]
fn e2e_accept_request_is_valid() {
    let req = validate(&json!({ "orderId": "e2e-test-order", "action": "ACCEPT" })).unwrap();
    assert_eq!(req.order_id, "e2e-test-order");
    assert_eq!(req.action, ActionKind::Accept);
    assert_eq!(req.expected_updated_at_ms, None);
    assert_eq!(req.manager_override, None);
}

#[test]
fn missing_both_required_fields_are_both_reported() {
    let err = validate(&json!({})).unwrap_err();
    assert_eq!(err.offending_fields(), vec!["orderId", "action"]);
    assert!(err.faults.iter().all(|f| f.kind == FaultKind::Missing));
    assert!(err.received_keys.is_empty());

    let err = validate(&json!({ "action": "READY" })).unwrap_err();
    assert_eq!(err.offending_fields(), vec!["orderId"]);

    let err = validate(&json!({ "orderId": "o1" })).unwrap_err();
    assert_eq!(err.offending_fields(), vec!["action"]);
}

#[test]
fn bake_is_not_an_action() {
    let err = validate(&json!({ "orderId": "o1", "action": "BAKE" })).unwrap_err();
    assert_eq!(err.offending_fields(), vec!["action"]);
    assert_eq!(err.fault_for("action"), Some(FaultKind::UnknownAction));
}

#[test]
fn next_kitchen_status_is_forbidden_before_anything_else() {
    let err = validate(&json!({
        "orderId": "o1",
        "action": "START",
        "nextKitchenStatus": "preparing",
    }))
    .unwrap_err();
    assert_eq!(err.offending_fields(), vec!["nextKitchenStatus"]);
    assert_eq!(err.fault_for("nextKitchenStatus"), Some(FaultKind::Forbidden));
    assert_eq!(err.received_keys, vec!["action", "nextKitchenStatus", "orderId"]);
}

#[test]
fn forbidden_field_wins_over_missing_fields() {
    let err = validate(&json!({ "nextKitchenStatus": "done" })).unwrap_err();
    assert_eq!(err.offending_fields(), vec!["nextKitchenStatus"]);
    assert!(err.is_forbidden_field());
}

#[test]
fn validation_is_idempotent() {
    let payloads = [
        json!({ "orderId": "o1", "action": "ACCEPT", "expectedUpdatedAtMs": 5 }),
        json!({ "orderId": "o1", "action": "BAKE", "extra": 1 }),
        json!({ "orderId": "o1", "action": "START", "nextKitchenStatus": "x" }),
    ];
    for p in payloads {
        assert_eq!(validate(&p), validate(&p));
    }
}

#[test]
fn every_vocabulary_action_passes_shape_checks() {
    for action in ActionKind::ALL {
        let req = validate(&json!({ "orderId": "o1", "action": action.as_str() })).unwrap();
        assert_eq!(req, TransitionRequest::new("o1", action));
    }
}

#[test]
fn typed_request_round_trips_through_the_validator() {
    let req = TransitionRequest::new("o9", ActionKind::Cancel)
        .expecting(1_700_000_000_000)
        .with_override();
    let value = serde_json::to_value(&req).unwrap();
    assert_eq!(validate(&value).unwrap(), req);
}
