//! ftk-order
//!
//! Order lifecycle vocabulary shared by every other crate in the workspace:
//! - `types`: the order record projection, statuses, actions, transition requests
//! - `machine`: the fixed transition table (strict partial function, fail-closed)
//! - `validate`: the pre-dispatch payload gate for transition requests
//! - `error`: the error taxonomy and its JSON wire form
//!
//! Deterministic, pure logic. No IO. No clock.

mod error;
mod machine;
mod types;
mod validate;

pub use error::{ErrorBody, ErrorEnvelope, OrderError};
pub use machine::{
    allowed_actions, check_transition, is_terminal, next_status, transition_table, TransitionError,
};
pub use types::{ActionKind, Order, OrderStatus, TransitionRequest};
pub use validate::{
    validate, FaultKind, FieldFault, InvalidPayload, FORBIDDEN_STATUS_FIELDS, RECOGNIZED_FIELDS,
};
