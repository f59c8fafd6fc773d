//! Axum router and all HTTP handlers for ftk-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Every rejection is returned as the shared
//! `{ "error": { code, message, ... } }` envelope so `HttpOrderStore` can
//! rebuild the typed error.

use std::{convert::Infallible, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tracing::{info, warn};

use ftk_notify::spawn_listener;
use ftk_order::{
    transition_table, validate, FaultKind, FieldFault, InvalidPayload, Order, OrderError,
    OrderStatus,
};
use ftk_store::{OrderStore, ORDER_EVENT};

use crate::{
    api_types::{HealthResponse, TransitionRow, TransitionTableResponse},
    state::AppState,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/transitions", get(transitions))
        .route("/v1/orders", post(create_order))
        .route("/v1/orders/transition", post(transition))
        .route("/v1/orders/:id", get(get_order))
        .route("/v1/orders/:id/paid", post(mark_paid))
        .route("/v1/orders/:id/stream", get(stream))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

pub(crate) struct ApiError(pub OrderError);

impl From<OrderError> for ApiError {
    fn from(e: OrderError) -> Self {
        ApiError(e)
    }
}

/// HTTP status for each rejection.
pub fn status_for(err: &OrderError) -> StatusCode {
    match err {
        OrderError::InvalidPayload(_) => StatusCode::UNPROCESSABLE_ENTITY,
        OrderError::InvalidTransition { .. }
        | OrderError::ConcurrencyConflict { .. }
        | OrderError::OrderExists { .. }
        | OrderError::AlreadyPaid { .. } => StatusCode::CONFLICT,
        OrderError::UnknownOrder { .. } => StatusCode::NOT_FOUND,
        OrderError::TransportFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (status_for(&self.0), Json(self.0.to_wire())).into_response()
    }
}

/// Bodies that are not JSON at all are classified like any other non-object.
fn parse_body(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/transitions
// ---------------------------------------------------------------------------

pub(crate) async fn transitions() -> impl IntoResponse {
    let rows = transition_table()
        .into_iter()
        .map(|(from, action, to)| TransitionRow { from, action, to })
        .collect();
    let terminal = OrderStatus::ALL
        .into_iter()
        .filter(|s| s.is_terminal())
        .collect();
    Json(TransitionTableResponse {
        transitions: rows,
        terminal,
    })
}

// ---------------------------------------------------------------------------
// POST /v1/orders
// ---------------------------------------------------------------------------

/// `{ "orderId": "<non-empty>" }`, nothing else.
fn create_payload(body: &Value) -> Result<String, InvalidPayload> {
    let Some(obj) = body.as_object() else {
        return Err(InvalidPayload {
            faults: vec![fault("$", FaultKind::NotAnObject)],
            received_keys: Vec::new(),
        });
    };
    let mut received_keys: Vec<String> = obj.keys().cloned().collect();
    received_keys.sort();

    let mut faults = Vec::new();
    let order_id = match obj.get("orderId") {
        None => {
            faults.push(fault("orderId", FaultKind::Missing));
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            faults.push(fault("orderId", FaultKind::Empty));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            faults.push(fault("orderId", FaultKind::WrongType));
            None
        }
    };
    for k in &received_keys {
        if k != "orderId" {
            faults.push(fault(k, FaultKind::Unexpected));
        }
    }

    match order_id {
        Some(id) if faults.is_empty() => Ok(id),
        _ => Err(InvalidPayload {
            faults,
            received_keys,
        }),
    }
}

fn fault(field: &str, kind: FaultKind) -> FieldFault {
    FieldFault {
        field: field.to_string(),
        kind,
    }
}

pub(crate) async fn create_order(
    State(st): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let order_id = create_payload(&parse_body(&body)).map_err(OrderError::from)?;
    let order = st.store.create(&order_id).await?;

    if let Some(notifier) = &st.notifier {
        let feed = st.store.subscribe(&order_id).await?;
        spawn_listener(feed, Arc::clone(notifier)).detach();
    }

    Ok((StatusCode::CREATED, Json(order)).into_response())
}

// ---------------------------------------------------------------------------
// GET /v1/orders/:id
// ---------------------------------------------------------------------------

pub(crate) async fn get_order(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(st.store.get(&id).await?))
}

// ---------------------------------------------------------------------------
// POST /v1/orders/transition
// ---------------------------------------------------------------------------

/// Validate, then let the store arbitrate.
pub(crate) async fn transition(
    State(st): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let req = match validate(&parse_body(&body)) {
        Ok(r) => r,
        Err(p) => {
            warn!(error = %p, "transition payload rejected");
            return Err(OrderError::InvalidPayload(p).into());
        }
    };

    match st.store.dispatch(&req).await {
        Ok(ack) => Ok((StatusCode::OK, Json(ack)).into_response()),
        Err(e) => {
            info!(order_id = %req.order_id, action = %req.action, code = e.code(), "transition refused");
            Err(e.into())
        }
    }
}

// ---------------------------------------------------------------------------
// POST /v1/orders/:id/paid
// ---------------------------------------------------------------------------

/// Payment webhook path. The only writer of `paidAt`.
pub(crate) async fn mark_paid(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(st.store.mark_paid(&id).await?))
}

// ---------------------------------------------------------------------------
// GET /v1/orders/:id/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(
    State(st): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let feed = st.store.subscribe(&id).await?;

    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let events = orders_to_sse(feed);
    Ok((headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response())
}

fn orders_to_sse(
    feed: impl Stream<Item = Order>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    feed.filter_map(|order| async move {
        let data = serde_json::to_string(&order).ok()?;
        Some(Ok(Event::default().event(ORDER_EVENT).data(data)))
    })
}
