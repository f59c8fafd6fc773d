//! HTTP client for the order daemon.
//!
//! Every request body for `dispatch` passes through [`ftk_order::validate`]
//! before it is sent; an `InvalidPayload` is returned synchronously and the
//! network is never touched. Rejections from the daemon come back as
//! `{ "error": {...} }` and are rebuilt into typed [`OrderError`]s.
//! Connection failures, timeouts and undecodable bodies are
//! `TransportFailure`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use ftk_order::{validate, ErrorEnvelope, Order, OrderError, TransitionRequest};

use crate::sse::order_events;
use crate::{CreateOrder, OrderFeed, OrderStore, TransitionAck, TRANSITION_PATH};

pub struct HttpOrderStore {
    client: reqwest::Client,
    base: Url,
    /// Bounds request/response calls and the subscription handshake. The
    /// event stream itself is long-lived.
    request_timeout: Duration,
}

fn transport(e: reqwest::Error) -> OrderError {
    OrderError::TransportFailure(e.to_string())
}

impl HttpOrderStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, OrderError> {
        let base = Url::parse(base_url).map_err(|e| {
            OrderError::TransportFailure(format!("invalid store url {base_url:?}: {e}"))
        })?;
        if base.cannot_be_a_base() {
            return Err(OrderError::TransportFailure(format!(
                "store url {base_url:?} cannot carry a path"
            )));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(transport)?;
        Ok(Self {
            client,
            base,
            request_timeout: timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    /// Base URL plus `segments`, each percent-encoded as one path segment.
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base.clone();
        // Checked in `new`: the base can carry a path.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn order_url(&self, order_id: &str, suffix: Option<&str>) -> Url {
        self.endpoint(["v1", "orders", order_id].into_iter().chain(suffix))
    }
}

async fn read_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, OrderError> {
    let status = resp.status();
    let body = resp.bytes().await.map_err(transport)?;

    if status.is_success() {
        return serde_json::from_slice(&body).map_err(|e| {
            OrderError::TransportFailure(format!("undecodable {status} response: {e}"))
        });
    }

    match serde_json::from_slice::<ErrorEnvelope>(&body) {
        Ok(env) => Err(OrderError::from_wire(env.error)),
        Err(_) => Err(OrderError::TransportFailure(format!(
            "HTTP {status}: {}",
            String::from_utf8_lossy(&body)
        ))),
    }
}

#[async_trait]
impl OrderStore for HttpOrderStore {
    async fn create(&self, order_id: &str) -> Result<Order, OrderError> {
        let resp = self
            .client
            .post(self.endpoint(["v1", "orders"]))
            .timeout(self.request_timeout)
            .json(&CreateOrder {
                order_id: order_id.to_string(),
            })
            .send()
            .await
            .map_err(transport)?;
        read_response(resp).await
    }

    async fn get(&self, order_id: &str) -> Result<Order, OrderError> {
        let resp = self
            .client
            .get(self.order_url(order_id, None))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(transport)?;
        read_response(resp).await
    }

    async fn dispatch(&self, req: &TransitionRequest) -> Result<TransitionAck, OrderError> {
        let body = serde_json::to_value(req)
            .map_err(|e| OrderError::TransportFailure(format!("encode request: {e}")))?;
        // Never put an invalid payload on the wire.
        validate(&body)?;

        if req.is_override() {
            warn!(
                target: "ftk::override",
                order_id = %req.order_id,
                action = %req.action,
                "dispatching manager override"
            );
        }
        debug!(order_id = %req.order_id, action = %req.action, "dispatch transition");

        let resp = self
            .client
            .post(self.endpoint(TRANSITION_PATH.split('/').filter(|s| !s.is_empty())))
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        let ack: TransitionAck = read_response(resp).await?;
        if !ack.result.ok {
            return Err(OrderError::TransportFailure(
                "store answered result.ok=false without an error body".to_string(),
            ));
        }
        Ok(ack)
    }

    async fn mark_paid(&self, order_id: &str) -> Result<Order, OrderError> {
        let resp = self
            .client
            .post(self.order_url(order_id, Some("paid")))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(transport)?;
        read_response(resp).await
    }

    async fn subscribe(&self, order_id: &str) -> Result<OrderFeed, OrderError> {
        let handshake = self
            .client
            .get(self.order_url(order_id, Some("stream")))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send();
        let resp = tokio::time::timeout(self.request_timeout, handshake)
            .await
            .map_err(|_| {
                OrderError::TransportFailure(format!(
                    "subscription handshake for {order_id} timed out after {:?}",
                    self.request_timeout
                ))
            })?
            .map_err(transport)?;

        if !resp.status().is_success() {
            // Error bodies are plain JSON; reuse the same decoding.
            return Err(read_response::<serde_json::Value>(resp)
                .await
                .err()
                .unwrap_or_else(|| {
                    OrderError::TransportFailure("subscription refused".to_string())
                }));
        }

        Ok(Box::pin(order_events(Box::pin(resp.bytes_stream()))))
    }
}
