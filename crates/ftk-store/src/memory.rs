//! Authoritative in-memory order store.
//!
//! # Arbitration order for `dispatch`
//!
//! 1. Unknown order → `UnknownOrder`.
//! 2. Stamp check: if `expectedUpdatedAtMs` is present and differs from the
//!    current `updatedAtMs` → `ConcurrencyConflict`. Skipped when
//!    `managerOverride` is true; that use is logged on `ftk::override` and
//!    audited as `OVERRIDE_TRANSITION`.
//! 3. State machine → `InvalidTransition`.
//! 4. Audit append (when attached). A failed append rejects the transition.
//! 5. New record with a strictly larger store-issued `updatedAtMs` is
//!    published to every subscriber.
//!
//! All of this happens under one write lock, so concurrent writers holding
//! the same stamp are serialized: the first wins, the rest conflict. The
//! audit line is written synchronously under that lock, so neither `get` nor
//! a feed ever shows a record whose audit line is not on disk yet.
//!
//! # Feeds
//!
//! Each order has a broadcast channel. A subscriber gets the current record,
//! then every later record in commit order. Both are taken under the lock,
//! so nothing falls between the snapshot and the first broadcast.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use serde_json::json;
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{info, warn};

use ftk_audit::{AuditKind, AuditWriter};
use ftk_order::{next_status, Order, OrderError, TransitionRequest};

use crate::{OrderFeed, OrderStore, StoreClock, TransitionAck};

pub struct InMemoryOrderStore {
    inner: RwLock<Inner>,
}

/// Records buffered per subscriber. An order has at most seven commits
/// (six transitions and one payment) over its whole life.
pub const FEED_CAPACITY: usize = 64;

struct Slot {
    current: Order,
    changes: broadcast::Sender<Order>,
}

impl Slot {
    fn new(order: Order) -> Self {
        let (changes, _rx) = broadcast::channel(FEED_CAPACITY);
        Self {
            current: order,
            changes,
        }
    }

    /// Replace the record and push it to subscribers. No subscribers is fine.
    fn commit(&mut self, order: Order) {
        self.current = order.clone();
        let _ = self.changes.send(order);
    }
}

struct Inner {
    orders: HashMap<String, Slot>,
    clock: StoreClock,
    audit: Option<AuditWriter>,
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::with_clock(StoreClock::system())
    }

    pub fn with_clock(clock: StoreClock) -> Self {
        Self {
            inner: RwLock::new(Inner {
                orders: HashMap::new(),
                clock,
                audit: None,
            }),
        }
    }

    /// Record every accepted transition and payment to `audit`.
    pub fn with_audit(self, audit: AuditWriter) -> Self {
        let mut inner = self.inner.into_inner();
        inner.audit = Some(audit);
        Self {
            inner: RwLock::new(inner),
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.orders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn unknown(order_id: &str) -> OrderError {
    OrderError::UnknownOrder {
        order_id: order_id.to_string(),
    }
}

fn append_audit(
    audit: &mut Option<AuditWriter>,
    kind: AuditKind,
    order_id: &str,
    detail: serde_json::Value,
) -> Result<(), OrderError> {
    if let Some(w) = audit.as_mut() {
        w.append(kind, order_id, detail)
            .map_err(|e| {
                OrderError::TransportFailure(format!("audit log unavailable: {e:#}"))
            })?;
    }
    Ok(())
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order_id: &str) -> Result<Order, OrderError> {
        let mut inner = self.inner.write().await;
        if inner.orders.contains_key(order_id) {
            return Err(OrderError::OrderExists {
                order_id: order_id.to_string(),
            });
        }
        let ts = inner.clock.issue(0);
        let order = Order::received(order_id, ts);
        inner
            .orders
            .insert(order_id.to_string(), Slot::new(order.clone()));

        info!(order_id, updated_at_ms = ts, "order created");
        Ok(order)
    }

    async fn get(&self, order_id: &str) -> Result<Order, OrderError> {
        let inner = self.inner.read().await;
        let slot = inner.orders.get(order_id).ok_or_else(|| unknown(order_id))?;
        Ok(slot.current.clone())
    }

    async fn dispatch(&self, req: &TransitionRequest) -> Result<TransitionAck, OrderError> {
        let mut guard = self.inner.write().await;
        let Inner {
            orders,
            clock,
            audit,
        } = &mut *guard;

        let slot = orders
            .get_mut(&req.order_id)
            .ok_or_else(|| unknown(&req.order_id))?;
        let current = slot.current.clone();

        if req.is_override() {
            warn!(
                target: "ftk::override",
                order_id = %req.order_id,
                action = %req.action,
                expected_updated_at_ms = ?req.expected_updated_at_ms,
                actual_updated_at_ms = current.updated_at_ms,
                "manager override: stamp check bypassed"
            );
        } else if let Some(expected) = req.expected_updated_at_ms {
            if expected != current.updated_at_ms {
                info!(
                    order_id = %req.order_id,
                    expected,
                    actual = current.updated_at_ms,
                    "transition lost the race"
                );
                return Err(OrderError::ConcurrencyConflict {
                    order_id: req.order_id.clone(),
                    expected,
                    actual: current.updated_at_ms,
                });
            }
        }

        let next = next_status(current.status, req.action).map_err(|e| {
            OrderError::InvalidTransition {
                order_id: req.order_id.clone(),
                from: e.from,
                action: e.action,
            }
        })?;

        let updated_at_ms = clock.issue(current.updated_at_ms);
        let kind = if req.is_override() {
            AuditKind::OverrideTransition
        } else {
            AuditKind::Transition
        };
        append_audit(
            audit,
            kind,
            &req.order_id,
            json!({
                "action": req.action,
                "from": current.status,
                "to": next,
                "updatedAtMs": updated_at_ms,
                "expectedUpdatedAtMs": req.expected_updated_at_ms,
            }),
        )?;

        let order = Order {
            status: next,
            updated_at_ms,
            ..current
        };
        slot.commit(order.clone());

        info!(
            order_id = %order.order_id,
            action = %req.action,
            status = %order.status,
            updated_at_ms,
            "transition applied"
        );
        Ok(TransitionAck::ok(order))
    }

    async fn mark_paid(&self, order_id: &str) -> Result<Order, OrderError> {
        let mut guard = self.inner.write().await;
        let Inner {
            orders,
            clock,
            audit,
        } = &mut *guard;

        let slot = orders.get_mut(order_id).ok_or_else(|| unknown(order_id))?;
        let current = slot.current.clone();
        if current.paid_at.is_some() {
            return Err(OrderError::AlreadyPaid {
                order_id: order_id.to_string(),
            });
        }

        let updated_at_ms = clock.issue(current.updated_at_ms);
        let paid_at = DateTime::<Utc>::from_timestamp_millis(updated_at_ms).unwrap_or_else(Utc::now);
        append_audit(
            audit,
            AuditKind::Paid,
            order_id,
            json!({ "paidAt": paid_at, "updatedAtMs": updated_at_ms }),
        )?;

        let order = Order {
            updated_at_ms,
            paid_at: Some(paid_at),
            ..current
        };
        slot.commit(order.clone());

        info!(order_id, updated_at_ms, "order paid");
        Ok(order)
    }

    async fn subscribe(&self, order_id: &str) -> Result<OrderFeed, OrderError> {
        let inner = self.inner.read().await;
        let slot = inner.orders.get(order_id).ok_or_else(|| unknown(order_id))?;
        Ok(order_feed(slot.current.clone(), slot.changes.subscribe()))
    }
}

/// Current record first, then every broadcast change. A lagging subscriber
/// skips to the oldest record still buffered; records are whole snapshots,
/// so the next one it sees is already consistent.
fn order_feed(current: Order, changes: broadcast::Receiver<Order>) -> OrderFeed {
    let order_id = current.order_id.clone();
    let later = BroadcastStream::new(changes).filter_map(move |item| {
        let order_id = order_id.clone();
        async move {
            match item {
                Ok(order) => Some(order),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(order_id = %order_id, skipped, "order feed lagged; resuming at oldest buffered record");
                    None
                }
            }
        }
    });
    stream::once(async move { current }).chain(later).boxed()
}
