//! ftk-notify
//!
//! Notification listener for order status changes. Consumes the same
//! per-order feed as the confirmation reconciler and turns each status
//! transition into a user-facing [`Notification`]. Delivery is a
//! [`Notifier`]'s business; nothing here knows about push channels.

use std::sync::{Arc, Mutex};

use futures_util::{Stream, StreamExt};
use serde::Serialize;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use ftk_order::{Order, OrderStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub order_id: String,
    pub status: OrderStatus,
    pub title: String,
    pub body: String,
    pub level: Level,
}

fn copy_for(status: OrderStatus) -> (&'static str, &'static str, Level) {
    match status {
        OrderStatus::Received => (
            "Order received",
            "We have your order and are waiting for the kitchen.",
            Level::Info,
        ),
        OrderStatus::Accepted => (
            "Your pizzaiolo accepted the order",
            "It will go in the oven shortly.",
            Level::Info,
        ),
        OrderStatus::Preparing => ("In the oven", "Your order is being prepared.", Level::Info),
        OrderStatus::Ready => (
            "Ready for pickup",
            "Head to the truck, your order is waiting.",
            Level::Info,
        ),
        OrderStatus::HandedOff => ("Handed off", "Your order is on its way to you.", Level::Info),
        OrderStatus::Done => ("Enjoy!", "Thanks for ordering.", Level::Info),
        OrderStatus::Cancelled => (
            "Order cancelled",
            "Your order was cancelled. Contact the truck if this is unexpected.",
            Level::Warning,
        ),
    }
}

/// Notification for the move from `previous` to `current`.
///
/// The first observation (`previous == None`) announces the current status.
/// Records that change without a status change (payment, stamp only) yield
/// nothing.
pub fn notification_for(previous: Option<&Order>, current: &Order) -> Option<Notification> {
    if previous.is_some_and(|p| p.status == current.status) {
        return None;
    }
    let (title, body, level) = copy_for(current.status);
    Some(Notification {
        order_id: current.order_id.clone(),
        status: current.status,
        title: title.to_string(),
        body: body.to_string(),
        level,
    })
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        match self.seen.lock() {
            Ok(v) => v.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn statuses(&self) -> Vec<OrderStatus> {
        self.notifications().iter().map(|n| n.status).collect()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notification: &Notification) {
        match self.seen.lock() {
            Ok(mut v) => v.push(notification.clone()),
            Err(poisoned) => poisoned.into_inner().push(notification.clone()),
        }
    }
}

/// Emits notifications as log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: &Notification) {
        match n.level {
            Level::Info => info!(
                target: "ftk::notify",
                order_id = %n.order_id,
                status = %n.status,
                title = %n.title,
                "{}",
                n.body
            ),
            Level::Warning => warn!(
                target: "ftk::notify",
                order_id = %n.order_id,
                status = %n.status,
                title = %n.title,
                "{}",
                n.body
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// Handle to a running listener. Dropping it stops the listener.
pub struct ListenerHandle {
    join: Option<JoinHandle<usize>>,
}

impl ListenerHandle {
    /// Wait for the listener to stop on its own (feed ended or the order
    /// reached a terminal status). Returns how many notifications it sent.
    pub async fn finished(mut self) -> Result<usize, JoinError> {
        match self.join.take() {
            Some(j) => j.await,
            None => Ok(0),
        }
    }

    /// Let the listener run to completion without holding the handle.
    pub fn detach(mut self) {
        drop(self.join.take());
    }

    pub fn close(mut self) {
        if let Some(j) = self.join.take() {
            j.abort();
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(j) = self.join.take() {
            j.abort();
        }
    }
}

/// Follow one order feed and notify on every status change.
pub fn spawn_listener<S>(feed: S, notifier: Arc<dyn Notifier>) -> ListenerHandle
where
    S: Stream<Item = Order> + Send + 'static,
{
    let join = tokio::spawn(async move {
        let mut feed = Box::pin(feed);
        let mut last: Option<Order> = None;
        let mut sent = 0usize;

        while let Some(order) = feed.next().await {
            if let Some(n) = notification_for(last.as_ref(), &order) {
                notifier.notify(&n);
                sent += 1;
            }
            let terminal = order.status.is_terminal();
            last = Some(order);
            if terminal {
                debug!("order reached a terminal status; listener done");
                break;
            }
        }
        sent
    });

    ListenerHandle { join: Some(join) }
}
