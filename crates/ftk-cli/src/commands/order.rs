//! Commands that talk to the order daemon.

use anyhow::Result;
use ftk_order::{check_transition, ActionKind, Order, OrderError, TransitionRequest};
use ftk_store::{OrderStore, TransitionAck};
use tracing::warn;

pub struct TransitionArgs {
    pub order_id: String,
    pub action: ActionKind,
    pub expected: Option<i64>,
    pub manager_override: bool,
    pub refetch_on_conflict: bool,
}

fn print_order(o: &Order) {
    println!("order_id={}", o.order_id);
    println!("status={}", o.status);
    println!("updated_at_ms={}", o.updated_at_ms);
    if let Some(p) = o.paid_at {
        println!("paid_at={}", p.to_rfc3339());
    }
}

fn print_ack(ack: &TransitionAck) {
    println!("ok={}", ack.result.ok);
    if let Some(o) = &ack.order {
        print_order(o);
    }
}

pub async fn create(store: &impl OrderStore, order_id: &str) -> Result<()> {
    let order = store.create(order_id).await?;
    print_order(&order);
    Ok(())
}

pub async fn show(store: &impl OrderStore, order_id: &str) -> Result<()> {
    let order = store.get(order_id).await?;
    print_order(&order);
    Ok(())
}

pub async fn pay(store: &impl OrderStore, order_id: &str) -> Result<()> {
    let order = store.mark_paid(order_id).await?;
    print_order(&order);
    Ok(())
}

/// Dispatch one transition. With `refetch_on_conflict`, a lost race is
/// retried exactly once with the stamp of a freshly fetched record, after
/// re-checking the action against that record.
pub async fn transition(store: &impl OrderStore, args: TransitionArgs) -> Result<()> {
    let mut req = TransitionRequest::new(&args.order_id, args.action);
    if let Some(ms) = args.expected {
        req = req.expecting(ms);
    }
    if args.manager_override {
        req = req.with_override();
    }

    match store.dispatch(&req).await {
        Ok(ack) => {
            print_ack(&ack);
            Ok(())
        }
        Err(OrderError::ConcurrencyConflict {
            expected, actual, ..
        }) if args.refetch_on_conflict => {
            warn!(
                order_id = %args.order_id,
                expected,
                actual,
                "lost the race; re-fetching and retrying once"
            );
            let fresh = store.get(&args.order_id).await?;
            let retry = TransitionRequest {
                expected_updated_at_ms: Some(fresh.updated_at_ms),
                ..req
            };
            check_transition(&fresh, &retry)?;
            let ack = store.dispatch(&retry).await?;
            println!("retried=true");
            print_ack(&ack);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
