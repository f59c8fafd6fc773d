//! `ftk confirm`: run a checkout confirmation session against the daemon and
//! print each visible state change until navigation fires.

use std::sync::Arc;

use anyhow::Result;
use ftk_confirm::{
    spawn_session, subscribe_in_session, ConfirmationTimings, Phase, RecordingNavigator,
    SessionContext, SessionSnapshot,
};
use ftk_store::OrderStore;

fn print_snapshot(s: &SessionSnapshot) {
    println!(
        "phase={:?} remote_confirmed={} dwell_elapsed={} is_paid={} progress_pct={} seconds_to_deadline={}",
        s.phase,
        s.state.remote_confirmed,
        s.state.minimum_dwell_elapsed,
        s.is_paid(),
        s.state.progress_pct,
        s.state.seconds_to_deadline
    );
}

/// What the operator sees changing; progress frames in between are skipped.
fn visible(s: &SessionSnapshot) -> (Phase, bool, bool, u64, bool) {
    (
        s.phase,
        s.state.remote_confirmed,
        s.is_paid(),
        s.state.seconds_to_deadline,
        s.state.progress_pct == 100,
    )
}

/// The session starts before the subscription, so an unreachable store still
/// ends in the deadline redirect.
pub async fn run<S>(
    store: Arc<S>,
    ctx: SessionContext,
    timings: ConfirmationTimings,
) -> Result<()>
where
    S: OrderStore + 'static,
{
    let order_id = ctx.order_id.clone();
    let feed = subscribe_in_session(async move { store.subscribe(&order_id).await });
    let nav = Arc::new(RecordingNavigator::new());
    let handle = spawn_session(ctx, feed, timings, nav.clone());

    let mut rx = handle.watch();
    let mut last = None;
    let mut interrupted = false;

    loop {
        let snap = *rx.borrow_and_update();
        if last != Some(visible(&snap)) {
            print_snapshot(&snap);
            last = Some(visible(&snap));
        }
        if snap.phase.is_terminal() {
            break;
        }
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                interrupted = true;
                break;
            }
        }
    }

    let outcome = if interrupted {
        handle.teardown().await?
    } else {
        handle.join().await?
    };

    match outcome.navigation {
        Some(n) => println!("navigate={} cause={:?}", n.route, n.cause),
        None => println!("navigate=none phase={:?}", outcome.phase),
    }
    Ok(())
}
