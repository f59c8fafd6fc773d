//! One checkout session: a tokio task owning the order subscription, the
//! dwell timer, the deadline tick and the progress animation, driving a
//! [`Reconciler`] and executing its effects.
//!
//! The task ends as soon as the reconciler is terminal. Every timer and the
//! subscription are owned by the task, so ending it releases them all.
//! Dropping the [`SessionHandle`] tears the session down without navigating.

use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, sleep, sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, info_span, warn, Instrument};

use ftk_order::Order;

use crate::reconciler::{ConfirmationState, Effect, Event, NavigationCause, Phase, Reconciler};

// ---------------------------------------------------------------------------
// Timings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationTimings {
    /// Floor for how long "processing" is shown.
    pub min_dwell: Duration,
    /// Hard redirect budget measured from session start.
    pub deadline: Duration,
    pub tick: Duration,
    /// Length of the 0 to 100% animation.
    pub progress: Duration,
    pub progress_step: Duration,
}

/// Smallest duration a session timer runs with.
pub const MIN_TIMER: Duration = Duration::from_millis(1);

impl ConfirmationTimings {
    /// Values below [`MIN_TIMER`] are raised to it.
    pub fn from_millis(
        min_dwell: u64,
        deadline: u64,
        tick: u64,
        progress: u64,
        progress_step: u64,
    ) -> Self {
        Self {
            min_dwell: Duration::from_millis(min_dwell),
            deadline: Duration::from_millis(deadline),
            tick: Duration::from_millis(tick),
            progress: Duration::from_millis(progress),
            progress_step: Duration::from_millis(progress_step),
        }
        .clamped()
    }

    /// Every timer raised to at least [`MIN_TIMER`]. A zero tick or step
    /// would spin or panic the session task; a zero deadline still redirects.
    pub fn clamped(self) -> Self {
        let floor = |d: Duration| d.max(MIN_TIMER);
        Self {
            min_dwell: floor(self.min_dwell),
            deadline: floor(self.deadline),
            tick: floor(self.tick),
            progress: floor(self.progress),
            progress_step: floor(self.progress_step),
        }
    }
}

impl Default for ConfirmationTimings {
    fn default() -> Self {
        Self::from_millis(2_500, 20_000, 1_000, 1_500, 50)
    }
}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

/// Both terminal paths land on the tracking view.
pub fn tracking_route(order_id: &str) -> String {
    format!("/orders/{order_id}/track")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Navigation {
    pub route: String,
    pub cause: NavigationCause,
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, navigation: &Navigation);
}

/// Records every navigation; used by tests and the CLI.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    calls: Mutex<Vec<Navigation>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn navigations(&self) -> Vec<Navigation> {
        self.calls
            .lock()
            .map(|c| c.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn count(&self) -> usize {
        self.navigations().len()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, navigation: &Navigation) {
        match self.calls.lock() {
            Ok(mut c) => c.push(navigation.clone()),
            Err(poisoned) => poisoned.into_inner().push(navigation.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub order_id: String,
    /// Authenticated identity, if any. Only carried into logs.
    pub user_uid: Option<String>,
}

impl SessionContext {
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            user_uid: None,
        }
    }

    pub fn with_user(mut self, uid: impl Into<String>) -> Self {
        self.user_uid = Some(uid.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    #[serde(flatten)]
    pub state: ConfirmationState,
}

impl SessionSnapshot {
    pub fn is_paid(&self) -> bool {
        self.state.is_paid()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub order_id: String,
    pub navigation: Option<Navigation>,
    pub phase: Phase,
    pub state: ConfirmationState,
}

pub struct SessionHandle {
    snapshots: watch::Receiver<SessionSnapshot>,
    shutdown: oneshot::Sender<()>,
    join: JoinHandle<SessionOutcome>,
}

impl SessionHandle {
    /// Receiver that observes every published snapshot.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    pub fn current(&self) -> SessionSnapshot {
        *self.snapshots.borrow()
    }

    /// Wait for the session to reach a terminal state on its own.
    pub async fn join(self) -> Result<SessionOutcome, JoinError> {
        let SessionHandle { shutdown, join, .. } = self;
        let outcome = join.await;
        drop(shutdown);
        outcome
    }

    /// View teardown: cancel every timer and the subscription. Never navigates.
    pub async fn teardown(self) -> Result<SessionOutcome, JoinError> {
        let SessionHandle { shutdown, join, .. } = self;
        // The task may already have finished; that outcome stands.
        let _ = shutdown.send(());
        join.await
    }
}

/// Start a confirmation session for one order.
///
/// `feed` is the order subscription: it should yield the current record and
/// then every change. The first record with the paid marker confirms.
pub fn spawn_session<S>(
    ctx: SessionContext,
    feed: S,
    timings: ConfirmationTimings,
    navigator: Arc<dyn Navigator>,
) -> SessionHandle
where
    S: Stream<Item = Order> + Send + 'static,
{
    // Fields are public; struct literals bypass `from_millis`.
    let timings = timings.clamped();
    let machine = Reconciler::new(timings.deadline);
    let (tx, rx) = watch::channel(SessionSnapshot {
        phase: machine.phase(),
        state: machine.state(),
    });
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let span = info_span!(
        "confirmation",
        order_id = %ctx.order_id,
        user_uid = ctx.user_uid.as_deref().unwrap_or("-")
    );
    let task = Session {
        order_id: ctx.order_id,
        feed: Some(feed.boxed()),
        timings,
        navigator,
        machine,
        snapshots: tx,
        navigation: None,
    };
    let join = tokio::spawn(task.run(shutdown_rx).instrument(span));

    SessionHandle {
        snapshots: rx,
        shutdown: shutdown_tx,
        join,
    }
}

/// Feed that performs `subscribe` inside the session task, so the deadline
/// is already running while it connects. A failed subscription is logged and
/// behaves like a feed that never confirms.
pub fn subscribe_in_session<F, S, E>(subscribe: F) -> impl Stream<Item = Order> + Send + 'static
where
    F: Future<Output = Result<S, E>> + Send + 'static,
    S: Stream<Item = Order> + Send + 'static,
    E: Display + Send + 'static,
{
    stream::once(subscribe).flat_map(|res| match res {
        Ok(feed) => feed.left_stream(),
        Err(e) => {
            warn!(error = %e, "order subscription failed; the deadline will redirect");
            stream::empty::<Order>().right_stream()
        }
    })
}

struct Progress {
    started: Instant,
    interval: Interval,
}

struct Session {
    order_id: String,
    feed: Option<BoxStream<'static, Order>>,
    timings: ConfirmationTimings,
    navigator: Arc<dyn Navigator>,
    machine: Reconciler,
    snapshots: watch::Sender<SessionSnapshot>,
    navigation: Option<Navigation>,
}

async fn next_order(feed: &mut Option<BoxStream<'static, Order>>) -> Option<Order> {
    match feed {
        Some(s) => s.next().await,
        None => std::future::pending().await,
    }
}

async fn next_progress(progress: &mut Option<Progress>) -> Duration {
    match progress {
        Some(p) => {
            p.interval.tick().await;
            p.started.elapsed()
        }
        None => std::future::pending().await,
    }
}

fn progress_pct(elapsed: Duration, total: Duration) -> u8 {
    let total = total.as_millis().max(1);
    let pct = (elapsed.as_millis() * 100 / total).min(100);
    u8::try_from(pct).unwrap_or(100)
}

impl Session {
    async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> SessionOutcome {
        let start = Instant::now();
        let deadline_at = start + self.timings.deadline;

        let dwell = sleep(self.timings.min_dwell);
        tokio::pin!(dwell);
        let mut dwell_armed = true;

        let tick = sleep_until((start + self.timings.tick).min(deadline_at));
        tokio::pin!(tick);
        let mut deadline_armed = true;

        let mut progress: Option<Progress> = None;

        info!(
            dwell_ms = self.timings.min_dwell.as_millis() as u64,
            deadline_ms = self.timings.deadline.as_millis() as u64,
            "confirmation session started"
        );

        loop {
            // Ties resolve in declaration order.
            let effects = tokio::select! {
                biased;

                _ = &mut shutdown => self.machine.step(Event::Teardown),

                item = next_order(&mut self.feed) => match item {
                    Some(order) if order.confirms_payment() => {
                        debug!(status = %order.status, "paid marker observed");
                        self.machine.step(Event::RemoteConfirmed)
                    }
                    Some(order) => {
                        debug!(status = %order.status, "order update without paid marker");
                        Vec::new()
                    }
                    None => {
                        debug!("order feed ended; waiting on timers");
                        self.feed = None;
                        Vec::new()
                    }
                },

                _ = &mut dwell, if dwell_armed => {
                    dwell_armed = false;
                    self.machine.step(Event::DwellElapsed)
                }

                elapsed = next_progress(&mut progress) => {
                    let pct = progress_pct(elapsed, self.timings.progress);
                    self.machine.step(Event::Progress { pct })
                }

                _ = &mut tick, if deadline_armed => {
                    let now = Instant::now();
                    let next = (tick.deadline() + self.timings.tick).min(deadline_at);
                    tick.as_mut().reset(next);
                    self.machine.step(Event::DeadlineTick {
                        remaining: deadline_at.saturating_duration_since(now),
                    })
                }
            };

            for effect in effects {
                match effect {
                    Effect::ReleaseSubscription => {
                        self.feed = None;
                    }
                    Effect::StartProgress => {
                        deadline_armed = false;
                        let mut iv = interval(self.timings.progress_step);
                        iv.set_missed_tick_behavior(MissedTickBehavior::Skip);
                        progress = Some(Progress {
                            started: Instant::now(),
                            interval: iv,
                        });
                        info!("payment confirmed");
                    }
                    Effect::ReleaseAll => {
                        self.feed = None;
                        dwell_armed = false;
                        deadline_armed = false;
                        progress = None;
                    }
                    Effect::Navigate(cause) => self.navigate(cause),
                }
            }

            self.snapshots.send_replace(SessionSnapshot {
                phase: self.machine.phase(),
                state: self.machine.state(),
            });

            if self.machine.phase().is_terminal() {
                break;
            }
        }

        info!(phase = ?self.machine.phase(), "confirmation session ended");
        SessionOutcome {
            order_id: self.order_id,
            navigation: self.navigation,
            phase: self.machine.phase(),
            state: self.machine.state(),
        }
    }

    fn navigate(&mut self, cause: NavigationCause) {
        if self.navigation.is_some() {
            return;
        }
        let nav = Navigation {
            route: tracking_route(&self.order_id),
            cause,
        };
        info!(route = %nav.route, cause = ?cause, "navigating");
        self.navigator.navigate(&nav);
        self.navigation = Some(nav);
    }
}
