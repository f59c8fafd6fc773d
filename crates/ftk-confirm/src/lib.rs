//! ftk-confirm
//!
//! Payment-confirmation reconciler for the checkout-success view. Merges the
//! asynchronous "paid" push from the order feed with a local minimum-dwell
//! floor and a hard redirect deadline into one monotone UI state, and
//! guarantees exactly one navigation to the tracking view per session (or
//! none when the view is torn down first).
//!
//! - [`Reconciler`]: the pure state machine (`step(event) -> effects`).
//! - [`spawn_session`]: tokio driver owning the timers and subscription.

mod reconciler;
mod session;

pub use reconciler::{
    seconds_remaining, ConfirmationState, Effect, Event, NavigationCause, Phase, Reconciler,
};
pub use session::{
    spawn_session, subscribe_in_session, tracking_route, ConfirmationTimings, Navigation, Navigator,
    RecordingNavigator, SessionContext, SessionHandle, SessionOutcome, SessionSnapshot, MIN_TIMER,
};
