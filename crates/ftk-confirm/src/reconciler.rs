//! Payment-confirmation state machine.
//!
//! Pure: no timers, no I/O. The session driver feeds it events from three
//! sources (order feed, dwell timer, deadline tick) plus the progress
//! animation, and executes the returned [`Effect`]s.
//!
//! ```text
//!   Pending ──RemoteConfirmed──▶ Confirming ──DwellElapsed──▶ Confirmed ──100%──▶ Completed
//!      │  └──DwellElapsed (latched, stays Pending)              │
//!      └──────────── deadline reaches 0 ──────▶ DeadlineExpired  │
//!   any non-terminal ──Teardown──▶ Closed                        └─(deadline disarmed)
//! ```
//!
//! Completed, DeadlineExpired and Closed are terminal and ignore every event,
//! so at most one `Navigate` effect is ever produced.

use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Waiting for the remote paid marker.
    Pending,
    /// Remote confirmed; minimum dwell not yet elapsed.
    Confirming,
    /// Both signals latched; progress animation running.
    Confirmed,
    Completed,
    DeadlineExpired,
    /// Torn down by the view before any navigation.
    Closed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Phase::Completed | Phase::DeadlineExpired | Phase::Closed
        )
    }
}

/// UI-facing state of one checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationState {
    pub remote_confirmed: bool,
    pub minimum_dwell_elapsed: bool,
    pub progress_pct: u8,
    pub seconds_to_deadline: u64,
}

impl ConfirmationState {
    pub fn is_paid(&self) -> bool {
        self.remote_confirmed && self.minimum_dwell_elapsed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The order feed delivered a record carrying the paid marker.
    RemoteConfirmed,
    DwellElapsed,
    DeadlineTick { remaining: Duration },
    Progress { pct: u8 },
    /// Progress animation finished. May be delivered more than once.
    ProgressComplete,
    Teardown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NavigationCause {
    Completed,
    DeadlineExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Drop the order subscription; the remote signal is latched.
    ReleaseSubscription,
    /// Start the progress animation and disarm the deadline.
    StartProgress,
    /// Cancel every timer and subscription still held by the session.
    ReleaseAll,
    Navigate(NavigationCause),
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    phase: Phase,
    state: ConfirmationState,
}

/// Whole seconds left, rounded up so the UI never shows 0 early.
pub fn seconds_remaining(remaining: Duration) -> u64 {
    let ms = remaining.as_millis();
    u64::try_from(ms.div_ceil(1000)).unwrap_or(u64::MAX)
}

impl Reconciler {
    pub fn new(deadline: Duration) -> Self {
        Self {
            phase: Phase::Pending,
            state: ConfirmationState {
                remote_confirmed: false,
                minimum_dwell_elapsed: false,
                progress_pct: 0,
                seconds_to_deadline: seconds_remaining(deadline),
            },
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> ConfirmationState {
        self.state
    }

    pub fn is_paid(&self) -> bool {
        self.state.is_paid()
    }

    pub fn step(&mut self, event: Event) -> Vec<Effect> {
        if self.phase.is_terminal() {
            return Vec::new();
        }

        match event {
            Event::RemoteConfirmed => {
                if self.state.remote_confirmed {
                    return Vec::new();
                }
                self.state.remote_confirmed = true;
                let mut effects = vec![Effect::ReleaseSubscription];
                effects.extend(self.settle());
                effects
            }
            Event::DwellElapsed => {
                if self.state.minimum_dwell_elapsed {
                    return Vec::new();
                }
                self.state.minimum_dwell_elapsed = true;
                self.settle()
            }
            Event::DeadlineTick { remaining } => {
                if self.phase == Phase::Confirmed {
                    return Vec::new();
                }
                self.state.seconds_to_deadline = seconds_remaining(remaining);
                if remaining.is_zero() {
                    self.phase = Phase::DeadlineExpired;
                    vec![
                        Effect::ReleaseAll,
                        Effect::Navigate(NavigationCause::DeadlineExpired),
                    ]
                } else {
                    Vec::new()
                }
            }
            Event::Progress { pct } => {
                if self.phase != Phase::Confirmed {
                    return Vec::new();
                }
                // Monotone: a late or reordered tick never moves the bar back.
                self.state.progress_pct = self.state.progress_pct.max(pct.min(100));
                if self.state.progress_pct == 100 {
                    self.complete()
                } else {
                    Vec::new()
                }
            }
            Event::ProgressComplete => {
                if self.phase != Phase::Confirmed {
                    return Vec::new();
                }
                self.state.progress_pct = 100;
                self.complete()
            }
            Event::Teardown => {
                self.phase = Phase::Closed;
                vec![Effect::ReleaseAll]
            }
        }
    }

    fn settle(&mut self) -> Vec<Effect> {
        match (self.state.remote_confirmed, self.state.minimum_dwell_elapsed) {
            (true, true) => {
                self.phase = Phase::Confirmed;
                vec![Effect::StartProgress]
            }
            (true, false) => {
                self.phase = Phase::Confirming;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn complete(&mut self) -> Vec<Effect> {
        self.phase = Phase::Completed;
        vec![
            Effect::ReleaseAll,
            Effect::Navigate(NavigationCause::Completed),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEADLINE: Duration = Duration::from_secs(20);

    fn navigations(effects: &[Effect]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, Effect::Navigate(_)))
            .count()
    }

    fn confirmed() -> Reconciler {
        let mut r = Reconciler::new(DEADLINE);
        r.step(Event::RemoteConfirmed);
        assert_eq!(r.step(Event::DwellElapsed), vec![Effect::StartProgress]);
        r
    }

    #[test]
    fn remote_before_dwell_is_not_paid_until_floor() {
        let mut r = Reconciler::new(DEADLINE);
        assert_eq!(
            r.step(Event::RemoteConfirmed),
            vec![Effect::ReleaseSubscription]
        );
        assert_eq!(r.phase(), Phase::Confirming);
        assert!(!r.is_paid());

        r.step(Event::DwellElapsed);
        assert_eq!(r.phase(), Phase::Confirmed);
        assert!(r.is_paid());
    }

    #[test]
    fn dwell_alone_stays_pending() {
        let mut r = Reconciler::new(DEADLINE);
        assert!(r.step(Event::DwellElapsed).is_empty());
        assert_eq!(r.phase(), Phase::Pending);
        assert!(!r.is_paid());
        // Latches never revert and never re-emit.
        assert!(r.step(Event::DwellElapsed).is_empty());
    }

    #[test]
    fn repeated_remote_signal_is_ignored() {
        let mut r = Reconciler::new(DEADLINE);
        r.step(Event::RemoteConfirmed);
        assert!(r.step(Event::RemoteConfirmed).is_empty());
    }

    #[test]
    fn double_completion_navigates_once() {
        let mut r = confirmed();
        let first = r.step(Event::ProgressComplete);
        let second = r.step(Event::ProgressComplete);
        assert_eq!(
            first,
            vec![
                Effect::ReleaseAll,
                Effect::Navigate(NavigationCause::Completed)
            ]
        );
        assert!(second.is_empty());
        assert_eq!(r.phase(), Phase::Completed);
    }

    #[test]
    fn progress_is_monotone_and_completes_at_100() {
        let mut r = confirmed();
        r.step(Event::Progress { pct: 40 });
        r.step(Event::Progress { pct: 10 });
        assert_eq!(r.state().progress_pct, 40);
        let effects = r.step(Event::Progress { pct: 100 });
        assert_eq!(navigations(&effects), 1);
        assert!(r.step(Event::ProgressComplete).is_empty());
    }

    #[test]
    fn progress_before_confirmation_is_ignored() {
        let mut r = Reconciler::new(DEADLINE);
        assert!(r.step(Event::ProgressComplete).is_empty());
        assert!(r.step(Event::Progress { pct: 100 }).is_empty());
        assert_eq!(r.phase(), Phase::Pending);
    }

    #[test]
    fn deadline_navigates_once_then_everything_is_ignored() {
        let mut r = Reconciler::new(DEADLINE);
        r.step(Event::DeadlineTick {
            remaining: Duration::from_millis(1_500),
        });
        assert_eq!(r.state().seconds_to_deadline, 2);

        let effects = r.step(Event::DeadlineTick {
            remaining: Duration::ZERO,
        });
        assert_eq!(
            effects,
            vec![
                Effect::ReleaseAll,
                Effect::Navigate(NavigationCause::DeadlineExpired)
            ]
        );
        assert_eq!(r.phase(), Phase::DeadlineExpired);

        for ev in [
            Event::RemoteConfirmed,
            Event::DwellElapsed,
            Event::DeadlineTick {
                remaining: Duration::ZERO,
            },
            Event::ProgressComplete,
            Event::Teardown,
        ] {
            assert!(r.step(ev).is_empty(), "{ev:?} acted after the deadline");
        }
        assert!(!r.is_paid());
    }

    #[test]
    fn confirmed_session_ignores_the_deadline() {
        let mut r = confirmed();
        assert!(r
            .step(Event::DeadlineTick {
                remaining: Duration::ZERO
            })
            .is_empty());
        assert_eq!(r.phase(), Phase::Confirmed);
    }

    #[test]
    fn teardown_releases_without_navigating() {
        let mut r = Reconciler::new(DEADLINE);
        r.step(Event::RemoteConfirmed);
        assert_eq!(r.step(Event::Teardown), vec![Effect::ReleaseAll]);
        assert_eq!(r.phase(), Phase::Closed);
        assert!(r.step(Event::DwellElapsed).is_empty());
    }

    #[test]
    fn seconds_round_up() {
        assert_eq!(seconds_remaining(Duration::from_millis(20_000)), 20);
        assert_eq!(seconds_remaining(Duration::from_millis(19_001)), 20);
        assert_eq!(seconds_remaining(Duration::from_millis(1)), 1);
        assert_eq!(seconds_remaining(Duration::ZERO), 0);
    }
}
