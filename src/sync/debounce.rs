//! Debounce state machine driven by caller-supplied instants.
//!
//! No timers or threads live here. Callers feed events with `trigger(now)`
//! and ask `poll(now)` whether the pass is due, which makes the behaviour
//! testable by advancing a virtual clock.

use std::time::{Duration, Instant};

/// Where the debouncer is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    /// Nothing pending.
    Idle,
    /// A pass will run once `deadline` is reached.
    Scheduled { deadline: Instant },
    /// A pass is executing; `rerun` records triggers that arrived meanwhile.
    Running { rerun: bool },
}

/// Collapses bursts of triggers into one pass per quiet window.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    state: DebounceState,
}

impl Debouncer {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: DebounceState::Idle,
        }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    #[must_use]
    pub fn state(&self) -> DebounceState {
        self.state
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == DebounceState::Idle
    }

    /// Register an event. Schedules a pass or pushes the pending deadline out.
    pub fn trigger(&mut self, now: Instant) {
        self.state = match self.state {
            DebounceState::Idle | DebounceState::Scheduled { .. } => DebounceState::Scheduled {
                deadline: now + self.window,
            },
            DebounceState::Running { .. } => DebounceState::Running { rerun: true },
        };
    }

    /// The pending deadline, if a pass is scheduled.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Scheduled { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Returns true (and enters `Running`) when the scheduled pass is due.
    ///
    /// The caller must call [`Debouncer::finish`] once the pass completes.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.state {
            DebounceState::Scheduled { deadline } if now >= deadline => {
                self.state = DebounceState::Running { rerun: false };
                true
            }
            _ => false,
        }
    }

    /// Leave `Running`. Triggers that arrived during the pass schedule
    /// another one a full window after `now`.
    pub fn finish(&mut self, now: Instant) {
        self.state = match self.state {
            DebounceState::Running { rerun: true } => DebounceState::Scheduled {
                deadline: now + self.window,
            },
            _ => DebounceState::Idle,
        };
    }

    /// Drop any pending pass.
    pub fn cancel(&mut self) {
        self.state = DebounceState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(1);

    #[test]
    fn test_single_trigger_fires_after_window() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(WINDOW);

        d.trigger(t0);
        assert!(!d.poll(t0 + Duration::from_millis(999)));
        assert!(d.poll(t0 + WINDOW));
        assert_eq!(d.state(), DebounceState::Running { rerun: false });

        d.finish(t0 + WINDOW);
        assert!(d.is_idle());
    }

    #[test]
    fn test_burst_collapses_into_one_pass() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(WINDOW);

        for i in 0..10 {
            d.trigger(t0 + Duration::from_millis(i * 200));
        }
        let last = t0 + Duration::from_millis(1800);

        assert!(!d.poll(last + Duration::from_millis(500)));
        assert!(d.poll(last + WINDOW));
        d.finish(last + WINDOW);
        assert!(!d.poll(last + WINDOW * 5));
    }

    #[test]
    fn test_trigger_while_running_schedules_rerun() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(WINDOW);

        d.trigger(t0);
        assert!(d.poll(t0 + WINDOW));
        d.trigger(t0 + WINDOW + Duration::from_millis(10));
        assert!(!d.poll(t0 + WINDOW * 3), "no second pass while running");

        let done = t0 + WINDOW * 3;
        d.finish(done);
        assert_eq!(d.deadline(), Some(done + WINDOW));
        assert!(d.poll(done + WINDOW));
    }

    #[test]
    fn test_cancel_drops_pending_pass() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(WINDOW);

        d.trigger(t0);
        d.cancel();
        assert!(!d.poll(t0 + WINDOW * 2));
        assert!(d.is_idle());
    }
}
