use std::time::{Duration, Instant};

use clap::ValueEnum;

/// When a change to the filter map recomputes the visible rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FilterTrigger {
    /// On every keystroke.
    Immediate,
    /// Once input has been quiet for the debounce delay.
    Debounced,
    /// Only on Enter.
    Manual,
}

/// A single cancellable deadline. Scheduling replaces any pending deadline,
/// so a burst of changes collapses into one pass after the last of them.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Consume the deadline if it has passed. Returns true at most once per schedule.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(d) if now >= d => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Time left until the pending deadline, zero if overdue.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(250);

    #[test]
    fn fires_once_after_delay() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(DELAY);
        d.schedule(t0);
        assert!(d.is_pending());
        assert!(!d.fire_if_due(t0 + Duration::from_millis(100)));
        assert!(d.fire_if_due(t0 + DELAY));
        assert!(!d.fire_if_due(t0 + DELAY * 2));
        assert!(!d.is_pending());
    }

    #[test]
    fn rescheduling_pushes_deadline_out() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(DELAY);
        d.schedule(t0);
        d.schedule(t0 + Duration::from_millis(200));
        assert!(!d.fire_if_due(t0 + Duration::from_millis(300)));
        assert!(d.fire_if_due(t0 + Duration::from_millis(450)));
    }

    #[test]
    fn cancel_drops_pending_pass() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(DELAY);
        d.schedule(t0);
        d.cancel();
        assert!(!d.fire_if_due(t0 + DELAY * 4));
        assert_eq!(d.remaining(t0), None);
    }

    #[test]
    fn remaining_saturates_at_zero() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(DELAY);
        d.schedule(t0);
        assert_eq!(d.remaining(t0), Some(DELAY));
        assert_eq!(d.remaining(t0 + DELAY * 2), Some(Duration::ZERO));
    }
}
