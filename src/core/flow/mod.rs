//! Step flows and countdown gates
//!
//! Onboarding and confirmation dialogs are strictly linear: a flow only ever
//! moves forward. Time is passed in by the caller so flows can be driven
//! from a frame loop or from tests.

mod dialogs;
mod onboarding;

pub use dialogs::{ConfirmDialog, ConfirmKind};
pub use onboarding::{Onboarding, OnboardingStep};

use std::fmt::Debug;
use std::time::{Duration, Instant};

/// A step in a linear flow
pub trait FlowStep: Copy + Eq + Debug {
    /// Delay after which the flow leaves this step on its own
    fn auto_advance(self) -> Option<Duration>;
}

/// Forward-only sequence of steps
#[derive(Debug, Clone)]
pub struct LinearFlow<S: FlowStep> {
    steps: Vec<S>,
    index: usize,
    entered_at: Instant,
    finished: bool,
}

impl<S: FlowStep> LinearFlow<S> {
    pub fn new(steps: Vec<S>, now: Instant) -> Self {
        assert!(!steps.is_empty(), "a flow needs at least one step");
        Self {
            steps,
            index: 0,
            entered_at: now,
            finished: false,
        }
    }

    pub fn current(&self) -> S {
        self.steps[self.index]
    }

    /// (1-based position, total steps)
    pub fn position(&self) -> (usize, usize) {
        (self.index + 1, self.steps.len())
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Move to the next step. Leaving the last step finishes the flow.
    pub fn advance(&mut self, now: Instant) {
        if self.finished {
            return;
        }
        if self.index + 1 < self.steps.len() {
            self.index += 1;
            self.entered_at = now;
            tracing::debug!("Flow advanced to {:?}", self.current());
        } else {
            self.finished = true;
        }
    }

    /// Time left before the current step advances itself
    pub fn auto_remaining(&self, now: Instant) -> Option<Duration> {
        let delay = self.current().auto_advance()?;
        Some(delay.saturating_sub(now.saturating_duration_since(self.entered_at)))
    }

    /// Apply any due auto-advance. Returns whether the flow moved.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.finished {
            return false;
        }
        match self.auto_remaining(now) {
            Some(left) if left.is_zero() => {
                self.advance(now);
                true
            }
            _ => false,
        }
    }
}

/// Delay before a risky action may be confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownGate {
    started: Instant,
    duration: Duration,
}

impl CountdownGate {
    pub fn new(duration: Duration, now: Instant) -> Self {
        Self {
            started: now,
            duration,
        }
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.duration
            .saturating_sub(now.saturating_duration_since(self.started))
    }

    /// Whole seconds left, rounded up, for the button label
    pub fn seconds_left(&self, now: Instant) -> u64 {
        let left = self.remaining(now);
        left.as_secs() + u64::from(left.subsec_nanos() > 0)
    }

    pub fn is_open(&self, now: Instant) -> bool {
        self.remaining(now).is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Step {
        Intro,
        Middle,
        Outro,
    }

    impl FlowStep for Step {
        fn auto_advance(self) -> Option<Duration> {
            match self {
                Step::Intro => Some(Duration::from_secs(2)),
                Step::Middle => None,
                Step::Outro => Some(Duration::from_secs(1)),
            }
        }
    }

    #[test]
    fn test_flow_auto_advances() {
        let start = Instant::now();
        let mut flow = LinearFlow::new(vec![Step::Intro, Step::Middle, Step::Outro], start);

        assert!(!flow.tick(start + Duration::from_millis(1999)));
        assert_eq!(flow.current(), Step::Intro);

        assert!(flow.tick(start + Duration::from_secs(2)));
        assert_eq!(flow.current(), Step::Middle);

        // Manual steps never move by themselves
        assert!(!flow.tick(start + Duration::from_secs(60)));
        assert_eq!(flow.auto_remaining(start), None);
    }

    #[test]
    fn test_flow_finishes_after_last_step() {
        let start = Instant::now();
        let mut flow = LinearFlow::new(vec![Step::Middle, Step::Outro], start);
        flow.advance(start);
        assert_eq!(flow.position(), (2, 2));

        assert!(flow.tick(start + Duration::from_secs(1)));
        assert!(flow.is_finished());
        assert_eq!(flow.current(), Step::Outro);
        assert!(!flow.tick(start + Duration::from_secs(5)));
    }

    #[test]
    fn test_countdown_gate() {
        let start = Instant::now();
        let gate = CountdownGate::new(Duration::from_secs(5), start);

        assert!(!gate.is_open(start));
        assert_eq!(gate.seconds_left(start), 5);
        assert_eq!(gate.seconds_left(start + Duration::from_millis(4100)), 1);
        assert!(gate.is_open(start + Duration::from_secs(5)));
        assert_eq!(gate.seconds_left(start + Duration::from_secs(9)), 0);
    }
}
