//! Commit interval state machine with exponential backoff.

use std::time::Duration;

/// Scheduler phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Not started.
    Idle,
    /// Waiting for the next tick.
    Waiting(Duration),
    /// A commit cycle is in flight.
    Committing,
}

/// Tracks the interval between commit cycles.
///
/// After `k` consecutive failures the interval is `min(base * 2^k, max)`; the
/// first success resets it to `base`.
#[derive(Debug, Clone)]
pub struct CommitScheduler {
    base: Duration,
    max: Duration,
    interval: Duration,
    failures: u32,
    state: SchedulerState,
}

impl CommitScheduler {
    /// Build an idle scheduler. A ceiling below `base` is raised to `base`.
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            interval: base,
            failures: 0,
            state: SchedulerState::Idle,
        }
    }

    /// Enter `Waiting(base)` and return the first interval.
    pub const fn start(&mut self) -> Duration {
        self.interval = self.base;
        self.failures = 0;
        self.state = SchedulerState::Waiting(self.base);
        self.base
    }

    /// Mark a tick as in flight.
    pub const fn begin_cycle(&mut self) {
        self.state = SchedulerState::Committing;
    }

    /// Reset to the base interval.
    pub const fn on_success(&mut self) -> Duration {
        self.failures = 0;
        self.interval = self.base;
        self.state = SchedulerState::Waiting(self.interval);
        self.interval
    }

    /// Double the interval, capped at the ceiling.
    pub fn on_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.interval = self.interval.saturating_mul(2).min(self.max);
        self.state = SchedulerState::Waiting(self.interval);
        self.interval
    }

    /// Interval until the next tick.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Current phase.
    #[must_use]
    pub const fn state(&self) -> SchedulerState {
        self.state
    }

    /// Failures since the last success.
    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(1_000);
    const MAX: Duration = Duration::from_millis(5_000);

    #[test]
    fn starts_idle_then_waits_on_base() {
        let mut scheduler = CommitScheduler::new(BASE, MAX);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.start(), BASE);
        assert_eq!(scheduler.state(), SchedulerState::Waiting(BASE));
        scheduler.begin_cycle();
        assert_eq!(scheduler.state(), SchedulerState::Committing);
    }

    #[test]
    fn backoff_follows_capped_doubling() {
        let mut scheduler = CommitScheduler::new(BASE, MAX);
        scheduler.start();
        for k in 1..=6_u32 {
            scheduler.begin_cycle();
            let interval = scheduler.on_failure();
            let expected = BASE.saturating_mul(2_u32.pow(k)).min(MAX);
            assert_eq!(interval, expected, "after {k} failures");
            assert_eq!(scheduler.state(), SchedulerState::Waiting(expected));
        }
        assert_eq!(scheduler.consecutive_failures(), 6);
    }

    #[test]
    fn one_success_resets() {
        let mut scheduler = CommitScheduler::new(BASE, MAX);
        scheduler.start();
        scheduler.on_failure();
        scheduler.on_failure();
        assert_eq!(scheduler.interval(), Duration::from_millis(4_000));
        assert_eq!(scheduler.on_success(), BASE);
        assert_eq!(scheduler.consecutive_failures(), 0);
        assert_eq!(scheduler.on_failure(), Duration::from_millis(2_000));
    }

    #[test]
    fn ceiling_below_base_is_raised() {
        let mut scheduler = CommitScheduler::new(BASE, Duration::from_millis(10));
        scheduler.start();
        assert_eq!(scheduler.on_failure(), BASE);
    }
}
