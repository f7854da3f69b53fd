//! Timer primitives driven by the session clock.
//!
//! Neither primitive reads a wall clock. Deadlines are session-relative and
//! the world fires them while processing `Command::Tick`, so timer callbacks
//! interleave with taps one turn at a time.

use std::time::Duration;

/// Single-shot timer with room for exactly one pending deadline.
///
/// Arming cancels whatever deadline was pending, so a superseded callback
/// can never fire.
#[derive(Clone, Debug, Default)]
pub(crate) struct TimerSlot {
    deadline: Option<Duration>,
}

impl TimerSlot {
    /// Creates an idle slot.
    pub(crate) const fn new() -> Self {
        Self { deadline: None }
    }

    /// Cancels any pending deadline and arms the slot for `deadline`.
    pub(crate) fn arm(&mut self, deadline: Duration) {
        self.cancel();
        self.deadline = Some(deadline);
    }

    /// Drops the pending deadline, if any.
    pub(crate) fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Pending deadline.
    pub(crate) const fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Reports whether a deadline is pending.
    pub(crate) const fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Disarms the slot and returns `true` when its deadline is at or before `now`.
    pub(crate) fn take_due(&mut self, now: Duration) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Repeating timer with a fixed period.
#[derive(Clone, Debug)]
pub(crate) struct Cadence {
    period: Duration,
    next: Option<Duration>,
}

impl Cadence {
    /// Creates a stopped cadence.
    pub(crate) const fn new(period: Duration) -> Self {
        Self { period, next: None }
    }

    /// Schedules the first firing one period after `now`.
    ///
    /// A zero period never fires.
    pub(crate) fn start(&mut self, now: Duration) {
        self.next = if self.period.is_zero() {
            None
        } else {
            Some(now.saturating_add(self.period))
        };
    }

    /// Stops the cadence.
    pub(crate) fn cancel(&mut self) {
        self.next = None;
    }

    /// Deadline of the next firing.
    pub(crate) const fn deadline(&self) -> Option<Duration> {
        self.next
    }

    /// Consumes one due firing, scheduling the following one a period later.
    ///
    /// Returns the deadline that fired.
    pub(crate) fn take_due(&mut self, now: Duration) -> Option<Duration> {
        let due = self.next.filter(|deadline| *deadline <= now)?;
        self.next = Some(due.saturating_add(self.period));
        Some(due)
    }
}
