//! Countdown and expiry-sweep cadences owned by the session.

use std::time::Duration;

use pool_tap_core::SessionConfig;

use crate::timer::Cadence;

/// Single authority for clock-driven progression.
///
/// The countdown cadence and the sweep cadence tick independently; they are
/// started together and canceled together.
#[derive(Clone, Debug)]
pub(crate) struct SessionClock {
    remaining_seconds: u32,
    countdown: Cadence,
    sweep: Cadence,
}

impl SessionClock {
    /// Creates a clock whose cadences start at `now`.
    pub(crate) fn started(config: &SessionConfig, now: Duration) -> Self {
        let mut clock = Self {
            remaining_seconds: config.duration_secs,
            countdown: Cadence::new(config.countdown_interval()),
            sweep: Cadence::new(config.sweep_interval()),
        };
        clock.countdown.start(now);
        clock.sweep.start(now);
        clock
    }

    /// Whole seconds left on the countdown.
    pub(crate) const fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub(crate) const fn countdown_deadline(&self) -> Option<Duration> {
        self.countdown.deadline()
    }

    pub(crate) const fn sweep_deadline(&self) -> Option<Duration> {
        self.sweep.deadline()
    }

    /// Consumes a due countdown firing and returns the seconds left afterwards.
    ///
    /// Reaching zero stops the countdown cadence.
    pub(crate) fn fire_countdown(&mut self, now: Duration) -> Option<u32> {
        let _fired_at = self.countdown.take_due(now)?;
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.countdown.cancel();
        }
        Some(self.remaining_seconds)
    }

    /// Consumes a due sweep firing.
    pub(crate) fn fire_sweep(&mut self, now: Duration) -> bool {
        self.sweep.take_due(now).is_some()
    }

    /// Stops both cadences.
    pub(crate) fn cancel_all(&mut self) {
        self.countdown.cancel();
        self.sweep.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_config() -> SessionConfig {
        SessionConfig {
            duration_secs: 3,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn countdown_reaches_zero_and_stops() {
        let mut clock = SessionClock::started(&short_config(), Duration::ZERO);
        let mut observed = Vec::new();
        for second in 1..=5 {
            if let Some(remaining) = clock.fire_countdown(Duration::from_secs(second)) {
                observed.push(remaining);
            }
        }

        assert_eq!(observed, vec![2, 1, 0]);
        assert_eq!(clock.countdown_deadline(), None);
        assert_eq!(clock.sweep_deadline(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn cancel_all_stops_both_cadences() {
        let mut clock = SessionClock::started(&short_config(), Duration::ZERO);
        clock.cancel_all();

        assert_eq!(clock.countdown_deadline(), None);
        assert_eq!(clock.sweep_deadline(), None);
        assert_eq!(clock.fire_countdown(Duration::from_secs(10)), None);
        assert!(!clock.fire_sweep(Duration::from_secs(10)));
        assert_eq!(clock.remaining_seconds(), 3);
    }

    #[test]
    fn cadences_tick_independently() {
        let config = SessionConfig {
            sweep_interval_ms: 400,
            ..short_config()
        };
        let mut clock = SessionClock::started(&config, Duration::ZERO);

        assert!(clock.fire_sweep(Duration::from_millis(400)));
        assert_eq!(clock.fire_countdown(Duration::from_millis(400)), None);
        assert!(clock.fire_sweep(Duration::from_millis(800)));
        assert_eq!(clock.fire_countdown(Duration::from_millis(1_000)), Some(2));
        assert_eq!(clock.sweep_deadline(), Some(Duration::from_millis(1_200)));
    }
}
