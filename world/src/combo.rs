//! Consecutive-hit tracking and the multiplier it drives.

use std::time::Duration;

use pool_tap_core::{ComboSnapshot, Multiplier};

use crate::timer::TimerSlot;

/// Combo state machine with its single decay slot.
///
/// Every hit re-arms the decay slot; when the slot fires before the next hit
/// the combo resets. The multiplier rises by one half step each time the
/// post-increment count lands on a positive multiple of `step`.
#[derive(Clone, Debug)]
pub(crate) struct ComboEngine {
    count: u32,
    multiplier: Multiplier,
    step: u32,
    window: Duration,
    decay: TimerSlot,
}

impl ComboEngine {
    /// Creates an idle engine.
    pub(crate) const fn new(step: u32, window: Duration) -> Self {
        Self {
            count: 0,
            multiplier: Multiplier::BASE,
            step,
            window,
            decay: TimerSlot::new(),
        }
    }

    /// Registers a scoring hit at `now`.
    ///
    /// Returns the counters after the hit and whether the multiplier rose.
    pub(crate) fn register_hit(&mut self, now: Duration) -> (ComboSnapshot, bool) {
        self.count = self.count.saturating_add(1);
        let previous = self.multiplier;
        if self.step != 0 && self.count % self.step == 0 {
            self.multiplier = self.multiplier.bumped();
        }
        self.decay.arm(now.saturating_add(self.window));
        (self.snapshot(), self.multiplier != previous)
    }

    /// Resets the combo immediately and cancels the pending decay.
    pub(crate) fn register_penalty(&mut self) {
        self.decay.cancel();
        self.reset();
    }

    /// Multiplier applied to the next hit.
    pub(crate) const fn current_multiplier(&self) -> Multiplier {
        self.multiplier
    }

    pub(crate) const fn snapshot(&self) -> ComboSnapshot {
        ComboSnapshot {
            count: self.count,
            multiplier: self.multiplier,
        }
    }

    pub(crate) const fn decay_deadline(&self) -> Option<Duration> {
        self.decay.deadline()
    }

    /// Resets the combo when the decay slot is due at `now`.
    ///
    /// A slot that was re-armed for a later deadline, or canceled, does not fire.
    pub(crate) fn fire_decay(&mut self, now: Duration) -> bool {
        if !self.decay.take_due(now) {
            return false;
        }
        self.reset();
        true
    }

    /// Cancels the decay slot without touching the counters.
    pub(crate) fn cancel_decay(&mut self) {
        self.decay.cancel();
    }

    fn reset(&mut self) {
        self.count = 0;
        self.multiplier = Multiplier::BASE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const WINDOW: Duration = Duration::from_millis(2_000);

    fn engine() -> ComboEngine {
        ComboEngine::new(5, WINDOW)
    }

    fn hits(engine: &mut ComboEngine, count: u32, spacing_ms: u64) -> Vec<f32> {
        (0..count)
            .map(|index| {
                let at = Duration::from_millis(u64::from(index) * spacing_ms);
                let _ = engine.register_hit(at);
                engine.current_multiplier().as_f32()
            })
            .collect()
    }

    #[test]
    fn fifth_hit_raises_multiplier() {
        let mut engine = engine();
        let observed = hits(&mut engine, 10, 100);
        assert_eq!(
            observed,
            vec![1.0, 1.0, 1.0, 1.0, 1.5, 1.5, 1.5, 1.5, 1.5, 2.0]
        );
    }

    #[test]
    fn bump_is_reported_only_when_multiplier_changes() {
        let mut engine = engine();
        let mut bumps = Vec::new();
        for index in 0..30u64 {
            let (snapshot, bumped) = engine.register_hit(Duration::from_millis(index * 10));
            if bumped {
                bumps.push(snapshot.count);
            }
        }
        assert_eq!(bumps, vec![5, 10, 15, 20]);
        assert_eq!(engine.current_multiplier(), Multiplier::MAX);
    }

    #[test]
    fn decay_resets_after_window_without_hits() {
        let mut engine = engine();
        let _ = hits(&mut engine, 5, 100);
        assert_eq!(engine.decay_deadline(), Some(Duration::from_millis(2_400)));

        assert!(!engine.fire_decay(Duration::from_millis(2_399)));
        assert!(engine.fire_decay(Duration::from_millis(2_400)));
        assert_eq!(engine.snapshot(), ComboSnapshot::default());
        assert_eq!(engine.decay_deadline(), None);
    }

    #[test]
    fn rearming_supersedes_earlier_decay() {
        let mut engine = engine();
        let _ = engine.register_hit(Duration::ZERO);
        let _ = engine.register_hit(Duration::from_millis(1_500));

        assert!(!engine.fire_decay(Duration::from_millis(2_000)));
        assert_eq!(engine.snapshot().count, 2);
        assert!(engine.fire_decay(Duration::from_millis(3_500)));
    }

    #[test]
    fn penalty_resets_and_cancels_decay() {
        let mut engine = engine();
        let _ = hits(&mut engine, 12, 50);
        engine.register_penalty();

        assert_eq!(engine.snapshot(), ComboSnapshot::default());
        assert_eq!(engine.decay_deadline(), None);
        assert!(!engine.fire_decay(Duration::from_secs(60)));
    }

    #[test]
    fn cancel_decay_keeps_counters() {
        let mut engine = engine();
        let _ = hits(&mut engine, 6, 10);
        engine.cancel_decay();
        assert_eq!(engine.snapshot().count, 6);
        assert_eq!(engine.decay_deadline(), None);
    }

    #[derive(Clone, Debug)]
    enum Step {
        Hit(u64),
        Penalty,
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            8 => (0u64..3_000).prop_map(Step::Hit),
            1 => Just(Step::Penalty),
        ]
    }

    proptest! {
        #[test]
        fn multiplier_moves_in_half_steps_within_bounds(steps in prop::collection::vec(step(), 0..200)) {
            let mut engine = engine();
            let mut now = Duration::ZERO;
            for step in steps {
                match step {
                    Step::Hit(gap_ms) => {
                        now += Duration::from_millis(gap_ms);
                        let decayed = engine.fire_decay(now);
                        if decayed {
                            prop_assert_eq!(engine.current_multiplier(), Multiplier::BASE);
                        }
                        let start = engine.snapshot();
                        let (after, bumped) = engine.register_hit(now);
                        prop_assert_eq!(after.count, start.count + 1);
                        if bumped {
                            prop_assert_eq!(after.count % 5, 0);
                            prop_assert_eq!(
                                after.multiplier.half_steps(),
                                start.multiplier.half_steps() + 1
                            );
                        } else {
                            prop_assert_eq!(after.multiplier, start.multiplier);
                        }
                    }
                    Step::Penalty => {
                        engine.register_penalty();
                        prop_assert_eq!(engine.snapshot(), ComboSnapshot::default());
                    }
                }
                let multiplier = engine.current_multiplier();
                prop_assert!(multiplier >= Multiplier::BASE && multiplier <= Multiplier::MAX);
            }
        }
    }
}
