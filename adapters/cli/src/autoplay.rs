//! Seeded bot that plays a session headlessly.

use std::{cmp::Reverse, time::Duration};

use anyhow::{ensure, Result};
use pool_tap_core::{SessionFrame, SessionPhase, TargetId, TargetSnapshot};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;

/// Skill parameters of the bot.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct AutoplayConfig {
    /// Minimum age of a target before the bot notices it.
    pub(crate) reaction_ms: u64,
    /// Probability that a noticed scoring target is actually hit on a frame.
    pub(crate) accuracy: f64,
    /// Probability of tapping a visible bad ball on a frame.
    pub(crate) blunder_rate: f64,
}

impl Default for AutoplayConfig {
    fn default() -> Self {
        Self {
            reaction_ms: 600,
            accuracy: 0.35,
            blunder_rate: 0.02,
        }
    }
}

impl AutoplayConfig {
    fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.accuracy),
            "autoplay accuracy {} is not within [0, 1]",
            self.accuracy
        );
        ensure!(
            (0.0..=1.0).contains(&self.blunder_rate),
            "autoplay blunder rate {} is not within [0, 1]",
            self.blunder_rate
        );
        Ok(())
    }
}

/// Picks at most one target to tap per frame.
#[derive(Debug)]
pub(crate) struct Autoplayer {
    config: AutoplayConfig,
    rng: ChaCha8Rng,
}

impl Autoplayer {
    pub(crate) fn new(config: AutoplayConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Chooses the target tapped on this frame, preferring the most valuable one.
    pub(crate) fn choose(&mut self, frame: &SessionFrame) -> Option<TargetId> {
        if frame.phase != SessionPhase::Running || frame.exploding {
            return None;
        }

        let reaction = Duration::from_millis(self.config.reaction_ms);
        let (penalties, scoring): (Vec<&TargetSnapshot>, Vec<&TargetSnapshot>) = frame
            .targets
            .iter()
            .filter(|target| frame.now.saturating_sub(target.spawned_at) >= reaction)
            .partition(|target: &&TargetSnapshot| target.variant.is_penalty());

        if let Some(bad_ball) = penalties.first() {
            if self.rng.gen_bool(self.config.blunder_rate) {
                return Some(bad_ball.id);
            }
        }

        let best = scoring
            .iter()
            .max_by_key(|target| (target.variant.point_value(), Reverse(target.id)))?;
        self.rng
            .gen_bool(self.config.accuracy)
            .then_some(best.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pool_tap_core::{
        ComboSnapshot, Experience, FinalScore, TargetCatalog, TargetSnapshot, TargetView,
        VariantId,
    };

    fn snapshot(id: u64, variant: u8, spawned_ms: u64) -> TargetSnapshot {
        TargetSnapshot {
            id: TargetId::new(id),
            variant: TargetCatalog::variant(VariantId::new(variant)).expect("variant"),
            horizontal_position: 0.4,
            spawned_at: Duration::from_millis(spawned_ms),
            remaining_fraction: 1.0,
        }
    }

    fn frame(now_ms: u64, targets: Vec<TargetSnapshot>) -> SessionFrame {
        SessionFrame {
            now: Duration::from_millis(now_ms),
            phase: SessionPhase::Running,
            remaining_seconds: 60,
            experience: Experience::ZERO,
            provisional_score: FinalScore::new(0),
            combo: ComboSnapshot::default(),
            exploding: false,
            targets: TargetView::from_snapshots(targets),
        }
    }

    fn sharpshooter() -> Autoplayer {
        let config = AutoplayConfig {
            reaction_ms: 500,
            accuracy: 1.0,
            blunder_rate: 0.0,
        };
        Autoplayer::new(config, 11).expect("valid config")
    }

    #[test]
    fn waits_for_reaction_delay() {
        let mut bot = sharpshooter();
        let fresh = frame(1_400, vec![snapshot(1, 9, 1_000)]);
        assert_eq!(bot.choose(&fresh), None);

        let noticed = frame(1_500, vec![snapshot(1, 9, 1_000)]);
        assert_eq!(bot.choose(&noticed), Some(TargetId::new(1)));
    }

    #[test]
    fn prefers_the_most_valuable_target() {
        let mut bot = sharpshooter();
        let board = frame(
            5_000,
            vec![snapshot(1, 3, 0), snapshot(2, 14, 0), snapshot(3, 14, 1_000)],
        );
        assert_eq!(bot.choose(&board), Some(TargetId::new(2)));
    }

    #[test]
    fn never_taps_while_exploding_or_ending() {
        let mut bot = sharpshooter();
        let mut board = frame(5_000, vec![snapshot(1, 7, 0)]);
        board.exploding = true;
        assert_eq!(bot.choose(&board), None);

        board.exploding = false;
        board.phase = SessionPhase::Ending;
        assert_eq!(bot.choose(&board), None);
    }

    #[test]
    fn certain_blunder_taps_the_bad_ball() {
        let config = AutoplayConfig {
            reaction_ms: 0,
            accuracy: 1.0,
            blunder_rate: 1.0,
        };
        let mut bot = Autoplayer::new(config, 3).expect("valid config");
        let penalty = TargetCatalog::penalty().id().get();
        let board = frame(2_000, vec![snapshot(1, 15, 0), snapshot(2, penalty, 0)]);
        assert_eq!(bot.choose(&board), Some(TargetId::new(2)));
    }

    #[test]
    fn rejects_probabilities_outside_unit_range() {
        let config = AutoplayConfig {
            accuracy: 1.2,
            ..AutoplayConfig::default()
        };
        assert!(Autoplayer::new(config, 0).is_err());
    }
}
