#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Seeded spawning system responsible for emitting target admission commands.

use std::time::Duration;

use pool_tap_core::{ActiveTarget, Command, ConfigError, Event, TargetCatalog, TargetId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Tuning parameters for the spawner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Probability that a spawn produces the penalty variant.
    pub penalty_probability: f64,
    /// Inclusive lower bound of the normalized horizontal position.
    pub position_min: f32,
    /// Exclusive upper bound of the normalized horizontal position.
    pub position_max: f32,
    /// Inclusive lower bound of the velocity factor.
    pub velocity_min: f32,
    /// Exclusive upper bound of the velocity factor.
    pub velocity_max: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            penalty_probability: 0.1,
            position_min: 0.05,
            position_max: 0.80,
            velocity_min: 1.0,
            velocity_max: 3.0,
        }
    }
}

impl Config {
    /// Checks that every range is non-empty and the probability is well formed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.penalty_probability) {
            return Err(ConfigError::OutOfRange {
                field: "penalty_probability",
                reason: format!("{} is not within [0, 1]", self.penalty_probability),
            });
        }
        if !(self.position_min >= 0.0
            && self.position_min < self.position_max
            && self.position_max <= 1.0)
        {
            return Err(ConfigError::OutOfRange {
                field: "position_min",
                reason: format!(
                    "band [{}, {}) must be a non-empty part of [0, 1]",
                    self.position_min, self.position_max
                ),
            });
        }
        if !(self.velocity_min > 0.0
            && self.velocity_min < self.velocity_max
            && self.velocity_max.is_finite())
        {
            return Err(ConfigError::OutOfRange {
                field: "velocity_min",
                reason: format!(
                    "range [{}, {}) must be non-empty and positive",
                    self.velocity_min, self.velocity_max
                ),
            });
        }
        Ok(())
    }
}

/// Pure system that turns spawn requests into freshly rolled targets.
///
/// Identifiers are allocated monotonically starting at one, so they stay
/// unique for the lifetime of a session.
#[derive(Debug)]
pub struct TargetSpawner {
    config: Config,
    rng: ChaCha8Rng,
    next_id: u64,
}

impl TargetSpawner {
    /// Creates a spawner whose random stream is derived from `seed`.
    pub fn new(config: Config, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_id: 1,
        })
    }

    /// Consumes events and emits one admission command per spawn request.
    pub fn handle(&mut self, events: &[Event], out: &mut Vec<Command>) {
        for event in events {
            if let Event::SpawnRequested { at } = event {
                let target = self.spawn_one(*at);
                out.push(Command::AdmitTarget { target });
            }
        }
    }

    /// Rolls a single target spawned at `at`.
    pub fn spawn_one(&mut self, at: Duration) -> ActiveTarget {
        let variant = if self.rng.gen_bool(self.config.penalty_probability) {
            TargetCatalog::penalty()
        } else {
            let positive = TargetCatalog::positive();
            positive[self.rng.gen_range(0..positive.len())]
        };
        let horizontal_position = self
            .rng
            .gen_range(self.config.position_min..self.config.position_max);
        let velocity_factor = self
            .rng
            .gen_range(self.config.velocity_min..self.config.velocity_max);

        let id = TargetId::new(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);

        ActiveTarget {
            id,
            variant,
            horizontal_position,
            velocity_factor,
            spawned_at: at,
        }
    }
}
