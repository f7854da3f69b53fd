#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative session state management for Pool Tap.
//!
//! The world owns every timer of a session (countdown cadence, sweep
//! cadence, combo decay slot, explosion slot) and fires them in deadline
//! order while processing [`Command::Tick`]. Each call to [`apply`] runs to
//! completion before the next command is processed, so a tap and a timer
//! callback never observe each other half-applied.

mod clock;
mod combo;
mod targets;
mod timer;

use std::time::Duration;

use pool_tap_core::{
    ActiveTarget, AdmissionError, ComboResetReason, Command, Event, Experience, FinalScore,
    PenaltyPolicy, SessionConfig, SessionPhase, SubmissionStatus, TapRejection, TargetId,
};

use crate::{clock::SessionClock, combo::ComboEngine, targets::ActiveTargets, timer::TimerSlot};

/// Timer kinds in the order they fire when due at the same instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum TimerSource {
    Countdown,
    Sweep,
    Explosion,
    ComboDecay,
}

/// Represents the authoritative state of one tap session.
#[derive(Debug)]
pub struct World {
    config: SessionConfig,
    now: Duration,
    phase: SessionPhase,
    experience: Experience,
    clock: SessionClock,
    targets: ActiveTargets,
    combo: ComboEngine,
    explosion: TimerSlot,
}

impl World {
    /// Creates a running session whose cadences start immediately.
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        let now = Duration::ZERO;
        Self {
            clock: SessionClock::started(&config, now),
            combo: ComboEngine::new(config.combo_step, config.combo_window()),
            targets: ActiveTargets::new(),
            explosion: TimerSlot::new(),
            experience: Experience::ZERO,
            phase: SessionPhase::Running,
            now,
            config,
        }
    }

    fn next_due(&self, limit: Duration) -> Option<(Duration, TimerSource)> {
        [
            (self.clock.countdown_deadline(), TimerSource::Countdown),
            (self.clock.sweep_deadline(), TimerSource::Sweep),
            (self.explosion.deadline(), TimerSource::Explosion),
            (self.combo.decay_deadline(), TimerSource::ComboDecay),
        ]
        .into_iter()
        .filter_map(|(deadline, source)| {
            deadline
                .filter(|deadline| *deadline <= limit)
                .map(|deadline| (deadline, source))
        })
        .min()
    }

    fn advance_to(&mut self, target: Duration, out_events: &mut Vec<Event>) {
        while let Some((deadline, source)) = self.next_due(target) {
            self.now = self.now.max(deadline);
            self.fire(source, out_events);
        }
        self.now = self.now.max(target);
    }

    fn fire(&mut self, source: TimerSource, out_events: &mut Vec<Event>) {
        match source {
            TimerSource::Countdown => self.fire_countdown(out_events),
            TimerSource::Sweep => {
                if !self.clock.fire_sweep(self.now) {
                    return;
                }
                let expired = self
                    .targets
                    .sweep_expired(self.now, self.config.base_lifetime());
                if !expired.is_empty() {
                    out_events.push(Event::TargetsExpired {
                        targets: expired.into_iter().map(|target| target.id).collect(),
                    });
                }
            }
            TimerSource::Explosion => {
                if !self.explosion.take_due(self.now) {
                    return;
                }
                let forfeited = self
                    .targets
                    .clear()
                    .into_iter()
                    .map(|target| target.id)
                    .collect();
                out_events.push(Event::ExplosionEnded { forfeited });
            }
            TimerSource::ComboDecay => {
                if self.combo.fire_decay(self.now) {
                    out_events.push(Event::ComboReset {
                        reason: ComboResetReason::Decay,
                    });
                }
            }
        }
    }

    fn fire_countdown(&mut self, out_events: &mut Vec<Event>) {
        let Some(remaining_seconds) = self.clock.fire_countdown(self.now) else {
            return;
        };
        out_events.push(Event::CountdownAdvanced { remaining_seconds });

        if self.phase != SessionPhase::Running {
            return;
        }

        if remaining_seconds > 0 {
            out_events.push(Event::SpawnRequested { at: self.now });
        } else {
            self.phase = SessionPhase::Ending;
            tracing::debug!(
                experience = %self.experience,
                final_score = %self.final_score(),
                "countdown elapsed; freezing input"
            );
            out_events.push(Event::PhaseChanged {
                phase: SessionPhase::Ending,
            });
        }
    }

    fn resolve_tap(&mut self, target_id: TargetId, out_events: &mut Vec<Event>) {
        let rejection = if self.phase != SessionPhase::Running {
            Some(TapRejection::SessionNotRunning)
        } else if self.explosion.is_armed() {
            Some(TapRejection::Exploding)
        } else {
            None
        };
        if let Some(reason) = rejection {
            out_events.push(Event::TapIgnored {
                target: target_id,
                reason,
            });
            return;
        }

        let Some(target) = self.targets.get(target_id).copied() else {
            out_events.push(Event::TapIgnored {
                target: target_id,
                reason: TapRejection::UnknownTarget,
            });
            return;
        };

        if target.variant.is_penalty() {
            self.trigger_penalty(target, out_events);
        } else {
            self.score_hit(target, out_events);
        }
    }

    fn score_hit(&mut self, target: ActiveTarget, out_events: &mut Vec<Event>) {
        let awarded = self
            .combo
            .current_multiplier()
            .apply(target.variant.point_value());
        let _ = self.targets.remove(target.id);
        out_events.push(Event::TargetHit {
            target: target.id,
            variant: target.variant.id(),
            awarded,
        });
        self.add_experience(awarded, out_events);

        let (combo, bumped) = self.combo.register_hit(self.now);
        out_events.push(Event::ComboAdvanced { combo, bumped });
    }

    fn trigger_penalty(&mut self, target: ActiveTarget, out_events: &mut Vec<Event>) {
        let experience_delta = match self.config.penalty_policy {
            PenaltyPolicy::ClearBoard => Experience::ZERO,
            PenaltyPolicy::Deduct => self
                .combo
                .current_multiplier()
                .apply(target.variant.point_value()),
        };

        let forfeited: Vec<TargetId> = self
            .targets
            .clear()
            .into_iter()
            .map(|cleared| cleared.id)
            .filter(|id| *id != target.id)
            .collect();
        self.combo.register_penalty();
        let until = self.now.saturating_add(self.config.explosion_window());
        self.explosion.arm(until);

        tracing::debug!(
            target_id = %target.id,
            forfeited = forfeited.len(),
            "penalty target tapped; board cleared"
        );
        out_events.push(Event::PenaltyTriggered {
            target: target.id,
            forfeited,
            experience_delta,
        });
        if experience_delta != Experience::ZERO {
            self.add_experience(experience_delta, out_events);
        }
        out_events.push(Event::ComboReset {
            reason: ComboResetReason::Penalty,
        });
        out_events.push(Event::ExplosionStarted { until });
    }

    fn add_experience(&mut self, delta: Experience, out_events: &mut Vec<Event>) {
        self.experience = self.experience.saturating_add(delta);
        out_events.push(Event::ExperienceChanged {
            experience: self.experience,
            provisional_score: self.final_score(),
        });
    }

    fn admit(&mut self, target: ActiveTarget, out_events: &mut Vec<Event>) {
        let result = if self.phase == SessionPhase::Running {
            self.targets.admit(target)
        } else {
            Err(AdmissionError::SessionNotRunning)
        };
        match result {
            Ok(()) => out_events.push(Event::TargetAdmitted { target: target.id }),
            Err(reason) => out_events.push(Event::TargetAdmissionRejected {
                target: target.id,
                reason,
            }),
        }
    }

    fn end(&mut self, submission: SubmissionStatus, out_events: &mut Vec<Event>) {
        self.clock.cancel_all();
        self.combo.cancel_decay();
        self.explosion.cancel();
        let _ = self.targets.clear();
        self.phase = SessionPhase::Ended;

        let final_score = self.final_score();
        tracing::debug!(%final_score, ?submission, "session ended");
        out_events.push(Event::PhaseChanged {
            phase: SessionPhase::Ended,
        });
        out_events.push(Event::SessionEnded {
            final_score,
            submission,
        });
    }

    fn final_score(&self) -> FinalScore {
        self.experience
            .final_score(self.config.experience_per_score)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => {
            if world.phase == SessionPhase::Ended {
                return;
            }
            let target = world.now.saturating_add(dt);
            world.advance_to(target, out_events);
            out_events.push(Event::TimeAdvanced {
                dt,
                now: world.now,
            });
        }
        Command::Tap { target } => world.resolve_tap(target, out_events),
        Command::AdmitTarget { target } => world.admit(target, out_events),
        Command::ConcludeSession { submission } => {
            if world.phase == SessionPhase::Ending {
                world.end(submission, out_events);
            } else {
                tracing::warn!(phase = %world.phase, "conclude ignored outside the ending phase");
            }
        }
        Command::Abandon => {
            if world.phase != SessionPhase::Ended {
                world.end(SubmissionStatus::NotAttempted, out_events);
            }
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use pool_tap_core::{
        ActiveTarget, ComboSnapshot, Experience, FinalScore, Multiplier, SessionConfig,
        SessionFrame, SessionPhase, TargetId, TargetSnapshot, TargetView,
    };

    use super::World;

    /// Configuration the session was created with.
    #[must_use]
    pub fn config(world: &World) -> &SessionConfig {
        &world.config
    }

    /// Session-relative time of the most recent tick.
    #[must_use]
    pub fn now(world: &World) -> Duration {
        world.now
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(world: &World) -> SessionPhase {
        world.phase
    }

    /// Whole seconds left on the countdown.
    #[must_use]
    pub fn remaining_seconds(world: &World) -> u32 {
        world.clock.remaining_seconds()
    }

    /// Accumulated experience.
    #[must_use]
    pub fn experience(world: &World) -> Experience {
        world.experience
    }

    /// Score derived from the accumulated experience.
    #[must_use]
    pub fn final_score(world: &World) -> FinalScore {
        world.final_score()
    }

    /// Current combo counters.
    #[must_use]
    pub fn combo(world: &World) -> ComboSnapshot {
        world.combo.snapshot()
    }

    /// Multiplier that the next scoring hit will receive.
    #[must_use]
    pub fn multiplier(world: &World) -> Multiplier {
        world.combo.current_multiplier()
    }

    /// Reports whether the penalty explosion is suppressing taps.
    #[must_use]
    pub fn is_exploding(world: &World) -> bool {
        world.explosion.is_armed()
    }

    /// Earliest pending timer deadline, if any timer is armed.
    #[must_use]
    pub fn next_deadline(world: &World) -> Option<Duration> {
        world.next_due(Duration::MAX).map(|(deadline, _)| deadline)
    }

    /// Retrieves an active target by identifier.
    #[must_use]
    pub fn target(world: &World, id: TargetId) -> Option<ActiveTarget> {
        world.targets.get(id).copied()
    }

    /// Captures the active targets together with their animation state.
    #[must_use]
    pub fn target_view(world: &World) -> TargetView {
        let base_lifetime = world.config.base_lifetime();
        let snapshots = world
            .targets
            .iter()
            .map(|target| TargetSnapshot {
                id: target.id,
                variant: target.variant,
                horizontal_position: target.horizontal_position,
                spawned_at: target.spawned_at,
                remaining_fraction: target.remaining_fraction(world.now, base_lifetime),
            })
            .collect();
        TargetView::from_snapshots(snapshots)
    }

    /// Captures everything the presentation layer draws for one frame.
    #[must_use]
    pub fn frame(world: &World) -> SessionFrame {
        SessionFrame {
            now: world.now,
            phase: world.phase,
            remaining_seconds: remaining_seconds(world),
            experience: world.experience,
            provisional_score: world.final_score(),
            combo: combo(world),
            exploding: is_exploding(world),
            targets: target_view(world),
        }
    }
}
