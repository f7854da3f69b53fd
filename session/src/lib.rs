#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Session controller that drives the world and the spawner for one play
//! session.
//!
//! Every input runs as one turn: the command is applied to the world, the
//! resulting events are handed to the spawner, and any commands it emits are
//! applied before control returns to the caller. Time advances from timer
//! deadline to timer deadline so each fire is its own turn and a spawned
//! target is on the board before the next timer runs.

use std::time::Duration;

use pool_tap_core::{
    ActiveTarget, AdmissionError, Command, ComboSnapshot, ConfigError, Event, Experience,
    FinalScore, SessionConfig, SessionFrame, SessionPhase, SubmissionStatus, TapRejection,
    TargetId,
};
use pool_tap_submission::{Identity, ScoreSink, ScoreSubmitter};
use pool_tap_system_spawning::{Config as SpawnerConfig, TargetSpawner};
use pool_tap_world::{self as world, query, World};
use serde::Serialize;
use thiserror::Error;

/// Errors returned when the controller is driven out of order.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    /// Configuration supplied to the session was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Completion was requested while the session was not waiting for it.
    #[error("session is {phase}, expected ending")]
    NotEnding {
        /// Phase the session was in.
        phase: SessionPhase,
    },
}

/// Effect of a single tap as observed by the player.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TapResolution {
    /// A scoring target was consumed.
    Hit {
        /// Experience granted for the hit.
        awarded: Experience,
        /// Combo counters after the hit.
        combo: ComboSnapshot,
    },
    /// The penalty target was tapped and the board was cleared.
    Penalty {
        /// Other targets lost to the explosion.
        forfeited: Vec<TargetId>,
    },
    /// The tap had no effect.
    Ignored(TapRejection),
}

/// Tallies gathered from the event stream over the whole session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Targets that joined the board.
    pub spawned: u32,
    /// Scoring targets consumed by taps.
    pub hits: u32,
    /// Penalty targets tapped.
    pub penalties: u32,
    /// Targets removed by the expiry sweep.
    pub expired: u32,
    /// Targets lost to penalty explosions.
    pub forfeited: u32,
    /// Taps that had no effect.
    pub ignored_taps: u32,
    /// Longest combo reached.
    pub best_combo: u32,
}

impl SessionStats {
    fn observe(&mut self, event: &Event) {
        match event {
            Event::TargetAdmitted { .. } => self.spawned += 1,
            Event::TargetHit { .. } => self.hits += 1,
            Event::PenaltyTriggered { forfeited, .. } => {
                self.penalties += 1;
                self.forfeited += count(forfeited);
            }
            Event::ExplosionEnded { forfeited } => self.forfeited += count(forfeited),
            Event::TargetsExpired { targets } => self.expired += count(targets),
            Event::ComboAdvanced { combo, .. } => {
                self.best_combo = self.best_combo.max(combo.count);
            }
            Event::TapIgnored { .. } => self.ignored_taps += 1,
            _ => {}
        }
    }
}

fn count(targets: &[TargetId]) -> u32 {
    u32::try_from(targets.len()).unwrap_or(u32::MAX)
}

/// Outcome of a finished session.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSummary {
    /// Score reported for the session.
    pub final_score: FinalScore,
    /// Accumulated experience.
    pub experience: f64,
    /// Result of the submission attempt.
    pub submission: SubmissionStatus,
    /// Error reported by the score service, if the write failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_detail: Option<String>,
    /// Event tallies over the session.
    pub stats: SessionStats,
}

/// One play session: the authoritative world plus the spawner that feeds it.
///
/// Every event is kept in the session journal until [`Session::drain_events`]
/// takes it, so hosts drain once per frame.
#[derive(Debug)]
pub struct Session {
    world: World,
    spawner: TargetSpawner,
    journal: Vec<Event>,
    stats: SessionStats,
    outcome: Option<SubmissionStatus>,
    submission_detail: Option<String>,
}

impl Session {
    /// Starts a session whose spawner rolls targets from `seed`.
    pub fn new(
        config: SessionConfig,
        spawner: SpawnerConfig,
        seed: u64,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let spawner = TargetSpawner::new(spawner, seed)?;
        tracing::info!(
            duration_secs = config.duration_secs,
            seed,
            "session started"
        );
        Ok(Self {
            world: World::new(config),
            spawner,
            journal: Vec::new(),
            stats: SessionStats::default(),
            outcome: None,
            submission_detail: None,
        })
    }

    /// Advances session time by `dt`, firing every timer that falls due.
    pub fn advance(&mut self, dt: Duration) {
        let target = query::now(&self.world).saturating_add(dt);
        loop {
            if query::phase(&self.world) == SessionPhase::Ended {
                return;
            }
            let now = query::now(&self.world);
            let step_to = match query::next_deadline(&self.world) {
                Some(deadline) if deadline < target => deadline.max(now),
                _ => target,
            };
            let _ = self.dispatch(Command::Tick {
                dt: step_to.saturating_sub(now),
            });
            if step_to >= target {
                return;
            }
        }
    }

    /// Resolves a tap on the target identified by `target`.
    pub fn tap(&mut self, target: TargetId) -> TapResolution {
        let start = self.dispatch(Command::Tap { target });
        let mut resolution = TapResolution::Ignored(TapRejection::UnknownTarget);
        for event in &self.journal[start..] {
            match event {
                Event::TargetHit { awarded, .. } => {
                    resolution = TapResolution::Hit {
                        awarded: *awarded,
                        combo: query::combo(&self.world),
                    };
                }
                Event::PenaltyTriggered { forfeited, .. } => {
                    resolution = TapResolution::Penalty {
                        forfeited: forfeited.clone(),
                    };
                }
                Event::TapIgnored { reason, .. } => {
                    tracing::debug!(target_id = %target, ?reason, "tap ignored");
                    resolution = TapResolution::Ignored(*reason);
                }
                _ => {}
            }
        }
        resolution
    }

    /// Places a scripted target on the board outside the spawner's schedule.
    pub fn admit(&mut self, target: ActiveTarget) -> Result<(), AdmissionError> {
        let start = self.dispatch(Command::AdmitTarget { target });
        let rejection = self.journal[start..].iter().find_map(|event| match event {
            Event::TargetAdmissionRejected { reason, .. } => Some(*reason),
            _ => None,
        });
        rejection.map_or(Ok(()), Err)
    }

    /// Completes an ending session with a submission result obtained elsewhere.
    pub fn conclude(&mut self, submission: SubmissionStatus) -> Result<SessionSummary, SessionError> {
        self.ensure_ending()?;
        let _ = self.dispatch(Command::ConcludeSession { submission });
        Ok(self.build_summary(submission))
    }

    /// Submits the final score through `submitter`, then completes the session.
    ///
    /// The session ends whatever the submission outcome.
    pub async fn finish<S: ScoreSink>(
        &mut self,
        submitter: &ScoreSubmitter<S>,
        identity: Option<&Identity>,
    ) -> Result<SessionSummary, SessionError> {
        self.ensure_ending()?;
        let report = submitter
            .submit(identity, query::final_score(&self.world))
            .await;
        self.submission_detail = report.detail;
        self.conclude(report.status)
    }

    /// Tears the session down from any phase without submitting.
    ///
    /// Returns the summary of the session, including one that already ended.
    pub fn abandon(&mut self) -> SessionSummary {
        if query::phase(&self.world) != SessionPhase::Ended {
            tracing::info!(phase = %query::phase(&self.world), "session abandoned");
            let _ = self.dispatch(Command::Abandon);
        }
        self.build_summary(self.outcome.unwrap_or(SubmissionStatus::NotAttempted))
    }

    /// Summary of the session once it has ended.
    #[must_use]
    pub fn summary(&self) -> Option<SessionSummary> {
        self.outcome.map(|outcome| self.build_summary(outcome))
    }

    /// Presentation snapshot of the current state.
    #[must_use]
    pub fn frame(&self) -> SessionFrame {
        query::frame(&self.world)
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        query::phase(&self.world)
    }

    /// Session-relative time.
    #[must_use]
    pub fn now(&self) -> Duration {
        query::now(&self.world)
    }

    /// Accumulated experience.
    #[must_use]
    pub fn experience(&self) -> Experience {
        query::experience(&self.world)
    }

    /// Score derived from the current experience.
    #[must_use]
    pub fn final_score(&self) -> FinalScore {
        query::final_score(&self.world)
    }

    /// Event tallies gathered so far.
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Read access to the underlying world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Removes and returns the events journaled since the previous drain.
    ///
    /// The journal is unbounded; an undrained session retains its whole history.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.journal)
    }

    fn ensure_ending(&self) -> Result<(), SessionError> {
        match query::phase(&self.world) {
            SessionPhase::Ending => Ok(()),
            phase => Err(SessionError::NotEnding { phase }),
        }
    }

    /// Runs one turn and returns the journal index of its first event.
    fn dispatch(&mut self, command: Command) -> usize {
        let start = self.journal.len();
        let mut pending = vec![command];
        let mut events = Vec::new();
        while let Some(command) = pending.pop() {
            world::apply(&mut self.world, command, &mut events);
            self.spawner.handle(&events, &mut pending);
            for event in &events {
                self.stats.observe(event);
                if let Event::SessionEnded {
                    final_score,
                    submission,
                } = event
                {
                    tracing::info!(%final_score, ?submission, "session ended");
                    self.outcome = Some(*submission);
                }
            }
            self.journal.append(&mut events);
        }
        start
    }

    fn build_summary(&self, submission: SubmissionStatus) -> SessionSummary {
        SessionSummary {
            final_score: query::final_score(&self.world),
            experience: query::experience(&self.world).as_f64(),
            submission,
            submission_detail: self.submission_detail.clone(),
            stats: self.stats,
        }
    }
}
