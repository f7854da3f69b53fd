#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Pool Tap session engine.
//!
//! This crate defines the message surface that connects the session
//! controller, the authoritative world, and pure systems. The controller
//! submits [`Command`] values describing inputs (clock ticks, taps, spawned
//! targets), the world executes those commands via its `apply` entry point,
//! and then broadcasts [`Event`] values for systems to react to
//! deterministically. Systems consume event streams and respond exclusively
//! with new command batches.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod catalog;

pub use catalog::{TargetCatalog, TargetVariant, VariantId};

/// Commands that express all permissible session mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the session clock by the provided delta time, firing every
    /// timer that falls due along the way.
    Tick {
        /// Duration of wall-clock time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Reports that the player tapped a target.
    Tap {
        /// Identifier of the tapped target.
        target: TargetId,
    },
    /// Requests that a freshly spawned target join the active set.
    AdmitTarget {
        /// Target produced by the spawner.
        target: ActiveTarget,
    },
    /// Completes an ending session once the score submission attempt finished.
    ConcludeSession {
        /// Result of the submission attempt.
        submission: SubmissionStatus,
    },
    /// Tears the session down immediately, for example when the player navigates away.
    Abandon,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Indicates that the session clock advanced.
    TimeAdvanced {
        /// Duration of time that elapsed in the tick.
        dt: Duration,
        /// Session-relative time after the tick.
        now: Duration,
    },
    /// Announces that the countdown lost one second.
    CountdownAdvanced {
        /// Whole seconds left on the countdown.
        remaining_seconds: u32,
    },
    /// Requests that the spawner produce one new target.
    SpawnRequested {
        /// Session-relative time at which the spawn tick fired.
        at: Duration,
    },
    /// Confirms that a target joined the active set.
    TargetAdmitted {
        /// Identifier of the admitted target.
        target: TargetId,
    },
    /// Reports that a spawned target could not join the active set.
    TargetAdmissionRejected {
        /// Identifier of the rejected target.
        target: TargetId,
        /// Specific reason the admission failed.
        reason: AdmissionError,
    },
    /// Confirms that a scoring target was hit and consumed.
    TargetHit {
        /// Identifier of the consumed target.
        target: TargetId,
        /// Variant of the consumed target.
        variant: VariantId,
        /// Experience granted after applying the multiplier.
        awarded: Experience,
    },
    /// Reports the combo state after a successful hit.
    ComboAdvanced {
        /// Combo counters after the hit was registered.
        combo: ComboSnapshot,
        /// Indicates whether the hit raised the multiplier.
        bumped: bool,
    },
    /// Reports that the combo counters returned to their base values.
    ComboReset {
        /// Cause of the reset.
        reason: ComboResetReason,
    },
    /// Confirms that the penalty target was tapped and the board was cleared.
    PenaltyTriggered {
        /// Identifier of the tapped penalty target.
        target: TargetId,
        /// Other targets forfeited by the explosion.
        forfeited: Vec<TargetId>,
        /// Change applied to experience by the penalty, zero unless deduction is enabled.
        experience_delta: Experience,
    },
    /// Announces that taps are suppressed until the explosion window closes.
    ExplosionStarted {
        /// Session-relative time at which normal play resumes.
        until: Duration,
    },
    /// Announces that the explosion window closed and play resumed.
    ExplosionEnded {
        /// Targets admitted during the window that were discarded.
        forfeited: Vec<TargetId>,
    },
    /// Reports targets removed by the expiry sweep.
    TargetsExpired {
        /// Identifiers of the expired targets in admission order.
        targets: Vec<TargetId>,
    },
    /// Reports the running experience total after any change.
    ExperienceChanged {
        /// Accumulated experience.
        experience: Experience,
        /// Score the session would submit if it ended now.
        provisional_score: FinalScore,
    },
    /// Reports that a tap had no effect.
    TapIgnored {
        /// Identifier supplied with the tap.
        target: TargetId,
        /// Reason the tap was ignored.
        reason: TapRejection,
    },
    /// Announces that the session entered a new phase.
    PhaseChanged {
        /// Phase that became active.
        phase: SessionPhase,
    },
    /// Terminal event emitted exactly once when the session reaches [`SessionPhase::Ended`].
    SessionEnded {
        /// Score derived from the accumulated experience.
        final_score: FinalScore,
        /// Result of the submission attempt.
        submission: SubmissionStatus,
    },
}

/// Unique identifier assigned to a spawned target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetId(u64);

impl TargetId {
    /// Creates a new target identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Target instance living on the board between its spawn and its hit or expiry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActiveTarget {
    /// Identifier unique among the active targets.
    pub id: TargetId,
    /// Catalog variant describing the target's point value.
    pub variant: TargetVariant,
    /// Normalized horizontal position across the playable width.
    pub horizontal_position: f32,
    /// Speed factor in `[1, 3)`; faster targets expire sooner.
    pub velocity_factor: f32,
    /// Session-relative time at which the target spawned.
    pub spawned_at: Duration,
}

impl ActiveTarget {
    /// Lifetime of the target derived from the base lifetime and its velocity.
    ///
    /// Non-positive or non-finite velocity factors fall back to the base lifetime.
    #[must_use]
    pub fn lifetime(&self, base_lifetime: Duration) -> Duration {
        if !self.velocity_factor.is_finite() || self.velocity_factor <= 0.0 {
            return base_lifetime;
        }
        base_lifetime.div_f64(f64::from(self.velocity_factor))
    }

    /// Time elapsed since the target spawned.
    #[must_use]
    pub fn age(&self, now: Duration) -> Duration {
        now.saturating_sub(self.spawned_at)
    }

    /// Reports whether the target's lifetime has fully elapsed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Duration, base_lifetime: Duration) -> bool {
        self.age(now) >= self.lifetime(base_lifetime)
    }

    /// Fraction of the lifetime still remaining, clamped to `[0, 1]`.
    #[must_use]
    pub fn remaining_fraction(&self, now: Duration, base_lifetime: Duration) -> f32 {
        let lifetime = self.lifetime(base_lifetime);
        if lifetime.is_zero() {
            return 0.0;
        }
        let consumed = self.age(now).as_secs_f64() / lifetime.as_secs_f64();
        (1.0 - consumed).clamp(0.0, 1.0) as f32
    }
}

/// Combo multiplier expressed in exact half steps between 1.0 and 3.0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Multiplier {
    half_steps: u8,
}

impl Multiplier {
    /// Multiplier applied when no combo is running.
    pub const BASE: Self = Self { half_steps: 2 };
    /// Highest multiplier reachable through combos.
    pub const MAX: Self = Self { half_steps: 6 };

    /// Number of half steps; `2` is 1.0x and `6` is 3.0x.
    #[must_use]
    pub const fn half_steps(self) -> u8 {
        self.half_steps
    }

    /// Multiplier raised by one half step, saturating at [`Multiplier::MAX`].
    #[must_use]
    pub const fn bumped(self) -> Self {
        if self.half_steps >= Self::MAX.half_steps {
            Self::MAX
        } else {
            Self {
                half_steps: self.half_steps + 1,
            }
        }
    }

    /// Floating point value of the multiplier.
    #[must_use]
    pub fn as_f32(self) -> f32 {
        f32::from(self.half_steps) / 2.0
    }

    /// Scales a point value, returning the exact experience it is worth.
    #[must_use]
    pub fn apply(self, points: i32) -> Experience {
        Experience::from_half_points(i64::from(points) * i64::from(self.half_steps))
    }
}

impl Default for Multiplier {
    fn default() -> Self {
        Self::BASE
    }
}

impl fmt::Display for Multiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}x", self.as_f32())
    }
}

/// Accumulated experience, tracked exactly in half points.
///
/// Half points arise when a 1.5x or 2.5x multiplier scales an odd point
/// value. Experience has no floor and may become negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Experience {
    half_points: i64,
}

impl Experience {
    /// Zero experience.
    pub const ZERO: Self = Self { half_points: 0 };

    /// Creates experience worth a whole number of points.
    #[must_use]
    pub const fn from_points(points: i64) -> Self {
        Self {
            half_points: points.saturating_mul(2),
        }
    }

    /// Creates experience from a raw half-point count.
    #[must_use]
    pub const fn from_half_points(half_points: i64) -> Self {
        Self { half_points }
    }

    /// Raw half-point count.
    #[must_use]
    pub const fn half_points(self) -> i64 {
        self.half_points
    }

    /// Floating point value of the experience for display.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        self.half_points as f64 / 2.0
    }

    /// Adds two experience values, saturating at the numeric bounds.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self {
            half_points: self.half_points.saturating_add(other.half_points),
        }
    }

    /// Converts experience into a score using floor division.
    ///
    /// Flooring rounds toward negative infinity, so `-50` experience with a
    /// divisor of `200` yields `-1`. A zero divisor is treated as one.
    #[must_use]
    pub fn final_score(self, experience_per_score: u32) -> FinalScore {
        let divisor = i64::from(experience_per_score.max(1)) * 2;
        FinalScore::new(self.half_points.div_euclid(divisor))
    }
}

impl fmt::Display for Experience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.half_points < 0 { "-" } else { "" };
        let magnitude = self.half_points.unsigned_abs();
        if magnitude % 2 == 0 {
            write!(f, "{sign}{}", magnitude / 2)
        } else {
            write!(f, "{sign}{}.5", magnitude / 2)
        }
    }
}

/// Score reported to the surrounding application at the end of a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinalScore(i64);

impl FinalScore {
    /// Creates a new score wrapper.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Retrieves the underlying score.
    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for FinalScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Consecutive-hit counters observed after a combo update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ComboSnapshot {
    /// Consecutive hits since the last reset.
    pub count: u32,
    /// Multiplier applied to the next hit.
    pub multiplier: Multiplier,
}

/// Reasons the combo counters were reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComboResetReason {
    /// The decay window elapsed without another hit.
    Decay,
    /// The penalty target was tapped.
    Penalty,
}

/// Lifecycle phases of a session. Transitions are strictly linear.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Countdown is running and taps are accepted.
    Running,
    /// Countdown reached zero; input is frozen while the score is submitted.
    Ending,
    /// Session is torn down; every timer is canceled.
    Ended,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Running => "running",
            Self::Ending => "ending",
            Self::Ended => "ended",
        };
        f.write_str(label)
    }
}

/// Reasons a tap may be ignored by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TapRejection {
    /// The session is no longer running.
    SessionNotRunning,
    /// The penalty explosion is still suppressing input.
    Exploding,
    /// No active target carries the identifier; it expired or was already consumed.
    UnknownTarget,
}

/// Reasons a spawned target may be refused admission to the active set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdmissionError {
    /// The session is no longer running.
    SessionNotRunning,
    /// A target with the same identifier is already active.
    DuplicateTarget,
}

/// Outcome of the end-of-session score submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// The remote service accepted the score.
    Recorded,
    /// No player identity was available, so nothing was sent.
    IdentityUnavailable,
    /// The remote write failed; the score was not recorded.
    RemoteFailed,
    /// Submission was not attempted.
    NotAttempted,
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Recorded => "recorded",
            Self::IdentityUnavailable => "identity unavailable",
            Self::RemoteFailed => "remote write failed",
            Self::NotAttempted => "not attempted",
        };
        f.write_str(label)
    }
}

/// Governs how tapping the penalty target affects experience.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyPolicy {
    /// Clear the board and reset the combo without touching experience.
    #[default]
    ClearBoard,
    /// Additionally deduct the penalty's point value scaled by the current multiplier.
    Deduct,
}

/// Timing and scoring parameters for a single session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Length of the countdown in whole seconds.
    pub duration_secs: u32,
    /// Period of the countdown cadence, which also drives spawning.
    pub countdown_interval_ms: u64,
    /// Period of the expiry sweep cadence.
    pub sweep_interval_ms: u64,
    /// Lifetime of a target moving at velocity factor 1.
    pub base_lifetime_ms: u64,
    /// Window after a hit before the combo decays.
    pub combo_window_ms: u64,
    /// Number of consecutive hits required for each multiplier bump.
    pub combo_step: u32,
    /// Duration of the penalty explosion during which taps are ignored.
    pub explosion_ms: u64,
    /// Experience required for one point of final score.
    pub experience_per_score: u32,
    /// Effect of the penalty target on experience.
    pub penalty_policy: PenaltyPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_secs: 120,
            countdown_interval_ms: 1_000,
            sweep_interval_ms: 1_000,
            base_lifetime_ms: 15_000,
            combo_window_ms: 2_000,
            combo_step: 5,
            explosion_ms: 1_000,
            experience_per_score: 200,
            penalty_policy: PenaltyPolicy::ClearBoard,
        }
    }
}

impl SessionConfig {
    /// Period of the countdown cadence.
    #[must_use]
    pub const fn countdown_interval(&self) -> Duration {
        Duration::from_millis(self.countdown_interval_ms)
    }

    /// Period of the expiry sweep cadence.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Lifetime of a target moving at velocity factor 1.
    #[must_use]
    pub const fn base_lifetime(&self) -> Duration {
        Duration::from_millis(self.base_lifetime_ms)
    }

    /// Window after a hit before the combo decays.
    #[must_use]
    pub const fn combo_window(&self) -> Duration {
        Duration::from_millis(self.combo_window_ms)
    }

    /// Duration of the penalty explosion.
    #[must_use]
    pub const fn explosion_window(&self) -> Duration {
        Duration::from_millis(self.explosion_ms)
    }

    /// Checks that every parameter describes a playable session.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("duration_secs", u64::from(self.duration_secs)),
            ("countdown_interval_ms", self.countdown_interval_ms),
            ("sweep_interval_ms", self.sweep_interval_ms),
            ("base_lifetime_ms", self.base_lifetime_ms),
            ("combo_window_ms", self.combo_window_ms),
            ("combo_step", u64::from(self.combo_step)),
            ("experience_per_score", u64::from(self.experience_per_score)),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::ZeroValue { field });
            }
        }
        Ok(())
    }
}

/// Errors raised when validating configuration.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// A parameter that must be positive was zero.
    #[error("`{field}` must be greater than zero")]
    ZeroValue {
        /// Name of the offending parameter.
        field: &'static str,
    },
    /// A parameter fell outside its permitted range.
    #[error("`{field}` is out of range: {reason}")]
    OutOfRange {
        /// Name of the offending parameter.
        field: &'static str,
        /// Human-readable description of the permitted range.
        reason: String,
    },
}

/// Immutable representation of a single active target used for presentation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetSnapshot {
    /// Identifier to supply when tapping the target.
    pub id: TargetId,
    /// Catalog variant of the target.
    pub variant: TargetVariant,
    /// Normalized horizontal position across the playable width.
    pub horizontal_position: f32,
    /// Session-relative time at which the target spawned.
    pub spawned_at: Duration,
    /// Fraction of the lifetime still remaining, for animation.
    pub remaining_fraction: f32,
}

/// Read-only snapshot describing all active targets.
#[derive(Clone, Debug, Default)]
pub struct TargetView {
    snapshots: Vec<TargetSnapshot>,
}

impl TargetView {
    /// Creates a new target view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<TargetSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured target snapshots in spawn order.
    pub fn iter(&self) -> std::slice::Iter<'_, TargetSnapshot> {
        self.snapshots.iter()
    }

    /// Number of active targets captured by the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the board is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<TargetSnapshot> {
        self.snapshots
    }
}

/// Everything the presentation layer needs to draw one frame.
#[derive(Clone, Debug)]
pub struct SessionFrame {
    /// Session-relative time of the frame.
    pub now: Duration,
    /// Current lifecycle phase.
    pub phase: SessionPhase,
    /// Whole seconds left on the countdown.
    pub remaining_seconds: u32,
    /// Accumulated experience.
    pub experience: Experience,
    /// Score the session would submit if it ended now.
    pub provisional_score: FinalScore,
    /// Current combo counters.
    pub combo: ComboSnapshot,
    /// Indicates whether the penalty explosion is suppressing input.
    pub exploding: bool,
    /// Active targets with their animation state.
    pub targets: TargetView,
}
