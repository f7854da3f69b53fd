#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that plays a Pool Tap session headlessly.

mod autoplay;
mod config;

use std::{path::PathBuf, time::Duration};

use anyhow::{ensure, Context, Result};
use clap::{Parser, ValueEnum};
use pool_tap_core::{Event, PenaltyPolicy, SessionPhase, SubmissionStatus};
use pool_tap_session::{Session, SessionSummary};
use pool_tap_submission::{HttpScoreSink, Identity, ScoreSubmitter};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

use crate::{autoplay::Autoplayer, config::Settings};

const MIN_FRAME_PERIOD: Duration = Duration::from_micros(100);

/// Plays one tap-target session with a seeded bot and reports the score.
#[derive(Parser, Debug)]
#[command(name = "pool-tap")]
#[command(about = "Headless Pool Tap session runner")]
struct Cli {
    /// TOML settings file with [session], [spawner], [submission] and [autoplay] tables
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for target spawning and the bot; random when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Wall-clock acceleration factor
    #[arg(long, default_value_t = 1.0)]
    speed: f64,

    /// Session time advanced per frame, in milliseconds
    #[arg(long, default_value_t = 50)]
    frame_ms: u64,

    /// Session length in seconds
    #[arg(long)]
    duration: Option<u32>,

    /// Username the score is submitted for
    #[arg(long)]
    username: Option<String>,

    /// Score endpoint, e.g. http://localhost:8080/api/save_score
    #[arg(long)]
    endpoint: Option<String>,

    /// Deduct the bad ball's points instead of only clearing the board
    #[arg(long)]
    deduct_penalty: bool,

    /// Per-frame probability that the bot hits a noticed target
    #[arg(long)]
    accuracy: Option<f64>,

    /// Output format for the summary
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct RunReport<'a> {
    seed: u64,
    username: Option<&'a str>,
    #[serde(flatten)]
    summary: &'a SessionSummary,
}

/// Entry point for the Pool Tap command-line interface.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    ensure!(
        cli.speed.is_finite() && cli.speed > 0.0,
        "--speed must be a positive number"
    );
    ensure!(cli.frame_ms > 0, "--frame-ms must be greater than zero");
    let step = Duration::from_millis(cli.frame_ms);
    let period = frame_period(step, cli.speed)?;

    let settings = apply_overrides(config::load(cli.config.as_deref())?, &cli);
    let seed = cli.seed.unwrap_or_else(rand::random);
    let identity = cli.username.as_deref().and_then(Identity::parse);

    let mut session = Session::new(settings.session.clone(), settings.spawner.clone(), seed)
        .context("invalid session settings")?;
    let mut player = Autoplayer::new(settings.autoplay.clone(), seed.wrapping_add(1))
        .context("invalid autoplay settings")?;

    let completed = play(&mut session, &mut player, step, period).await;

    let summary = if !completed {
        session.abandon()
    } else if let Some(sink) =
        HttpScoreSink::from_config(&settings.submission).context("failed to build score client")?
    {
        session
            .finish(&ScoreSubmitter::new(sink), identity.as_ref())
            .await?
    } else {
        tracing::info!("no score endpoint configured; skipping submission");
        session.conclude(SubmissionStatus::NotAttempted)?
    };

    print_summary(
        &RunReport {
            seed,
            username: identity.as_ref().map(Identity::as_str),
            summary: &summary,
        },
        cli.format,
    )
}

fn apply_overrides(mut settings: Settings, cli: &Cli) -> Settings {
    if let Some(duration) = cli.duration {
        settings.session.duration_secs = duration;
    }
    if cli.deduct_penalty {
        settings.session.penalty_policy = PenaltyPolicy::Deduct;
    }
    if let Some(endpoint) = &cli.endpoint {
        settings.submission.endpoint = Some(endpoint.clone());
    }
    if let Some(accuracy) = cli.accuracy {
        settings.autoplay.accuracy = accuracy;
    }
    settings
}

/// Wall-clock pacing of one frame of `step` session time at `speed`.
fn frame_period(step: Duration, speed: f64) -> Result<Duration> {
    let period = Duration::try_from_secs_f64(step.as_secs_f64() / speed)
        .with_context(|| format!("--speed {speed} gives an unrepresentable frame period"))?;
    Ok(period.max(MIN_FRAME_PERIOD))
}

/// Runs frames until the countdown elapses. Returns `false` when interrupted.
async fn play(
    session: &mut Session,
    player: &mut Autoplayer,
    step: Duration,
    period: Duration,
) -> bool {
    let mut frames = tokio::time::interval(period);
    frames.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    while session.phase() == SessionPhase::Running {
        tokio::select! {
            _ = frames.tick() => {}
            _ = &mut interrupt => {
                tracing::warn!("interrupted; abandoning session");
                return false;
            }
        }

        session.advance(step);
        if let Some(target) = player.choose(&session.frame()) {
            let resolution = session.tap(target);
            tracing::debug!(target_id = %target, ?resolution, "tap");
        }
        log_events(session);
    }
    true
}

fn log_events(session: &mut Session) {
    for event in session.drain_events() {
        match event {
            Event::CountdownAdvanced { remaining_seconds } => {
                let frame = session.frame();
                tracing::info!(
                    remaining_seconds,
                    experience = %frame.experience,
                    score = %frame.provisional_score,
                    multiplier = %frame.combo.multiplier,
                    combo = frame.combo.count,
                    targets = frame.targets.len(),
                    "tick"
                );
            }
            Event::PenaltyTriggered { forfeited, .. } => {
                tracing::info!(forfeited = forfeited.len(), "bad ball tapped; board cleared");
            }
            Event::ComboAdvanced { combo, bumped: true } => {
                tracing::info!(combo = combo.count, multiplier = %combo.multiplier, "combo");
            }
            _ => {}
        }
    }
}

fn print_summary(report: &RunReport<'_>, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json =
                serde_json::to_string_pretty(report).context("failed to serialize summary")?;
            println!("{json}");
        }
        OutputFormat::Text => {
            let summary = report.summary;
            let stats = summary.stats;
            println!(
                "final score {} ({} experience), seed {}",
                summary.final_score, summary.experience, report.seed
            );
            match &summary.submission_detail {
                Some(detail) => println!("submission: {} ({detail})", summary.submission),
                None => println!("submission: {}", summary.submission),
            }
            println!(
                "spawned {}, hits {}, penalties {}, expired {}, forfeited {}, best combo {}",
                stats.spawned,
                stats.hits,
                stats.penalties,
                stats.expired,
                stats.forfeited,
                stats.best_combo
            );
        }
    }
    Ok(())
}
