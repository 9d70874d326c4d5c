//! Runs an orbit session without a window and records the final score.
//!
//! Usage: `orbit-headless [CONFIG.json] [--seconds N] [--save FILE]`

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use orbit_core::storage::{self, DEFAULT_SAVE_FILE};
use orbit_core::{HighScores, SessionPhase, SimConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Fixed frame length in seconds.
const TIME_STEP: f64 = 0.005;

#[derive(Parser, Debug)]
#[command(about = "Run an orbit session without a window")]
struct Args {
    /// Scenario JSON; the built-in scenario when omitted.
    config: Option<PathBuf>,
    /// Simulated seconds to run.
    #[arg(long, default_value_t = 10.0)]
    seconds: f64,
    /// High-score file.
    #[arg(long = "save", default_value = DEFAULT_SAVE_FILE)]
    save_file: PathBuf,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SimConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SimConfig::default(),
    };

    let mut scores = match storage::load_high_scores(&args.save_file)? {
        Some(scores) => scores,
        None => {
            tracing::info!("starting with an empty high-score table");
            HighScores::new()
        }
    };

    let mut sim = config.build(0.0)?;
    sim.toggle_pause(0.0);

    let frames = (args.seconds.max(0.0) / TIME_STEP) as u64;
    tracing::info!(frames, "running simulation");
    for frame in 1..=frames {
        sim.advance(TIME_STEP as f32, frame as f64 * TIME_STEP);
        if sim.phase() != SessionPhase::Running {
            break;
        }
    }

    let score = match sim.phase() {
        SessionPhase::GameOver { score } => score,
        SessionPhase::Running => sim.score(),
    };
    tracing::info!(score, time_remaining = sim.time_remaining(), "session finished");

    if let Some(rank) = scores.insert(score) {
        tracing::info!(rank = rank + 1, score, "new high score");
    }
    storage::save_high_scores(&args.save_file, &scores)
        .with_context(|| format!("writing {}", args.save_file.display()))?;
    Ok(())
}
