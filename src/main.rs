//! Orak: evaluate game-playing agents across the benchmark's games.
//!
//! Subcommands:
//!
//! - `run`      -- Evaluate the configured agent on the selected games
//! - `games`    -- List games with their budgets and action vocabularies
//! - `inspect`  -- Print a saved `game_results.json`

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use orak::config::{HarnessConfig, Provider};
use orak::evaluation::{Evaluation, GameReport, GameStatus};
use orak::game::{Arity, Game};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Orak: agent-environment evaluation harness
#[derive(Parser)]
#[command(name = "orak", version, about)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the configured agent on the selected games.
    Run {
        /// Path to a JSON configuration file (uses defaults if not provided).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Games to evaluate (default: every enabled game).
        #[arg(long, num_args = 1..)]
        games: Vec<Game>,

        /// Use the in-process and scripted backends instead of game servers.
        #[arg(long)]
        mock: bool,

        /// Episodes per game, overriding the configuration.
        #[arg(long)]
        episodes: Option<usize>,

        /// Directory for per-game results, overriding the configuration.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Chat model provider for every agent, overriding the configuration.
        #[arg(short = 'c', long, alias = "config-name")]
        provider: Option<Provider>,
    },

    /// List games with their budgets and action vocabularies.
    Games,

    /// Print a saved game_results.json.
    Inspect {
        /// Path to the results file.
        path: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialise tracing (reads RUST_LOG env var, defaults to info or debug).
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Run {
            config,
            games,
            mock,
            episodes,
            output,
            provider,
        } => cmd_run(config.as_deref(), &games, mock, episodes, output, provider).await,
        Commands::Games => {
            cmd_games();
            Ok(())
        }
        Commands::Inspect { path } => cmd_inspect(&path),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(
    config_path: Option<&Path>,
    games: &[Game],
    mock: bool,
    episodes: Option<usize>,
    output: Option<PathBuf>,
    provider: Option<Provider>,
) -> Result<()> {
    let mut config = HarnessConfig::load(config_path)?;
    if let Some(provider) = provider {
        config.set_provider(provider);
    }
    config.apply_env_overrides();
    if let Some(output) = output {
        config.output_dir = output;
    }

    let evaluation = Evaluation::new(config, mock);

    let cancel = evaluation.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping after the current step");
            cancel.cancel();
        }
    });

    let report = evaluation.run(games, episodes).await?;

    println!();
    println!("{:<22} {:>8} {:>8}  {}", "game", "score", "best", "status");
    for game in &report.games {
        println!(
            "{:<22} {:>8.2} {:>8.2}  {}",
            game.game.display_name(),
            game.score,
            game.best_score,
            status_label(&game.status)
        );
    }
    println!("{:<22} {:>8.2}", "total", report.total_score);

    Ok(())
}

fn cmd_games() {
    for game in Game::all() {
        let space = game.action_space();
        println!("{} ({})", game.display_name(), game);
        println!("  Task: {}", game.task());
        println!("  Step budget: {}", game.default_max_steps());
        println!("  Score: {}", game.score_formula());
        println!("  Server port: {}", game.default_port());
        match space.arity() {
            Arity::Single => println!("  Actions: 1 of {} per step", space.tokens().len()),
            Arity::Multi(n) => {
                println!("  Actions: exactly {n} of {} per step", space.tokens().len())
            }
        }
        println!("  Vocabulary: {}", space.tokens().join(", "));
        if !space.tools().is_empty() {
            println!("  Tools: {}", space.tools().join(", "));
        }
        println!("  No-op: {}", space.noop());
        println!();
    }
}

fn cmd_inspect(path: &Path) -> Result<()> {
    let report = GameReport::load(path)?;

    println!("Game results: {}", path.display());
    println!("  Game: {}", report.game.display_name());
    println!("  Status: {}", status_label(&report.status));
    println!("  Score: {:.2} (best {:.2})", report.score, report.best_score);
    println!("  Episodes: {}", report.episodes.len());
    println!();

    for (i, episode) in report.episodes.iter().enumerate() {
        println!("  [{i}] {}", episode.summary_line());
        println!(
            "      started {}",
            episode.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        for warning in episode.warnings.iter().take(5) {
            println!("      step {}: {}", warning.step, warning.message);
        }
        if episode.warnings.len() > 5 {
            println!("      ... and {} more warnings", episode.warnings.len() - 5);
        }
    }

    if let Some(agent) = &report.agent {
        println!();
        println!("Agent: {}", agent.model);
        println!("  Inference calls: {}", agent.total_inference_calls);
        println!(
            "  Tokens: {} (prompt {}, completion {})",
            agent.total_tokens, agent.total_input_tokens, agent.total_output_tokens
        );
        println!(
            "  Per episode: {:.1} calls, {:.1} tokens",
            agent.mean_calls_per_episode, agent.mean_tokens_per_episode
        );
    }

    Ok(())
}

fn status_label(status: &GameStatus) -> String {
    match status {
        GameStatus::Completed => "completed".into(),
        GameStatus::Cancelled => "cancelled".into(),
        GameStatus::Failed(reason) => format!("failed: {reason}"),
    }
}
