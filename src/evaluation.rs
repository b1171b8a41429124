//! Multi-game evaluation.
//!
//! Runs the selected games one after another, writes
//! `<output_dir>/<game>/game_results.json` for each, and reports the total
//! score (the sum of per-game scores).
//!
//! Live games with a `server_command` get their server started before the
//! first episode and stopped after the last. A server that fails to start or
//! dies mid-game marks the game as failed and ends the evaluation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::agent::{build_agent, Agent, EvaluationSummary};
use crate::config::{GameConfig, HarnessConfig};
use crate::env::{AnyEnv, GameServer};
use crate::episode::{CancelFlag, EpisodeResult, Runner, TerminationReason};
use crate::game::Game;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// How a game's run ended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    #[default]
    Completed,
    Cancelled,
    /// The game server could not start or exited before shutdown.
    Failed(String),
}

/// Everything recorded for one game; the content of `game_results.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameReport {
    pub game: Game,
    #[serde(default)]
    pub status: GameStatus,
    /// Mean episode score.
    pub score: f64,
    pub best_score: f64,
    pub episodes: Vec<EpisodeResult>,
    /// Inference totals, for model-backed agents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<EvaluationSummary>,
}

impl GameReport {
    pub const FILE_NAME: &'static str = "game_results.json";

    pub fn new(game: Game, episodes: Vec<EpisodeResult>, agent: Option<EvaluationSummary>) -> Self {
        let scores: Vec<f64> = episodes.iter().map(|e| e.score).collect();
        let score = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };
        let best_score = scores.iter().copied().fold(0.0, f64::max);
        Self {
            game,
            status: GameStatus::Completed,
            score,
            best_score,
            episodes,
            agent,
        }
    }

    pub fn with_status(mut self, status: GameStatus) -> Self {
        self.status = status;
        self
    }

    /// Write `game_results.json` into `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(Self::FILE_NAME);
        let json = serde_json::to_string_pretty(self).context("Failed to serialize game results")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write game results to {}", path.display()))?;
        info!(game = %self.game, path = %path.display(), score = self.score, "saved game results");
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse game results from {}", path.display()))
    }
}

/// Results of a whole evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub games: Vec<GameReport>,
    pub total_score: f64,
}

impl EvaluationReport {
    pub fn new(games: Vec<GameReport>) -> Self {
        let total_score = games.iter().map(|g| g.score).sum();
        Self { games, total_score }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Runs configured games sequentially.
pub struct Evaluation {
    config: HarnessConfig,
    mock: bool,
    cancel: CancelFlag,
}

impl Evaluation {
    /// `mock` swaps game servers for the in-process and scripted backends.
    pub fn new(config: HarnessConfig, mock: bool) -> Self {
        Self {
            config,
            mock,
            cancel: CancelFlag::new(),
        }
    }

    /// Flag that stops the evaluation between steps when set.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Evaluate the enabled games (all of them when `only` is empty).
    ///
    /// `episodes` overrides every game's `max_episodes`. Configuration is
    /// validated before the first episode starts.
    pub async fn run(&self, only: &[Game], episodes: Option<usize>) -> Result<EvaluationReport> {
        self.config.validate(only)?;
        let selected = self.config.selected_games(only)?;

        info!(
            games = selected.len(),
            mock = self.mock,
            output = %self.config.output_dir.display(),
            "starting evaluation"
        );

        let mut reports = Vec::with_capacity(selected.len());
        for (game, game_config) in selected {
            let n = episodes.unwrap_or(game_config.max_episodes);
            let report = self.run_game(game, &game_config, n).await?;
            report.save(&self.game_dir(game))?;
            let failed = matches!(report.status, GameStatus::Failed(_));
            reports.push(report);
            if failed {
                warn!(%game, "game server failed; skipping remaining games");
                break;
            }
            if self.cancel.is_cancelled() {
                warn!("evaluation cancelled; skipping remaining games");
                break;
            }
        }

        let report = EvaluationReport::new(reports);
        info!(total_score = report.total_score, "evaluation finished");
        Ok(report)
    }

    /// Run `episodes` episodes of one game, starting and stopping its
    /// server when one is configured.
    pub async fn run_game(
        &self,
        game: Game,
        game_config: &GameConfig,
        episodes: usize,
    ) -> Result<GameReport> {
        let agent = build_agent(game, self.config.agent_for(game), &self.game_dir(game))
            .with_context(|| format!("Failed to build agent for {game}"))?;

        let mut server = match (&game_config.server_command, self.mock) {
            (Some(command), false) => {
                let launched = GameServer::launch(
                    game,
                    command,
                    game_config.server_port(game),
                    &self.game_dir(game),
                    &self.config.server,
                )
                .await;
                match launched {
                    Ok(server) => Some(server),
                    Err(e) => {
                        warn!(%game, error = %format!("{e:#}"), "game server failed to start");
                        return Ok(GameReport::new(game, Vec::new(), None)
                            .with_status(GameStatus::Failed(format!("{e:#}"))));
                    }
                }
            }
            _ => None,
        };

        let env = AnyEnv::for_game(game, game_config, self.mock);

        let mut runner = Runner::new(env, agent, self.config.runner.clone())
            .with_cancel_flag(self.cancel.clone());
        if let Some(task) = &game_config.task {
            runner = runner.with_task(task.as_str());
        }

        info!(%game, episodes, budget = runner.budget(), "evaluating game");
        let results = runner.run_episodes(episodes).await;

        let faults = results.iter().filter(|r| r.reason.is_fault()).count();
        if faults > 0 {
            warn!(%game, faults, "episodes ended on environment faults");
        }
        let cancelled = results
            .iter()
            .any(|r| r.reason == TerminationReason::Cancelled);
        if cancelled {
            warn!(%game, "game cancelled");
        }

        let mut status = if cancelled {
            GameStatus::Cancelled
        } else {
            GameStatus::Completed
        };
        if let Some(server) = server.as_mut() {
            if let Err(e) = server.check_alive() {
                warn!(%game, error = %e, "game server crashed during the run");
                status = GameStatus::Failed(e.to_string());
            }
        }
        if let Some(server) = server {
            if let Err(e) = server.shutdown().await {
                warn!(%game, error = %format!("{e:#}"), "failed to stop game server");
            }
        }

        let summary = runner.agent().summary(results.len());
        let report = GameReport::new(game, results, summary).with_status(status);
        info!(%game, score = report.score, best = report.best_score, status = ?report.status, "game finished");
        Ok(report)
    }

    fn game_dir(&self, game: Game) -> PathBuf {
        self.config.output_dir.join(game.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentConfig, AgentKind};

    fn temp_config() -> HarnessConfig {
        let mut config = HarnessConfig::default();
        config.output_dir = std::env::temp_dir().join(format!("orak-eval-{}", uuid::Uuid::new_v4()));
        config
    }

    #[tokio::test]
    async fn mock_evaluation_writes_results() {
        let config = temp_config();
        let out = config.output_dir.clone();
        let eval = Evaluation::new(config, true);

        let report = eval
            .run(&[Game::StreetFighter, Game::SuperMario], Some(1))
            .await
            .unwrap();

        assert_eq!(report.games.len(), 2);
        assert_eq!(report.games[0].game, Game::SuperMario);
        assert!((report.total_score - (40.0 + 15.82)).abs() < 0.01);

        let saved = GameReport::load(&out.join("street_fighter").join(GameReport::FILE_NAME)).unwrap();
        assert_eq!(saved.score, 40.0);
        assert_eq!(saved.episodes.len(), 1);
        assert_eq!(saved.episodes[0].reason, TerminationReason::Failure);
        assert!(saved.agent.is_none());

        std::fs::remove_dir_all(out).ok();
    }

    #[tokio::test]
    async fn configuration_errors_stop_before_any_episode() {
        let mut config = temp_config();
        config.agent = AgentConfig {
            kind: AgentKind::Llm,
            ..AgentConfig::default()
        };
        let out = config.output_dir.clone();
        let eval = Evaluation::new(config, true);

        let err = eval.run(&[Game::PokemonRed], Some(1)).await.unwrap_err();

        assert!(err.to_string().contains("API key"));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn cancelled_evaluation_stops_early() {
        let config = temp_config();
        let out = config.output_dir.clone();
        let eval = Evaluation::new(config, true);
        eval.cancel_flag().cancel();

        let report = eval.run(&[], Some(2)).await.unwrap();

        assert_eq!(report.games.len(), 1);
        assert_eq!(report.games[0].episodes.len(), 1);
        assert_eq!(report.games[0].episodes[0].reason, TerminationReason::Cancelled);
        std::fs::remove_dir_all(out).ok();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn crashed_server_fails_the_game_and_stops_the_evaluation() {
        let mut config = temp_config();
        config.server.startup_grace_ms = 100;
        let pokemon = config.games.get_mut("pokemon_red").unwrap();
        pokemon.server_command = Some(vec!["sh".into(), "-c".into(), "exit 3".into()]);
        let out = config.output_dir.clone();
        let eval = Evaluation::new(config, false);

        let report = eval
            .run(&[Game::PokemonRed, Game::StreetFighter], Some(1))
            .await
            .unwrap();

        assert_eq!(report.games.len(), 1);
        assert!(matches!(report.games[0].status, GameStatus::Failed(_)));
        assert!(report.games[0].episodes.is_empty());
        assert_eq!(report.total_score, 0.0);
        let dir = out.join("pokemon_red");
        assert!(dir.join(GameServer::LOG_FILE).exists());
        let saved = GameReport::load(&dir.join(GameReport::FILE_NAME)).unwrap();
        assert_eq!(saved.status, report.games[0].status);
        std::fs::remove_dir_all(out).ok();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn launched_server_is_stopped_after_the_game() {
        let mut config = temp_config();
        config.server.startup_grace_ms = 100;
        config.server.shutdown_timeout_ms = 1_000;
        let mario = config.games.get_mut("super_mario").unwrap();
        // Nothing answers HTTP on port 9, so every episode faults on reset.
        mario.server_url = Some("http://127.0.0.1:9".into());
        mario.server_command = Some(vec![
            "sh".into(),
            "-c".into(),
            "echo \"serving on $PORT\"; exec sleep 30".into(),
        ]);
        let out = config.output_dir.clone();
        let eval = Evaluation::new(config, false);

        let report = eval.run(&[Game::SuperMario], Some(2)).await.unwrap();

        let game = &report.games[0];
        assert_eq!(game.status, GameStatus::Completed);
        assert_eq!(game.episodes.len(), 2);
        assert!(game.episodes.iter().all(|e| e.reason.is_fault()));
        let log = std::fs::read_to_string(out.join("super_mario").join(GameServer::LOG_FILE)).unwrap();
        assert!(log.contains("serving on 9"));
        std::fs::remove_dir_all(out).ok();
    }

    #[test]
    fn report_means_and_best() {
        let report = GameReport::new(Game::StarCraft, Vec::new(), None);
        assert_eq!(report.score, 0.0);
        assert_eq!(report.best_score, 0.0);
        assert_eq!(report.status, GameStatus::Completed);
    }

    #[test]
    fn reports_without_status_load_as_completed() {
        let json = serde_json::json!({
            "game": "star_craft",
            "score": 0.0,
            "best_score": 0.0,
            "episodes": []
        });
        let report: GameReport = serde_json::from_value(json).unwrap();
        assert_eq!(report.status, GameStatus::Completed);
    }
}
