//! HTTP adapter for an external game server.
//!
//! Each emulator-backed game (StarCraft II, Pokemon Red, ...) runs as its own
//! server process on a local port. The server is expected to expose:
//! - `POST {base_url}/reset` -- body: `{"game": "<game id>"}`
//! - `POST {base_url}/step`  -- body: `{"action": <string | [strings]>}`
//!
//! Both return JSON matching [`ServerObservation`].

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing;

use super::traits::{Environment, ImageFrame, Observation, Outcome, Transition};
use crate::game::{Action, ActionSpace, Game, ScoreState};

/// The JSON shape returned by a game server.
#[derive(Debug, Deserialize)]
pub struct ServerObservation {
    pub obs_str: String,
    #[serde(default)]
    pub obs_image: Option<ImageFrame>,
    #[serde(default)]
    pub game_info: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub score_state: Option<ScoreState>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub outcome: Option<Outcome>,
}

impl ServerObservation {
    fn split(self) -> (Observation, Option<ScoreState>, bool, Option<Outcome>) {
        let observation = Observation {
            obs_str: self.obs_str,
            obs_image: self.obs_image,
            game_info: self.game_info,
        };
        (observation, self.score_state, self.done, self.outcome)
    }
}

/// A game environment served over HTTP.
#[derive(Debug)]
pub struct RemoteEnv {
    game: Game,
    base_url: String,
    http: reqwest::Client,
    action_space: ActionSpace,
    score: ScoreState,
    max_steps: usize,
    current_step: usize,
    done: bool,
}

impl RemoteEnv {
    pub fn new(game: Game, base_url: &str, max_steps: usize) -> Self {
        Self {
            game,
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            action_space: game.action_space(),
            score: ScoreState::baseline(game),
            max_steps,
            current_step: 0,
            done: false,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<ServerObservation> {
        let url = format!("{}/{path}", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("failed to reach {} server at {url}", self.game))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("{} server returned {status} on {path}: {text}", self.game);
        }

        resp.json()
            .await
            .with_context(|| format!("failed to parse {} {path} response", self.game))
    }

    /// Accept a score record only if it belongs to this game.
    fn accept_score(&mut self, score: Option<ScoreState>) -> Result<()> {
        if let Some(score) = score {
            if score.game() != self.game {
                anyhow::bail!(
                    "{} server reported a {} score record",
                    self.game,
                    score.game()
                );
            }
            self.score = score;
        }
        Ok(())
    }
}

impl Environment for RemoteEnv {
    async fn reset(&mut self) -> Result<Observation> {
        self.current_step = 0;
        self.done = false;
        self.score = ScoreState::baseline(self.game);

        let resp = self
            .post("reset", serde_json::json!({ "game": self.game }))
            .await?;
        let (observation, score, _, _) = resp.split();
        self.accept_score(score)?;

        tracing::debug!(game = %self.game, url = %self.base_url, "remote env reset");

        Ok(observation)
    }

    async fn step(&mut self, action: &Action) -> Result<Transition> {
        if self.done {
            anyhow::bail!("cannot step in a terminated episode");
        }

        self.current_step += 1;

        let resp = self
            .post("step", serde_json::json!({ "action": action }))
            .await?;
        let (observation, score, done, outcome) = resp.split();
        self.accept_score(score)?;

        let truncated = self.current_step >= self.max_steps;
        self.done = done || truncated;

        Ok(Transition {
            observation,
            score: self.score.clone(),
            done: self.done,
            outcome,
        })
    }

    fn game(&self) -> Game {
        self.game
    }

    fn action_space(&self) -> &ActionSpace {
        &self.action_space
    }

    fn score(&self) -> &ScoreState {
        &self.score
    }

    fn max_steps(&self) -> usize {
        self.max_steps
    }

    fn is_done(&self) -> bool {
        self.done
    }
}
