//! Core environment trait and shared types.
//!
//! Every game backend (scripted, simulated or a remote game server)
//! implements the [`Environment`] trait so that the runner can drive
//! episodes uniformly.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::game::{Action, ActionSpace, Game, ScoreState};

/// A raw pixel buffer rendered by the game.
///
/// Pixels are shared, so cloning an [`Observation`] never copies the frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
    /// Bytes per pixel (3 for RGB, 4 for RGBA).
    pub channels: u8,
    pub pixels: Arc<[u8]>,
}

impl ImageFrame {
    /// Build a frame, checking that the buffer matches the dimensions.
    pub fn new(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> anyhow::Result<Self> {
        let expected = width as usize * height as usize * channels as usize;
        if pixels.len() != expected {
            anyhow::bail!(
                "image buffer has {} bytes, expected {expected} for {width}x{height}x{channels}",
                pixels.len()
            );
        }
        Ok(Self {
            width,
            height,
            channels,
            pixels: pixels.into(),
        })
    }
}

/// The snapshot of game state handed to the agent each step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Structured text summary of the game state.
    pub obs_str: String,
    /// The rendered frame, for games that provide one.
    #[serde(default)]
    pub obs_image: Option<ImageFrame>,
    /// Game-specific auxiliary data (action dictionaries, races, tool lists).
    #[serde(default)]
    pub game_info: serde_json::Map<String, serde_json::Value>,
}

impl Observation {
    pub fn text(obs_str: impl Into<String>) -> Self {
        Self {
            obs_str: obs_str.into(),
            ..Self::default()
        }
    }

    pub fn with_info(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.game_info.insert(key.to_string(), value.into());
        self
    }

    pub fn with_image(mut self, frame: ImageFrame) -> Self {
        self.obs_image = Some(frame);
        self
    }

    pub fn info_str(&self, key: &str) -> Option<&str> {
        self.game_info.get(key).and_then(|v| v.as_str())
    }
}

/// How the game itself decided an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

/// The result of applying one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub observation: Observation,
    pub score: ScoreState,
    /// No further `step` is valid until the next `reset`.
    pub done: bool,
    /// Set when the game ended the episode on a win or loss.
    #[serde(default)]
    pub outcome: Option<Outcome>,
}

/// The environment adapter contract.
///
/// `reset` starts a fresh episode from the game's baseline score (calling it
/// again discards the previous episode). `step` applies an action that has
/// already been validated against [`Environment::action_space`] and advances
/// one logical step, which may span many emulator frames.
#[allow(async_fn_in_trait)]
pub trait Environment: Send + Sync {
    /// Start a new episode and return its first observation.
    async fn reset(&mut self) -> anyhow::Result<Observation>;

    /// Apply `action` and return the next observation and score.
    async fn step(&mut self, action: &Action) -> anyhow::Result<Transition>;

    fn game(&self) -> Game;

    fn action_space(&self) -> &ActionSpace;

    /// The current episode's progress.
    fn score(&self) -> &ScoreState;

    /// The step budget the backend was configured with.
    fn max_steps(&self) -> usize;

    fn is_done(&self) -> bool;
}
