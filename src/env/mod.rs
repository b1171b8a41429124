//! Environment adapters.
//!
//! Every backend implements the [`Environment`] trait so that the runner can
//! interact with it uniformly.
//!
//! Included backends:
//! - **Scripted** ([`scripted`]) -- deterministic replays of canned score
//!   progressions, one default script per game.
//! - **2048** ([`twenty_forty_eight`]) -- a full in-process simulation.
//! - **Remote** ([`remote`]) -- a game server reached over HTTP, optionally
//!   started and stopped by [`server::GameServer`].

pub mod remote;
pub mod scripted;
pub mod server;
pub mod traits;
pub mod twenty_forty_eight;

pub use remote::RemoteEnv;
pub use scripted::{ScriptedEnv, ScriptedStep};
pub use server::GameServer;
pub use traits::{Environment, ImageFrame, Observation, Outcome, Transition};
pub use twenty_forty_eight::TwentyFortyEightEnv;

use crate::config::GameConfig;
use crate::game::{Action, ActionSpace, Game, ScoreState};

// ---------------------------------------------------------------------------
// AnyEnv: enum dispatch wrapper for dynamic environment selection
// ---------------------------------------------------------------------------

/// An enum wrapper around all concrete environment types, enabling runtime
/// backend selection without `dyn` (which is incompatible with async trait
/// methods).
pub enum AnyEnv {
    Scripted(ScriptedEnv),
    TwentyFortyEight(TwentyFortyEightEnv),
    Remote(RemoteEnv),
}

impl AnyEnv {
    /// Pick the backend for `game`.
    ///
    /// Mock runs use the in-process 2048 simulation and scripted replays for
    /// the emulator-backed games; live runs talk to the configured server.
    pub fn for_game(game: Game, config: &GameConfig, mock: bool) -> Self {
        let max_steps = config.max_steps.unwrap_or_else(|| game.default_max_steps());
        match (game, mock) {
            (Game::TwentyFortyEight, true) => {
                tracing::info!(%game, "using in-process 2048 simulation");
                Self::TwentyFortyEight(TwentyFortyEightEnv::new(config.seed, max_steps))
            }
            (_, true) => {
                tracing::info!(%game, "using scripted environment");
                Self::Scripted(ScriptedEnv::for_game(game).with_max_steps(max_steps))
            }
            (_, false) => {
                let env = RemoteEnv::new(game, &config.resolved_server_url(game), max_steps);
                tracing::info!(%game, url = %env.base_url(), "using remote game server");
                Self::Remote(env)
            }
        }
    }
}

impl Environment for AnyEnv {
    async fn reset(&mut self) -> anyhow::Result<Observation> {
        match self {
            Self::Scripted(e) => e.reset().await,
            Self::TwentyFortyEight(e) => e.reset().await,
            Self::Remote(e) => e.reset().await,
        }
    }

    async fn step(&mut self, action: &Action) -> anyhow::Result<Transition> {
        match self {
            Self::Scripted(e) => e.step(action).await,
            Self::TwentyFortyEight(e) => e.step(action).await,
            Self::Remote(e) => e.step(action).await,
        }
    }

    fn game(&self) -> Game {
        match self {
            Self::Scripted(e) => e.game(),
            Self::TwentyFortyEight(e) => e.game(),
            Self::Remote(e) => e.game(),
        }
    }

    fn action_space(&self) -> &ActionSpace {
        match self {
            Self::Scripted(e) => e.action_space(),
            Self::TwentyFortyEight(e) => e.action_space(),
            Self::Remote(e) => e.action_space(),
        }
    }

    fn score(&self) -> &ScoreState {
        match self {
            Self::Scripted(e) => e.score(),
            Self::TwentyFortyEight(e) => e.score(),
            Self::Remote(e) => e.score(),
        }
    }

    fn max_steps(&self) -> usize {
        match self {
            Self::Scripted(e) => e.max_steps(),
            Self::TwentyFortyEight(e) => e.max_steps(),
            Self::Remote(e) => e.max_steps(),
        }
    }

    fn is_done(&self) -> bool {
        match self {
            Self::Scripted(e) => e.is_done(),
            Self::TwentyFortyEight(e) => e.is_done(),
            Self::Remote(e) => e.is_done(),
        }
    }
}
