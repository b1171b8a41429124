//! Agents: anything that maps an [`Observation`] to an [`Action`].
//!
//! Agents are built from configuration by [`build_agent`] and handed to the
//! runner explicitly.
//!
//! Included agents:
//! - **Constant** ([`constant`]) -- always answers the same action.
//! - **LLM** ([`llm`]) -- asks an OpenAI-compatible chat model.

pub mod constant;
pub mod llm;
pub mod stats;

pub use constant::ConstantAgent;
pub use llm::LlmAgent;
pub use stats::{AgentStats, EvaluationSummary, RequestLog};

use std::path::Path;

use crate::config::{AgentConfig, AgentKind};
use crate::env::Observation;
use crate::episode::EpisodeResult;
use crate::error::AgentError;
use crate::game::{Action, Game};

/// The agent contract.
///
/// `act` is called exactly once per observation. `reset` is called before
/// every episode so that per-episode memory never leaks across episodes;
/// `on_episode_end` receives each finished episode and is the place for
/// anything an agent wants to carry over deliberately.
#[allow(async_fn_in_trait)]
pub trait Agent: Send {
    /// Short identifier for logs and reports.
    fn name(&self) -> &str;

    /// Choose the action for `observation`.
    async fn act(&mut self, observation: &Observation) -> Result<Action, AgentError>;

    /// Forget everything tied to the previous episode.
    fn reset(&mut self) {}

    /// Feedback after an episode ends, before the next `reset`.
    fn on_episode_end(&mut self, _result: &EpisodeResult) {}

    /// Inference totals over `episodes` episodes, for agents that call a model.
    fn summary(&self, _episodes: usize) -> Option<EvaluationSummary> {
        None
    }
}

// ---------------------------------------------------------------------------
// AnyAgent: enum dispatch wrapper for configured agents
// ---------------------------------------------------------------------------

/// An enum wrapper around all concrete agent types, enabling runtime
/// selection without `dyn` (which is incompatible with async trait methods).
pub enum AnyAgent {
    Constant(ConstantAgent),
    Llm(LlmAgent),
}

impl Agent for AnyAgent {
    fn name(&self) -> &str {
        match self {
            Self::Constant(a) => a.name(),
            Self::Llm(a) => a.name(),
        }
    }

    async fn act(&mut self, observation: &Observation) -> Result<Action, AgentError> {
        match self {
            Self::Constant(a) => a.act(observation).await,
            Self::Llm(a) => a.act(observation).await,
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Constant(a) => a.reset(),
            Self::Llm(a) => a.reset(),
        }
    }

    fn on_episode_end(&mut self, result: &EpisodeResult) {
        match self {
            Self::Constant(a) => a.on_episode_end(result),
            Self::Llm(a) => a.on_episode_end(result),
        }
    }

    fn summary(&self, episodes: usize) -> Option<EvaluationSummary> {
        match self {
            Self::Constant(a) => a.summary(episodes),
            Self::Llm(a) => a.summary(episodes),
        }
    }
}

/// Build the agent `config` describes for `game`.
///
/// `log_dir` receives `raw_requests.jsonl` when request logging is enabled.
pub fn build_agent(game: Game, config: &AgentConfig, log_dir: &Path) -> anyhow::Result<AnyAgent> {
    config.validate(game)?;
    let agent = match config.kind {
        AgentKind::Constant => {
            let action = config
                .constant_action
                .clone()
                .unwrap_or_else(|| game.action_space().noop().clone());
            tracing::info!(%game, action = %action, "using constant agent");
            AnyAgent::Constant(ConstantAgent::new(action))
        }
        AgentKind::Llm => {
            let mut agent = LlmAgent::new(game, config)?;
            if config.log_requests {
                let log = RequestLog::in_dir(log_dir)?;
                tracing::info!(%game, path = %log.path().display(), "logging raw requests");
                agent = agent.with_request_log(log);
            }
            tracing::info!(%game, provider = %config.provider, model = config.model_name(), "using llm agent");
            AnyAgent::Llm(agent)
        }
    };
    Ok(agent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn constant_agent_defaults_to_noop() {
        let dir = std::env::temp_dir();
        let mut agent = build_agent(Game::StarCraft, &AgentConfig::default(), &dir).unwrap();
        let action = agent.act(&Observation::text("")).await.unwrap();
        assert_eq!(&action, Game::StarCraft.action_space().noop());
        assert_eq!(action.len(), 5);
        assert!(agent.summary(3).is_none());
    }

    #[test]
    fn llm_agent_needs_credentials() {
        let config = AgentConfig {
            kind: AgentKind::Llm,
            ..AgentConfig::default()
        };
        assert!(build_agent(Game::PokemonRed, &config, &std::env::temp_dir()).is_err());
    }

    #[test]
    fn llm_agent_reports_summary() {
        let config = AgentConfig {
            kind: AgentKind::Llm,
            api_key: "sk-test".into(),
            ..AgentConfig::default()
        };
        let agent = build_agent(Game::SuperMario, &config, &std::env::temp_dir()).unwrap();
        assert_eq!(agent.name(), "gpt-5-nano");
        let summary = agent.summary(3).unwrap();
        assert_eq!(summary.total_inference_calls, 0);
        assert_eq!(summary.evaluation_episodes, 3);
    }
}
