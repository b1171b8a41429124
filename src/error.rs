//! Error taxonomy for the evaluation harness.
//!
//! Gameplay-level failures are values the runner reacts to (drop, substitute,
//! terminate); only [`HarnessError::Configuration`] is fatal for the process.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the harness core.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The action is not in the game's vocabulary or has the wrong arity.
    #[error("invalid action for {game}: {reason}")]
    InvalidAction { game: String, reason: String },

    /// The agent did not answer within the per-step budget.
    #[error("agent did not produce an action within {0:?}")]
    AgentTimeout(Duration),

    /// The environment adapter could not produce a valid observation or step.
    #[error("environment fault: {0}")]
    EnvironmentFault(String),

    /// Missing credential, unknown game or unresolvable agent.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl HarnessError {
    pub fn invalid_action(game: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidAction {
            game: game.into(),
            reason: reason.into(),
        }
    }

    /// Wrap any adapter error (including its context chain) as a fault.
    pub fn environment(err: &anyhow::Error) -> Self {
        Self::EnvironmentFault(format!("{err:#}"))
    }
}

/// Errors an agent may signal from `act`.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent could not turn its output into a well-formed action.
    #[error("agent produced a malformed action: {0}")]
    InvalidActionFormat(String),

    /// The agent's backing model or service failed.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
