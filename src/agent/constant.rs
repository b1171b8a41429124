//! Baseline agent that ignores what it sees.

use super::Agent;
use crate::env::Observation;
use crate::error::AgentError;
use crate::game::Action;

/// Always answers the same action. Useful as a smoke test and as the
/// lower bound every real agent should beat.
#[derive(Debug, Clone)]
pub struct ConstantAgent {
    action: Action,
    calls: usize,
}

impl ConstantAgent {
    pub fn new(action: Action) -> Self {
        Self { action, calls: 0 }
    }

    /// Number of `act` calls since construction.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl Agent for ConstantAgent {
    fn name(&self) -> &str {
        "constant"
    }

    async fn act(&mut self, _observation: &Observation) -> Result<Action, AgentError> {
        self.calls += 1;
        Ok(self.action.clone())
    }
}
