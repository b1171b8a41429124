//! Episode result types.
//!
//! An [`EpisodeResult`] is produced once per episode by the runner and never
//! modified afterwards. It is what gets written to `game_results.json`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game::{Action, Game, ScoreState};

// ---------------------------------------------------------------------------
// Termination
// ---------------------------------------------------------------------------

/// Why an episode stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The game ended on a win.
    Success,
    /// The game ended on a loss.
    Failure,
    StepBudgetExhausted,
    /// More consecutive invalid actions than the configured tolerance.
    InvalidActionLimit,
    Cancelled,
    /// The environment could not reset or step; carries the error chain.
    EnvironmentFault(String),
}

impl TerminationReason {
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::EnvironmentFault(_))
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::StepBudgetExhausted => write!(f, "step budget exhausted"),
            Self::InvalidActionLimit => write!(f, "invalid action limit"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::EnvironmentFault(msg) => write!(f, "environment fault: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    AgentTimeout,
    AgentError,
}

/// A recoverable agent failure; the no-op action was played instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Exchange number (1-based) the warning belongs to.
    pub step: usize,
    pub kind: WarningKind,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Per-step record
// ---------------------------------------------------------------------------

/// One observation/action exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Exchange number, starting at 1.
    pub index: usize,
    /// What the agent answered; `None` after a timeout or agent error.
    pub proposed: Option<Action>,
    /// What reached the environment; `None` when the action was dropped.
    pub applied: Option<Action>,
    /// Validation error for a dropped action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection: Option<String>,
    /// Score after the exchange.
    pub score: f64,
}

// ---------------------------------------------------------------------------
// Episode result
// ---------------------------------------------------------------------------

/// The immutable record of one episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeResult {
    /// Unique identifier (UUID v4).
    pub id: String,
    pub game: Game,
    pub score_state: ScoreState,
    pub score: f64,
    pub reason: TerminationReason,
    /// Number of `act` calls (one per observation handed to the agent).
    pub exchanges: usize,
    /// Number of actions forwarded to the environment.
    pub applied_actions: usize,
    pub invalid_actions: usize,
    pub warnings: Vec<Warning>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records: Vec<StepRecord>,
}

impl EpisodeResult {
    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    /// One-line human summary, as printed by `orak inspect`.
    pub fn summary_line(&self) -> String {
        format!(
            "{} score={:.2} reason={} exchanges={} invalid={} warnings={} ({:.1}s)",
            self.game,
            self.score,
            self.reason,
            self.exchanges,
            self.invalid_actions,
            self.warnings.len(),
            self.duration_secs()
        )
    }
}
