//! Actions and per-game action spaces.
//!
//! An [`Action`] is either a single token or an ordered list of tokens. The
//! [`ActionSpace`] of a game declares which of the two shapes it expects
//! (and for lists, exactly how many), together with the token vocabulary.
//! Validation canonicalises spelling so the environment always receives the
//! vocabulary's own form of each token.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::Game;
use crate::error::HarnessError;

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// The command(s) an agent returns for one observation.
///
/// Serialises untagged: a bare JSON string or a JSON array of strings, which
/// is exactly what the game servers expect in a step request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Action {
    Single(String),
    Multi(Vec<String>),
}

impl Action {
    pub fn single(token: impl Into<String>) -> Self {
        Self::Single(token.into())
    }

    pub fn multi<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Multi(tokens.into_iter().map(Into::into).collect())
    }

    /// Number of sub-actions carried.
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Multi(tokens) => tokens.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(token) => token.trim().is_empty(),
            Self::Multi(tokens) => tokens.is_empty(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(token) => write!(f, "{token}"),
            Self::Multi(tokens) => write!(f, "[{}]", tokens.join(", ")),
        }
    }
}

// ---------------------------------------------------------------------------
// Action space
// ---------------------------------------------------------------------------

/// How many tokens a game consumes per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Arity {
    Single,
    Multi(usize),
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "1 action per step"),
            Self::Multi(n) => write!(f, "exactly {n} actions per step"),
        }
    }
}

/// The declared action surface of one game.
#[derive(Debug, Clone)]
pub struct ActionSpace {
    game: Game,
    arity: Arity,
    /// Canonical tokens in declaration order (used for prompts and listings).
    tokens: Vec<String>,
    /// Normalised lookup key -> canonical token.
    lookup: HashMap<String, String>,
    /// Names of tool calls accepted in `name(args)` form.
    tools: Vec<String>,
    noop: Action,
}

impl ActionSpace {
    /// A space that expects one token per step.
    pub fn single<I, S>(game: Game, tokens: I, noop: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::build(game, Arity::Single, tokens, Action::single(noop))
    }

    /// A space that expects exactly `count` tokens per step; the no-op repeats
    /// `noop` `count` times.
    pub fn multi<I, S>(game: Game, count: usize, tokens: I, noop: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let noop = Action::Multi(vec![noop.to_string(); count]);
        Self::build(game, Arity::Multi(count), tokens, noop)
    }

    fn build<I, S>(game: Game, arity: Arity, tokens: I, noop: Action) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let lookup = tokens
            .iter()
            .map(|t| (normalize(t), t.clone()))
            .collect();
        Self {
            game,
            arity,
            tokens,
            lookup,
            tools: Vec::new(),
            noop,
        }
    }

    /// Additionally accept tool calls such as `move_to(3, 4)` for the given
    /// tool names.
    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools = tools.into_iter().map(Into::into).collect();
        self
    }

    pub fn game(&self) -> Game {
        self.game
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    /// The fallback action substituted when the agent fails to answer.
    pub fn noop(&self) -> &Action {
        &self.noop
    }

    /// Validate `action` and return its canonical form.
    ///
    /// Shape mismatches (a list for a single-action game, a single token or a
    /// list of the wrong length for a multi-action game) are rejected before
    /// any token is looked at.
    pub fn validate(&self, action: &Action) -> Result<Action, HarnessError> {
        match (self.arity, action) {
            (Arity::Single, Action::Single(token)) => Ok(Action::Single(self.canonical(token)?)),
            (Arity::Single, Action::Multi(tokens)) => Err(self.reject(format!(
                "expected a single action, got a list of {}",
                tokens.len()
            ))),
            (Arity::Multi(n), Action::Single(_)) => Err(self.reject(format!(
                "expected {n} actions, got a single action"
            ))),
            (Arity::Multi(n), Action::Multi(tokens)) => {
                if tokens.len() != n {
                    return Err(self.reject(format!(
                        "expected {n} actions, got {}",
                        tokens.len()
                    )));
                }
                let canonical = tokens
                    .iter()
                    .map(|t| self.canonical(t))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Action::Multi(canonical))
            }
        }
    }

    pub fn accepts(&self, action: &Action) -> bool {
        self.validate(action).is_ok()
    }

    fn canonical(&self, token: &str) -> Result<String, HarnessError> {
        if let Some(found) = self.lookup.get(&normalize(token)) {
            return Ok(found.clone());
        }
        if let Some(call) = self.tool_call(token) {
            return Ok(call);
        }
        Err(self.reject(format!("'{}' is not in the action vocabulary", token.trim())))
    }

    /// Recognise `name(args)` where `name` is a declared tool.
    fn tool_call(&self, token: &str) -> Option<String> {
        let token = token.trim();
        let open = token.find('(')?;
        if !token.ends_with(')') {
            return None;
        }
        let name = token[..open].trim();
        let args = token[open + 1..token.len() - 1].trim();
        if args.contains(['(', ')']) {
            return None;
        }
        self.tools
            .iter()
            .find(|t| t.as_str() == name)
            .map(|t| format!("{t}({args})"))
    }

    fn reject(&self, reason: String) -> HarnessError {
        HarnessError::invalid_action(self.game.as_str(), reason)
    }
}

/// Lowercase and collapse runs of whitespace.
fn normalize(token: &str) -> String {
    token
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
