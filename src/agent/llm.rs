//! Chat-model agent.
//!
//! Each `act` call renders the game's prompt (task, previous state, last
//! executed action, current state), asks an OpenAI-compatible endpoint, and
//! parses the `### Actions` section of the reply into an [`Action`].
//!
//! Parsing rules:
//! - multi-action games read every numbered line (`1: TRAIN PROBE`);
//! - Super Mario reads the jump level digit;
//! - 2048 falls back to `left` when the reply is unusable;
//! - every other game takes the first line of the section.

use anyhow::Context;
use tracing::{debug, info, warn};

use super::stats::{AgentStats, EvaluationSummary, RequestLog, RequestRecord};
use super::Agent;
use crate::config::AgentConfig;
use crate::env::Observation;
use crate::episode::EpisodeResult;
use crate::error::AgentError;
use crate::game::twenty_forty_eight::Direction;
use crate::game::{super_mario, Action, ActionSpace, Arity, Game};
use crate::model::{action_prompt, LlmClient, PromptHistory};

const ACTIONS_HEADER: &str = "### actions";

/// Earlier episodes summarised in the prompt.
const MAX_EPISODE_NOTES: usize = 3;

pub struct LlmAgent {
    game: Game,
    space: ActionSpace,
    client: LlmClient,
    model: String,
    temperature: f64,
    max_tokens: usize,
    /// Observation text seen on the previous call.
    prev_state: String,
    /// Action returned on the previous call.
    last_action: String,
    step_count: usize,
    /// Outcome lines of recent episodes; kept across `reset`.
    episode_notes: Vec<String>,
    episodes_seen: usize,
    stats: AgentStats,
    request_log: Option<RequestLog>,
}

impl LlmAgent {
    pub fn new(game: Game, config: &AgentConfig) -> anyhow::Result<Self> {
        let defaults = PromptHistory::default();
        Ok(Self {
            game,
            space: game.action_space(),
            client: LlmClient::new(config.api_base_url(), &config.api_key)?,
            model: config.model_name().to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            prev_state: defaults.prev_state.to_string(),
            last_action: defaults.last_action.to_string(),
            step_count: 0,
            episode_notes: Vec::new(),
            episodes_seen: 0,
            stats: AgentStats::default(),
            request_log: None,
        })
    }

    pub fn with_request_log(mut self, log: RequestLog) -> Self {
        self.request_log = Some(log);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn stats(&self) -> &AgentStats {
        &self.stats
    }

    pub fn episode_notes(&self) -> &[String] {
        &self.episode_notes
    }
}

impl Agent for LlmAgent {
    fn name(&self) -> &str {
        &self.model
    }

    async fn act(&mut self, observation: &Observation) -> Result<Action, AgentError> {
        self.step_count += 1;

        let history = PromptHistory {
            prev_state: &self.prev_state,
            last_action: &self.last_action,
            past_episodes: &self.episode_notes,
        };
        let messages = action_prompt(self.game, &self.space, observation, &history);

        let response = self
            .client
            .chat_completion(&self.model, &messages, self.temperature, self.max_tokens)
            .await
            .context("policy model chat completion failed")?;
        self.stats.record(&response.usage);

        let text = response.text();
        let parsed = parse_response(self.game, &self.space, text);

        if let Some(log) = &self.request_log {
            let record = RequestRecord::new(
                self.step_count,
                &messages,
                text,
                parsed.as_ref().ok(),
                &response.usage,
            );
            if let Err(e) = log.append(&record) {
                warn!(error = %e, "failed to log raw request");
            }
        }

        self.prev_state = observation.obs_str.clone();
        match &parsed {
            Ok(action) => {
                self.last_action = action.to_string();
                info!(game = %self.game, step = self.step_count, action = %action, "agent produced action");
            }
            Err(e) => {
                debug!(game = %self.game, step = self.step_count, error = %e, "could not parse model output");
            }
        }
        parsed
    }

    fn reset(&mut self) {
        let defaults = PromptHistory::default();
        self.prev_state = defaults.prev_state.to_string();
        self.last_action = defaults.last_action.to_string();
    }

    fn on_episode_end(&mut self, result: &EpisodeResult) {
        self.episodes_seen += 1;
        let note = format!(
            "Episode {}: score {:.2}, {} after {} steps ({} invalid actions)",
            self.episodes_seen,
            result.score,
            result.reason,
            result.exchanges,
            result.invalid_actions
        );
        debug!(game = %self.game, note = %note, "recorded episode feedback");
        self.episode_notes.push(note);
        if self.episode_notes.len() > MAX_EPISODE_NOTES {
            self.episode_notes.remove(0);
        }
    }

    fn summary(&self, episodes: usize) -> Option<EvaluationSummary> {
        Some(self.stats.summary(&self.model, episodes))
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Turn a model reply into an action for `game`.
///
/// Only the shape is decided here; whether the tokens are in the vocabulary
/// is left to the runner's validation.
pub fn parse_response(game: Game, space: &ActionSpace, text: &str) -> Result<Action, AgentError> {
    let parsed = parse_section(game, space, text);
    if game == Game::TwentyFortyEight {
        if let Err(e) = &parsed {
            debug!(error = %e, "falling back to the default 2048 move");
            return Ok(space.noop().clone());
        }
    }
    parsed
}

fn parse_section(game: Game, space: &ActionSpace, text: &str) -> Result<Action, AgentError> {
    let section = actions_section(text).ok_or_else(|| {
        AgentError::InvalidActionFormat("response has no ### Actions section".into())
    })?;

    if let Arity::Multi(_) = space.arity() {
        let items = numbered_items(section);
        if items.is_empty() {
            return Err(AgentError::InvalidActionFormat(
                "### Actions section has no numbered lines".into(),
            ));
        }
        return Ok(Action::Multi(items));
    }

    let line = section
        .lines()
        .map(clean)
        .find(|l| !l.is_empty())
        .unwrap_or_default();

    match game {
        Game::SuperMario => super_mario::parse_jump_level(&line)
            .map(|level| Action::single(level.to_string()))
            .ok_or_else(|| AgentError::InvalidActionFormat(format!("no jump level in '{line}'"))),
        Game::TwentyFortyEight => match Direction::parse(&line) {
            Some(_) => Ok(Action::single(line.to_lowercase())),
            None => Err(AgentError::InvalidActionFormat(format!(
                "'{line}' is not a direction"
            ))),
        },
        _ if line.is_empty() => Err(AgentError::InvalidActionFormat(
            "### Actions section is empty".into(),
        )),
        _ => Ok(Action::single(line)),
    }
}

/// Text after the last `### Actions` header, up to the next header.
fn actions_section(text: &str) -> Option<&str> {
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let start = text.to_ascii_lowercase().rfind(ACTIONS_HEADER)?;
    let rest = &text[start + ACTIONS_HEADER.len()..];
    let end = rest.find("\n###").unwrap_or(rest.len());
    let section = rest[..end].trim_start_matches(':').trim();
    (!section.is_empty()).then_some(section)
}

/// Items of lines shaped like `1: X`, `2. X` or `3) X`, in order.
fn numbered_items(section: &str) -> Vec<String> {
    section
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let digits = line.find(|c: char| !c.is_ascii_digit())?;
            if digits == 0 {
                return None;
            }
            let rest = line[digits..].trim_start().strip_prefix([':', '.', ')'])?;
            let item = clean(rest);
            (!item.is_empty()).then_some(item)
        })
        .collect()
}

/// Strip markup models like to wrap answers in.
fn clean(token: &str) -> String {
    token
        .trim()
        .trim_matches(|c| matches!(c, '<' | '>' | '`' | '"' | '*'))
        .trim()
        .trim_end_matches('.')
        .trim()
        .to_string()
}
