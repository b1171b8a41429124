//! Inference accounting and the raw request log.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::game::Action;
use crate::model::{ChatMessage, Usage};

/// Running totals over every model call an agent has made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStats {
    pub total_inference_calls: usize,
    pub total_input_tokens: usize,
    pub total_output_tokens: usize,
    pub total_tokens: usize,
}

impl AgentStats {
    /// Account for one call. Servers that omit `total_tokens` get it summed.
    pub fn record(&mut self, usage: &Usage) {
        let total = if usage.total_tokens == 0 {
            usage.prompt_tokens + usage.completion_tokens
        } else {
            usage.total_tokens
        };
        self.total_inference_calls += 1;
        self.total_input_tokens += usage.prompt_tokens;
        self.total_output_tokens += usage.completion_tokens;
        self.total_tokens += total;
    }

    pub fn summary(&self, model: &str, episodes: usize) -> EvaluationSummary {
        let per_episode = |v: usize| {
            if episodes == 0 {
                0.0
            } else {
                v as f64 / episodes as f64
            }
        };
        EvaluationSummary {
            model: model.to_string(),
            total_inference_calls: self.total_inference_calls,
            total_input_tokens: self.total_input_tokens,
            total_output_tokens: self.total_output_tokens,
            total_tokens: self.total_tokens,
            evaluation_episodes: episodes,
            mean_calls_per_episode: per_episode(self.total_inference_calls),
            mean_tokens_per_episode: per_episode(self.total_tokens),
        }
    }
}

/// What an agent reports alongside a game's results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub model: String,
    pub total_inference_calls: usize,
    pub total_input_tokens: usize,
    pub total_output_tokens: usize,
    pub total_tokens: usize,
    pub evaluation_episodes: usize,
    pub mean_calls_per_episode: f64,
    pub mean_tokens_per_episode: f64,
}

// ---------------------------------------------------------------------------
// Raw request log
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct TokenCounts {
    prompt: usize,
    completion: usize,
    total: usize,
}

/// One line of `raw_requests.jsonl`.
#[derive(Debug, Serialize)]
pub struct RequestRecord<'a> {
    pub step: usize,
    pub prompt: &'a [ChatMessage],
    pub response: &'a str,
    /// `None` when the response could not be parsed.
    pub action: Option<&'a Action>,
    tokens: TokenCounts,
}

impl<'a> RequestRecord<'a> {
    pub fn new(
        step: usize,
        prompt: &'a [ChatMessage],
        response: &'a str,
        action: Option<&'a Action>,
        usage: &Usage,
    ) -> Self {
        Self {
            step,
            prompt,
            response,
            action,
            tokens: TokenCounts {
                prompt: usage.prompt_tokens,
                completion: usage.completion_tokens,
                total: usage.total_tokens,
            },
        }
    }
}

/// Append-only JSONL file of prompts and responses.
#[derive(Debug, Clone)]
pub struct RequestLog {
    path: PathBuf,
}

impl RequestLog {
    pub const FILE_NAME: &'static str = "raw_requests.jsonl";

    /// Log into `<dir>/raw_requests.jsonl`, creating `dir` if needed.
    pub fn in_dir(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        Ok(Self {
            path: dir.join(Self::FILE_NAME),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &RequestRecord<'_>) -> Result<()> {
        let line = serde_json::to_string(record).context("Failed to serialize request record")?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("Failed to append to {}", self.path.display()))
    }
}
