use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::HarnessError;
use crate::game::{Action, Game};

/// Complete configuration for an evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub runner: RunnerConfig,
    /// Agent used for every game without its own `agent` entry.
    pub agent: AgentConfig,
    /// Per-game settings keyed by game id (e.g. `"star_craft"`).
    pub games: BTreeMap<String, GameConfig>,
    /// Directory receiving `<game>/game_results.json` (default: `game_data`).
    pub output_dir: PathBuf,
    /// Game server process management for live runs.
    pub server: ServerConfig,
}

/// Interaction loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Time budget for one `act` call in milliseconds (default: 60000).
    pub step_timeout_ms: u64,
    /// Consecutive invalid actions tolerated before the episode is ended
    /// (default: unlimited).
    pub max_consecutive_invalid: Option<usize>,
    /// Step budget applied to every game instead of its own (default: none).
    pub max_steps_override: Option<usize>,
}

/// How launched game servers are started and stopped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Wait after spawning a server before the first request (default: 1500).
    pub startup_grace_ms: u64,
    /// Wait after asking a server to terminate before killing it
    /// (default: 5000).
    pub shutdown_timeout_ms: u64,
}

/// Per-game configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Whether the game takes part in the evaluation (default: true).
    pub enabled: bool,
    /// Step budget per episode (default: the game's own budget).
    pub max_steps: Option<usize>,
    /// Episodes per evaluation (default: 3).
    pub max_episodes: usize,
    /// Task description shown to the agent (default: the game's own).
    pub task: Option<String>,
    /// Game server URL (default: `http://localhost:<game port>`).
    pub server_url: Option<String>,
    /// Command starting this game's server for live runs, program first
    /// (default: none, the server is expected to be running already).
    pub server_command: Option<Vec<String>>,
    /// RNG seed for simulated games (default: 0).
    pub seed: u64,
    /// Agent override for this game.
    pub agent: Option<AgentConfig>,
}

/// Which agent implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Always answers the same action.
    Constant,
    /// Asks an OpenAI-compatible chat model.
    Llm,
}

/// Chat model provider. Both speak the OpenAI chat completions protocol;
/// the provider picks the default endpoint, model and credential variables.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    #[value(name = "openai")]
    OpenAi,
    Gemini,
}

impl Provider {
    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-5-nano",
            Self::Gemini => "gemini-2.5-pro",
        }
    }

    pub fn default_api_base(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }

    /// Environment variable holding the API key.
    pub fn key_var(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }

    /// Environment variable overriding the endpoint.
    pub fn base_var(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_BASE",
            Self::Gemini => "GEMINI_API_BASE",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => f.write_str("openai"),
            Self::Gemini => f.write_str("gemini"),
        }
    }
}

/// Agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub kind: AgentKind,
    /// Action returned by the constant agent (default: the game's no-op).
    pub constant_action: Option<Action>,
    /// Chat model provider (default: `openai`).
    pub provider: Provider,
    /// Model identifier (default: the provider's, e.g. `"gpt-5-nano"`).
    pub model: Option<String>,
    /// Base URL of the chat completions API (default: the provider's).
    pub api_base: Option<String>,
    /// API key; filled from the provider's key variable when empty.
    pub api_key: String,
    /// Sampling temperature (default: 0.1).
    pub temperature: f64,
    /// Maximum completion tokens (default: 2048).
    pub max_tokens: usize,
    /// Append prompts and responses to `raw_requests.jsonl` (default: false).
    pub log_requests: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let games = Game::all()
            .into_iter()
            .map(|g| (g.as_str().to_string(), GameConfig::default()))
            .collect();
        Self {
            runner: RunnerConfig::default(),
            agent: AgentConfig::default(),
            games,
            output_dir: PathBuf::from("game_data"),
            server: ServerConfig::default(),
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            step_timeout_ms: 60_000,
            max_consecutive_invalid: None,
            max_steps_override: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            startup_grace_ms: 1_500,
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_steps: None,
            max_episodes: 3,
            task: None,
            server_url: None,
            server_command: None,
            seed: 0,
            agent: None,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            kind: AgentKind::Constant,
            constant_action: None,
            provider: Provider::OpenAi,
            model: None,
            api_base: None,
            api_key: String::new(),
            temperature: 0.1,
            max_tokens: 2048,
            log_requests: false,
        }
    }
}

impl RunnerConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }
}

impl ServerConfig {
    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl GameConfig {
    /// The server URL for `game`, falling back to its local default port.
    pub fn resolved_server_url(&self, game: Game) -> String {
        match &self.server_url {
            Some(url) => url.clone(),
            None => format!("http://localhost:{}", game.default_port()),
        }
    }

    /// The port a launched server should listen on.
    pub fn server_port(&self, game: Game) -> u16 {
        self.server_url
            .as_deref()
            .and_then(|url| reqwest::Url::parse(url).ok())
            .and_then(|url| url.port_or_known_default())
            .unwrap_or_else(|| game.default_port())
    }
}

impl HarnessConfig {
    /// Read a JSON config file, or fall back to defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config from {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse config from {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Fill credentials and endpoints from the environment when the config
    /// leaves them empty. Each agent reads its own provider's variables.
    pub fn apply_env_overrides(&mut self) {
        for agent in self.agents_mut() {
            if agent.api_key.is_empty() {
                if let Ok(key) = std::env::var(agent.provider.key_var()) {
                    agent.api_key = key;
                }
            }
            if let Ok(base) = std::env::var(agent.provider.base_var()) {
                agent.api_base = Some(base);
            }
        }
    }

    /// Switch every agent to `provider`.
    pub fn set_provider(&mut self, provider: Provider) {
        for agent in self.agents_mut() {
            agent.provider = provider;
        }
    }

    fn agents_mut(&mut self) -> impl Iterator<Item = &mut AgentConfig> {
        std::iter::once(&mut self.agent)
            .chain(self.games.values_mut().filter_map(|g| g.agent.as_mut()))
    }

    /// The agent configuration that applies to `game`.
    pub fn agent_for(&self, game: Game) -> &AgentConfig {
        self.games
            .iter()
            .find(|(key, _)| Game::from_str_loose(key) == Some(game))
            .and_then(|(_, g)| g.agent.as_ref())
            .unwrap_or(&self.agent)
    }

    /// Enabled games (optionally restricted to `only`) with their settings,
    /// in evaluation order.
    pub fn selected_games(&self, only: &[Game]) -> Result<Vec<(Game, GameConfig)>, HarnessError> {
        let mut selected = Vec::new();
        let mut seen: BTreeMap<Game, &str> = BTreeMap::new();
        for (key, game_config) in &self.games {
            let game = Game::from_str_loose(key)
                .ok_or_else(|| HarnessError::Configuration(format!("unknown game '{key}'")))?;
            if let Some(first) = seen.insert(game, key) {
                return Err(HarnessError::Configuration(format!(
                    "game keys '{first}' and '{key}' both configure {game}"
                )));
            }
            if !game_config.enabled || (!only.is_empty() && !only.contains(&game)) {
                continue;
            }
            selected.push((game, game_config.clone()));
        }
        selected.sort_by_key(|(game, _)| Game::all().iter().position(|g| g == game));
        if selected.is_empty() {
            return Err(HarnessError::Configuration(
                "no enabled game matches the selection".into(),
            ));
        }
        Ok(selected)
    }

    /// Check everything that must hold before the first episode starts.
    pub fn validate(&self, only: &[Game]) -> Result<(), HarnessError> {
        if self.runner.step_timeout_ms == 0 {
            return Err(HarnessError::Configuration(
                "runner.step_timeout_ms must be positive".into(),
            ));
        }
        if self.runner.max_steps_override == Some(0) {
            return Err(HarnessError::Configuration(
                "runner.max_steps_override must be positive".into(),
            ));
        }
        for (game, game_config) in self.selected_games(only)? {
            if game_config.max_episodes == 0 {
                return Err(HarnessError::Configuration(format!(
                    "{game}: max_episodes must be positive"
                )));
            }
            if game_config.max_steps == Some(0) {
                return Err(HarnessError::Configuration(format!(
                    "{game}: max_steps must be positive"
                )));
            }
            self.agent_for(game).validate(game)?;
        }
        Ok(())
    }
}

impl AgentConfig {
    pub fn model_name(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base
            .as_deref()
            .unwrap_or_else(|| self.provider.default_api_base())
    }

    /// Reject agents that could never be built for `game`.
    pub fn validate(&self, game: Game) -> Result<(), HarnessError> {
        match self.kind {
            AgentKind::Constant => {
                if let Some(action) = &self.constant_action {
                    game.action_space().validate(action).map_err(|e| {
                        HarnessError::Configuration(format!(
                            "{game}: constant agent action is unusable ({e})"
                        ))
                    })?;
                }
            }
            AgentKind::Llm => {
                if self.api_key.is_empty() {
                    return Err(HarnessError::Configuration(format!(
                        "{game}: llm agent needs an API key (set {})",
                        self.provider.key_var()
                    )));
                }
                if self.model_name().is_empty() {
                    return Err(HarnessError::Configuration(format!(
                        "{game}: llm agent needs a model"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_every_game() {
        let config = HarnessConfig::default();
        let games = config.selected_games(&[]).unwrap();
        assert_eq!(games.len(), 5);
        assert_eq!(games[0].0, Game::TwentyFortyEight);
        assert!(config.validate(&[]).is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: HarnessConfig = serde_json::from_str(
            r#"{"runner": {"step_timeout_ms": 500}, "games": {"super_mario": {"max_episodes": 1}}}"#,
        )
        .unwrap();
        assert_eq!(config.runner.step_timeout(), Duration::from_millis(500));
        assert!(config.runner.max_consecutive_invalid.is_none());
        let games = config.selected_games(&[]).unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].1.max_episodes, 1);
    }

    #[test]
    fn unknown_game_is_a_configuration_error() {
        let config: HarnessConfig =
            serde_json::from_str(r#"{"games": {"tetris": {}}}"#).unwrap();
        let err = config.validate(&[]).unwrap_err();
        assert!(matches!(err, HarnessError::Configuration(_)));
        assert!(err.to_string().contains("tetris"));
    }

    #[test]
    fn duplicate_game_keys_are_rejected() {
        let config: HarnessConfig = serde_json::from_str(
            r#"{"games": {"2048": {}, "twenty_fourty_eight": {"max_episodes": 1}}}"#,
        )
        .unwrap();
        let err = config.validate(&[]).unwrap_err();
        assert!(matches!(err, HarnessError::Configuration(_)));
        assert!(err.to_string().contains("2048"));
        assert!(err.to_string().contains("twenty_fourty_eight"));
    }

    #[test]
    fn zero_step_override_is_rejected() {
        let mut config = HarnessConfig::default();
        config.runner.max_steps_override = Some(0);
        let err = config.validate(&[]).unwrap_err();
        assert!(err.to_string().contains("max_steps_override"));

        config.runner.max_steps_override = Some(1);
        assert!(config.validate(&[]).is_ok());
    }

    #[test]
    fn llm_agent_without_key_is_rejected() {
        let mut config = HarnessConfig::default();
        config.agent.kind = AgentKind::Llm;
        let err = config.validate(&[Game::StarCraft]).unwrap_err();
        assert!(err.to_string().contains("API key"));

        config.agent.api_key = "sk-test".into();
        assert!(config.validate(&[Game::StarCraft]).is_ok());
    }

    #[test]
    fn constant_action_must_fit_the_game() {
        let mut config = HarnessConfig::default();
        config.agent.constant_action = Some(Action::single("up"));
        assert!(config.validate(&[Game::TwentyFortyEight]).is_ok());
        assert!(config.validate(&[Game::StarCraft]).is_err());
    }

    #[test]
    fn per_game_agent_override() {
        let mut config = HarnessConfig::default();
        let mut mario_agent = AgentConfig::default();
        mario_agent.constant_action = Some(Action::single("3"));
        config.games.get_mut("super_mario").unwrap().agent = Some(mario_agent);
        assert_eq!(
            config.agent_for(Game::SuperMario).constant_action,
            Some(Action::single("3"))
        );
        assert!(config.agent_for(Game::PokemonRed).constant_action.is_none());
    }

    #[test]
    fn provider_picks_defaults() {
        let config: AgentConfig =
            serde_json::from_str(r#"{"kind": "llm", "provider": "gemini"}"#).unwrap();
        assert_eq!(config.provider, Provider::Gemini);
        assert_eq!(config.model_name(), "gemini-2.5-pro");
        assert!(config.api_base_url().contains("generativelanguage"));
        let err = config.validate(Game::SuperMario).unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));

        let openai = AgentConfig::default();
        assert_eq!(openai.model_name(), "gpt-5-nano");
        assert_eq!(openai.api_base_url(), "https://api.openai.com/v1");

        let custom = AgentConfig {
            model: Some("gpt-4o-mini".into()),
            api_base: Some("http://localhost:8000/v1".into()),
            ..AgentConfig::default()
        };
        assert_eq!(custom.model_name(), "gpt-4o-mini");
        assert_eq!(custom.api_base_url(), "http://localhost:8000/v1");
    }

    #[test]
    fn set_provider_reaches_per_game_agents() {
        let mut config = HarnessConfig::default();
        config.games.get_mut("star_craft").unwrap().agent = Some(AgentConfig::default());
        config.set_provider(Provider::Gemini);
        assert_eq!(config.agent.provider, Provider::Gemini);
        assert_eq!(config.agent_for(Game::StarCraft).provider, Provider::Gemini);
    }

    #[test]
    fn server_port_follows_the_url() {
        let mut game = GameConfig::default();
        assert_eq!(game.server_port(Game::StarCraft), 4004);
        assert_eq!(game.resolved_server_url(Game::StarCraft), "http://localhost:4004");

        game.server_url = Some("http://127.0.0.1:5123".into());
        assert_eq!(game.server_port(Game::StarCraft), 5123);
        assert_eq!(game.resolved_server_url(Game::StarCraft), "http://127.0.0.1:5123");
    }

    #[test]
    fn selection_filters_games() {
        let config = HarnessConfig::default();
        let games = config
            .selected_games(&[Game::StreetFighter, Game::PokemonRed])
            .unwrap();
        let ids: Vec<Game> = games.into_iter().map(|(g, _)| g).collect();
        assert_eq!(ids, vec![Game::PokemonRed, Game::StreetFighter]);
    }
}
