//! The agent-environment interaction loop.
//!
//! The [`Runner`] drives an episode by repeatedly:
//!   1. handing the current observation to the agent (under a time budget),
//!   2. validating the returned action against the game's action space,
//!   3. forwarding a valid action to the environment,
//!   4. recording the exchange.
//!
//! Exactly one `act` call is made per observation. An invalid action is
//! dropped: the environment is not called, so the observation and score stay
//! as they were and the agent is asked again. A late or failing agent is
//! replaced by the game's no-op action for that step.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing;
use uuid::Uuid;

use super::types::{EpisodeResult, StepRecord, TerminationReason, Warning, WarningKind};
use crate::agent::Agent;
use crate::config::RunnerConfig;
use crate::env::{Environment, Observation, Outcome};
use crate::error::HarnessError;
use crate::game::ScoreState;

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Shared stop request, checked between steps. A step already in flight
/// completes and its score is kept.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    Init,
    Running,
    Terminated,
}

/// Mutable bookkeeping for the episode in progress.
struct EpisodeState {
    observation: Observation,
    score: ScoreState,
    exchanges: usize,
    applied: usize,
    invalid: usize,
    consecutive_invalid: usize,
    warnings: Vec<Warning>,
    records: Vec<StepRecord>,
}

pub struct Runner<E, A> {
    env: E,
    agent: A,
    config: RunnerConfig,
    cancel: CancelFlag,
    state: RunnerState,
    /// Replaces the environment's `task_description` when set.
    task: Option<String>,
}

impl<E: Environment, A: Agent> Runner<E, A> {
    pub fn new(env: E, agent: A, config: RunnerConfig) -> Self {
        Self {
            env,
            agent,
            config,
            cancel: CancelFlag::new(),
            state: RunnerState::Init,
            task: None,
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    /// Step budget for the next episode.
    pub fn budget(&self) -> usize {
        self.config
            .max_steps_override
            .unwrap_or_else(|| self.env.max_steps())
    }

    /// Run `n` consecutive episodes, stopping early once cancelled. The
    /// agent sees every result through [`Agent::on_episode_end`].
    pub async fn run_episodes(&mut self, n: usize) -> Vec<EpisodeResult> {
        let mut results = Vec::with_capacity(n);
        for ep in 0..n {
            let result = self.run_episode().await;
            self.agent.on_episode_end(&result);
            tracing::info!(
                game = %result.game,
                episode = ep,
                score = result.score,
                reason = %result.reason,
                exchanges = result.exchanges,
                "finished episode"
            );
            let cancelled = result.reason == TerminationReason::Cancelled;
            results.push(result);
            if cancelled {
                break;
            }
        }
        results
    }

    /// Run one episode from `reset` to termination.
    ///
    /// Never fails: environment faults become
    /// [`TerminationReason::EnvironmentFault`].
    pub async fn run_episode(&mut self) -> EpisodeResult {
        let id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let game = self.env.game();
        let budget = self.budget();

        self.state = RunnerState::Init;
        self.agent.reset();

        tracing::info!(%game, episode_id = %id, budget, agent = self.agent.name(), "starting episode");

        let observation = match self.env.reset().await {
            Ok(obs) => self.with_task_override(obs),
            Err(e) => {
                let fault = HarnessError::environment(&e.context("reset failed"));
                tracing::warn!(%game, error = %fault, "environment fault on reset");
                self.state = RunnerState::Terminated;
                let score = self.env.score().clone();
                return EpisodeResult {
                    id,
                    game,
                    score: score.score(),
                    score_state: score,
                    reason: TerminationReason::EnvironmentFault(fault_message(fault)),
                    exchanges: 0,
                    applied_actions: 0,
                    invalid_actions: 0,
                    warnings: Vec::new(),
                    started_at,
                    finished_at: Utc::now(),
                    records: Vec::new(),
                };
            }
        };

        self.state = RunnerState::Running;
        let mut ep = EpisodeState {
            observation,
            score: self.env.score().clone(),
            exchanges: 0,
            applied: 0,
            invalid: 0,
            consecutive_invalid: 0,
            warnings: Vec::new(),
            records: Vec::new(),
        };

        let reason = loop {
            if self.cancel.is_cancelled() {
                break TerminationReason::Cancelled;
            }
            if ep.exchanges >= budget {
                break TerminationReason::StepBudgetExhausted;
            }
            if let Some(reason) = self.exchange(&mut ep, budget).await {
                break reason;
            }
        };

        self.state = RunnerState::Terminated;

        EpisodeResult {
            id,
            game,
            score: ep.score.score(),
            score_state: ep.score,
            reason,
            exchanges: ep.exchanges,
            applied_actions: ep.applied,
            invalid_actions: ep.invalid,
            warnings: ep.warnings,
            started_at,
            finished_at: Utc::now(),
            records: ep.records,
        }
    }

    /// One observation/action exchange. Returns the termination reason when
    /// the episode is over.
    async fn exchange(
        &mut self,
        ep: &mut EpisodeState,
        budget: usize,
    ) -> Option<TerminationReason> {
        ep.exchanges += 1;
        let index = ep.exchanges;
        let timeout = self.config.step_timeout();

        let proposed = match tokio::time::timeout(timeout, self.agent.act(&ep.observation)).await
        {
            Ok(Ok(action)) => Some(action),
            Ok(Err(e)) => {
                tracing::warn!(step = index, error = %e, "agent failed; playing no-op");
                ep.warnings.push(Warning {
                    step: index,
                    kind: WarningKind::AgentError,
                    message: e.to_string(),
                });
                None
            }
            Err(_) => {
                let err = HarnessError::AgentTimeout(timeout);
                tracing::warn!(step = index, error = %err, "agent timed out; playing no-op");
                ep.warnings.push(Warning {
                    step: index,
                    kind: WarningKind::AgentTimeout,
                    message: err.to_string(),
                });
                None
            }
        };

        let candidate = proposed
            .clone()
            .unwrap_or_else(|| self.env.action_space().noop().clone());

        let action = match self.env.action_space().validate(&candidate) {
            Ok(action) => action,
            Err(e) => {
                ep.invalid += 1;
                ep.consecutive_invalid += 1;
                tracing::warn!(step = index, action = %candidate, error = %e, "dropping invalid action");
                ep.records.push(StepRecord {
                    index,
                    proposed,
                    applied: None,
                    rejection: Some(e.to_string()),
                    score: ep.score.score(),
                });
                let limit_hit = self
                    .config
                    .max_consecutive_invalid
                    .is_some_and(|limit| ep.consecutive_invalid > limit);
                return limit_hit.then_some(TerminationReason::InvalidActionLimit);
            }
        };
        ep.consecutive_invalid = 0;

        let transition = match self.env.step(&action).await {
            Ok(t) => t,
            Err(e) => {
                let fault = HarnessError::environment(&e);
                tracing::warn!(step = index, error = %fault, "environment fault; ending episode");
                ep.records.push(StepRecord {
                    index,
                    proposed,
                    applied: Some(action),
                    rejection: None,
                    score: ep.score.score(),
                });
                return Some(TerminationReason::EnvironmentFault(fault_message(fault)));
            }
        };
        ep.applied += 1;

        tracing::debug!(
            step = index,
            action = %action,
            score = transition.score.score(),
            done = transition.done,
            "applied action"
        );

        ep.score = transition.score;
        ep.observation = self.with_task_override(transition.observation);
        ep.records.push(StepRecord {
            index,
            proposed,
            applied: Some(action),
            rejection: None,
            score: ep.score.score(),
        });

        // A finished goal ends the episode even if the adapter keeps going.
        let complete = ep.score.is_complete();
        if !transition.done && !complete {
            return None;
        }
        Some(match transition.outcome {
            Some(Outcome::Success) => TerminationReason::Success,
            Some(Outcome::Failure) => TerminationReason::Failure,
            None if complete => TerminationReason::Success,
            None if ep.exchanges >= budget || ep.applied >= self.env.max_steps() => {
                TerminationReason::StepBudgetExhausted
            }
            None => TerminationReason::Failure,
        })
    }

    fn with_task_override(&self, obs: Observation) -> Observation {
        match &self.task {
            Some(task) => obs.with_info("task_description", task.as_str()),
            None => obs,
        }
    }
}

/// The message carried by an environment fault.
fn fault_message(err: HarnessError) -> String {
    match err {
        HarnessError::EnvironmentFault(msg) => msg,
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use super::*;
    use crate::agent::ConstantAgent;
    use crate::env::{ScriptedEnv, ScriptedStep, TwentyFortyEightEnv};
    use crate::error::AgentError;
    use crate::game::{Action, Game};

    /// Replays queued answers, then repeats `fallback`. Counts calls and resets.
    struct QueueAgent {
        queue: VecDeque<Result<Action, String>>,
        fallback: Action,
        calls: usize,
        resets: usize,
        /// Termination reasons handed to `on_episode_end`.
        ended: Vec<TerminationReason>,
        /// Cancel this flag on the given call number.
        cancel_on: Option<(usize, CancelFlag)>,
        /// Sleep this long on every call.
        delay: Option<Duration>,
    }

    impl QueueAgent {
        fn new(fallback: Action) -> Self {
            Self {
                queue: VecDeque::new(),
                fallback,
                calls: 0,
                resets: 0,
                ended: Vec::new(),
                cancel_on: None,
                delay: None,
            }
        }

        fn then(mut self, answer: Result<Action, &str>) -> Self {
            self.queue.push_back(answer.map_err(str::to_string));
            self
        }
    }

    impl Agent for QueueAgent {
        fn name(&self) -> &str {
            "queue"
        }

        async fn act(&mut self, _observation: &Observation) -> Result<Action, AgentError> {
            self.calls += 1;
            if let Some((n, flag)) = &self.cancel_on {
                if *n == self.calls {
                    flag.cancel();
                }
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match self.queue.pop_front() {
                Some(Ok(action)) => Ok(action),
                Some(Err(msg)) => Err(AgentError::InvalidActionFormat(msg)),
                None => Ok(self.fallback.clone()),
            }
        }

        fn reset(&mut self) {
            self.resets += 1;
        }

        fn on_episode_end(&mut self, result: &EpisodeResult) {
            self.ended.push(result.reason.clone());
        }
    }

    fn config() -> RunnerConfig {
        RunnerConfig {
            step_timeout_ms: 1_000,
            ..RunnerConfig::default()
        }
    }

    #[tokio::test]
    async fn one_action_per_observation() {
        let env = ScriptedEnv::street_fighter(2);
        let agent = QueueAgent::new(Action::single("Low Kick"));
        let mut runner = Runner::new(env, agent, config());

        let result = runner.run_episode().await;

        assert_eq!(runner.agent().calls, result.exchanges);
        assert_eq!(runner.env().step_calls(), result.applied_actions);
        assert_eq!(result.exchanges, result.applied_actions + result.invalid_actions);
        assert_eq!(result.records.len(), result.exchanges);
        assert_eq!(runner.state(), RunnerState::Terminated);
    }

    #[tokio::test]
    async fn invalid_action_leaves_state_untouched() {
        let env = ScriptedEnv::pokemon_red(&[1, 2]).with_max_steps(5);
        let agent = QueueAgent::new(Action::single("a"))
            .then(Ok(Action::single("a")))
            .then(Ok(Action::single("fly to the moon")))
            .then(Ok(Action::single("a")));
        let mut runner = Runner::new(env, agent, RunnerConfig {
            max_steps_override: Some(3),
            ..config()
        });

        let result = runner.run_episode().await;

        assert_eq!(result.exchanges, 3);
        assert_eq!(result.invalid_actions, 1);
        assert_eq!(runner.env().step_calls(), 2);
        let dropped = &result.records[1];
        assert!(dropped.applied.is_none());
        assert!(dropped.rejection.as_deref().unwrap().contains("fly to the moon"));
        // Score is unchanged by the dropped action and resumes afterwards.
        assert_eq!(dropped.score, result.records[0].score);
        assert!(result.records[2].score > dropped.score);
        assert_eq!(result.reason, TerminationReason::StepBudgetExhausted);
    }

    #[tokio::test]
    async fn star_craft_rejects_wrong_arity() {
        let env = ScriptedEnv::star_craft_victory(10);
        let agent = QueueAgent::new(Action::single("TRAIN PROBE"))
            .then(Ok(Action::multi(["TRAIN PROBE", "BUILD PYLON"])));
        let mut runner = Runner::new(env, agent, RunnerConfig {
            max_steps_override: Some(4),
            ..config()
        });

        let result = runner.run_episode().await;

        assert_eq!(result.invalid_actions, 4);
        assert_eq!(runner.env().step_calls(), 0);
        assert_eq!(result.score, 0.0);
        assert!(result.records[0]
            .rejection
            .as_deref()
            .unwrap()
            .contains("expected 5 actions, got 2"));
    }

    #[tokio::test]
    async fn star_craft_five_actions_win() {
        let env = ScriptedEnv::star_craft_victory(3);
        let five = Action::multi([
            "TRAIN PROBE",
            "BUILD PYLON",
            "TRAIN PROBE",
            "BUILD GATEWAY",
            "EMPTY ACTION",
        ]);
        let mut runner = Runner::new(env, ConstantAgent::new(five.clone()), config());

        let result = runner.run_episode().await;

        assert_eq!(result.reason, TerminationReason::Success);
        assert_eq!(result.score, 100.0);
        assert_eq!(runner.env().applied_actions()[0], five);
    }

    #[tokio::test]
    async fn reset_is_idempotent_across_episodes() {
        let env = ScriptedEnv::street_fighter(3);
        let agent = QueueAgent::new(Action::single("Fireball"));
        let mut runner = Runner::new(env, agent, config());

        let results = runner.run_episodes(2).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].score_state, results[1].score_state);
        assert_eq!(results[0].exchanges, results[1].exchanges);
        assert_ne!(results[0].id, results[1].id);
        assert_eq!(runner.env().reset_calls(), 2);
        assert_eq!(runner.agent().resets, 2);
    }

    #[tokio::test]
    async fn agent_hears_about_every_finished_episode() {
        let env = ScriptedEnv::street_fighter(1);
        let agent = QueueAgent::new(Action::single("Fireball"));
        let mut runner = Runner::new(env, agent, config());

        let results = runner.run_episodes(3).await;

        let reasons: Vec<_> = results.iter().map(|r| r.reason.clone()).collect();
        assert_eq!(runner.agent().ended, reasons);
        assert_eq!(runner.agent().ended.len(), 3);
    }

    #[tokio::test]
    async fn cancelled_episode_is_still_reported_to_the_agent() {
        let env = ScriptedEnv::street_fighter(4);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let agent = QueueAgent::new(Action::single("Fireball"));
        let mut runner = Runner::new(env, agent, config()).with_cancel_flag(cancel);

        runner.run_episodes(2).await;

        assert_eq!(runner.agent().ended, vec![TerminationReason::Cancelled]);
    }

    #[tokio::test]
    async fn super_mario_partial_distance() {
        let env = ScriptedEnv::for_game(Game::SuperMario);
        let mut runner = Runner::new(env, ConstantAgent::new(Action::single("3")), config());

        let result = runner.run_episode().await;

        assert_eq!(result.exchanges, 100);
        assert_eq!(result.reason, TerminationReason::StepBudgetExhausted);
        assert!((result.score - 15.82).abs() < 0.01);
    }

    #[tokio::test]
    async fn pokemon_red_three_of_seven_flags() {
        let env = ScriptedEnv::pokemon_red(&[1, 3, 5]);
        let agent = ConstantAgent::new(Action::single("continue_dialog()"));
        let mut runner = Runner::new(env, agent, config());

        let result = runner.run_episode().await;

        assert_eq!(result.exchanges, 200);
        assert_eq!(result.reason, TerminationReason::StepBudgetExhausted);
        assert!((result.score - 42.86).abs() < 0.01);
    }

    #[tokio::test]
    async fn street_fighter_ends_on_stage_loss() {
        let env = ScriptedEnv::street_fighter(4);
        let agent = ConstantAgent::new(Action::single("high punch"));
        let mut runner = Runner::new(env, agent, config());

        let result = runner.run_episode().await;

        assert_eq!(result.reason, TerminationReason::Failure);
        assert_eq!(result.score, 40.0);
        assert_eq!(result.exchanges, 10);
        // Validation hands the environment the canonical spelling.
        assert_eq!(runner.env().applied_actions()[0], Action::single("High Punch"));
    }

    #[tokio::test]
    async fn pokemon_red_all_flags_wins() {
        let env = ScriptedEnv::pokemon_red(&[1, 2, 3, 4, 5, 6, 7]);
        let agent = ConstantAgent::new(Action::single("a"));
        let mut runner = Runner::new(env, agent, config());

        let result = runner.run_episode().await;

        assert_eq!(result.reason, TerminationReason::Success);
        assert_eq!(result.score, 100.0);
        assert_eq!(result.exchanges, 7);
    }

    #[tokio::test]
    async fn super_mario_reaching_the_flag_wins() {
        let env = ScriptedEnv::super_mario_walk(40);
        let mut runner = Runner::new(env, ConstantAgent::new(Action::single("6")), config());

        let result = runner.run_episode().await;

        assert_eq!(result.reason, TerminationReason::Success);
        assert_eq!(result.score, 100.0);
        // 3161 / 40 rounds up to 80 steps.
        assert_eq!(result.exchanges, 80);
    }

    #[tokio::test]
    async fn street_fighter_full_clear_wins() {
        let env = ScriptedEnv::street_fighter(10);
        let agent = ConstantAgent::new(Action::single("Fireball"));
        let mut runner = Runner::new(env, agent, config());

        let result = runner.run_episode().await;

        assert_eq!(result.reason, TerminationReason::Success);
        assert_eq!(result.score, 100.0);
        assert_eq!(result.exchanges, 20);
    }

    #[tokio::test]
    async fn completed_goal_ends_episode_without_adapter_done() {
        // The adapter never reports `done`; the score record alone ends the run.
        let script = (1..=7u8)
            .map(|n| {
                ScriptedStep::progress(ScoreState::Milestones {
                    flags: (1..=n).collect(),
                    total: 7,
                })
            })
            .collect();
        let env = ScriptedEnv::new(Game::PokemonRed, script);
        let agent = ConstantAgent::new(Action::single("a"));
        let mut runner = Runner::new(env, agent, config());

        let result = runner.run_episode().await;

        assert_eq!(result.reason, TerminationReason::Success);
        assert_eq!(result.exchanges, 7);
        assert!(!runner.env().is_done());
    }

    #[tokio::test]
    async fn timeout_substitutes_noop() {
        let env = ScriptedEnv::street_fighter(1);
        let mut agent = QueueAgent::new(Action::single("Low Kick"));
        agent.delay = Some(Duration::from_secs(5));
        let mut runner = Runner::new(env, agent, RunnerConfig {
            step_timeout_ms: 20,
            max_steps_override: Some(2),
            ..RunnerConfig::default()
        });

        let result = runner.run_episode().await;

        assert_eq!(result.exchanges, 2);
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(result.warnings[0].kind, WarningKind::AgentTimeout);
        assert!(result.records[0].proposed.is_none());
        assert_eq!(result.records[0].applied, Some(Action::single("No-Move")));
        assert_eq!(runner.env().step_calls(), 2);
    }

    #[tokio::test]
    async fn agent_error_substitutes_noop() {
        let env = TwentyFortyEightEnv::new(7, 10);
        let agent = QueueAgent::new(Action::single("up")).then(Err("no ### Actions section"));
        let mut runner = Runner::new(env, agent, config());

        let result = runner.run_episode().await;

        assert_eq!(result.warnings[0].kind, WarningKind::AgentError);
        assert_eq!(result.warnings[0].step, 1);
        assert_eq!(result.records[0].applied, Some(Action::single("left")));
    }

    #[tokio::test]
    async fn environment_fault_terminates() {
        let env = ScriptedEnv::street_fighter(4).with_fault_at(3);
        let agent = ConstantAgent::new(Action::single("Low Kick"));
        let mut runner = Runner::new(env, agent, config());

        let result = runner.run_episode().await;

        match &result.reason {
            TerminationReason::EnvironmentFault(msg) => {
                assert!(msg.contains("emulator stopped responding"))
            }
            other => panic!("unexpected reason {other:?}"),
        }
        assert_eq!(result.exchanges, 3);
        assert_eq!(result.applied_actions, 2);
        // Score earned before the fault is kept.
        assert_eq!(result.score_state, ScoreState::Stages {
            stages_cleared: 1,
            rounds_won: 2,
            rounds_lost: 0,
        });
    }

    #[tokio::test]
    async fn cancellation_stops_between_steps() {
        let env = ScriptedEnv::super_mario_walk(5);
        let cancel = CancelFlag::new();
        let mut agent = QueueAgent::new(Action::single("1"));
        agent.cancel_on = Some((3, cancel.clone()));
        let mut runner = Runner::new(env, agent, config()).with_cancel_flag(cancel);

        let results = runner.run_episodes(3).await;

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.reason, TerminationReason::Cancelled);
        // The in-flight step completed and its progress counts.
        assert_eq!(result.exchanges, 3);
        assert_eq!(result.score_state, ScoreState::Distance {
            x_start: 0,
            x_end: 15,
            x_flag: 3161,
        });
    }

    #[tokio::test]
    async fn invalid_action_limit() {
        let env = ScriptedEnv::street_fighter(4);
        let agent = QueueAgent::new(Action::single("Shoryuken"));
        let mut runner = Runner::new(env, agent, RunnerConfig {
            max_consecutive_invalid: Some(2),
            ..config()
        });

        let result = runner.run_episode().await;

        assert_eq!(result.reason, TerminationReason::InvalidActionLimit);
        assert_eq!(result.invalid_actions, 3);
        assert_eq!(runner.env().step_calls(), 0);
    }

    #[tokio::test]
    async fn task_override_reaches_the_agent() {
        struct TaskRecorder(Vec<String>);
        impl Agent for TaskRecorder {
            fn name(&self) -> &str {
                "recorder"
            }
            async fn act(&mut self, observation: &Observation) -> Result<Action, AgentError> {
                self.0.push(observation.info_str("task_description").unwrap_or("").to_string());
                Ok(Action::single("left"))
            }
        }

        let env = TwentyFortyEightEnv::new(1, 2);
        let mut runner = Runner::new(env, TaskRecorder(Vec::new()), config()).with_task("Reach 512");
        runner.run_episode().await;

        assert!(runner.agent().0.iter().all(|t| t == "Reach 512"));
        assert!(!runner.agent().0.is_empty());
    }
}
