//! Scripted environments that replay canned score progressions.
//!
//! A [`ScriptedEnv`] stands in for a real game backend: each `step` pops the
//! next scripted frame regardless of the action, so runs are fully
//! deterministic. Once the script runs out the game idles ("Nothing
//! happens.") with the score frozen until the step budget ends the episode.
//!
//! Default scripts exist for every game and are what `--mock` runs use.

use anyhow::Result;
use tracing;

use super::traits::{Environment, Observation, Outcome, Transition};
use crate::game::{
    pokemon_red, star_craft, street_fighter, super_mario, Action, ActionSpace, Game, ScoreState,
};

/// One canned transition.
#[derive(Debug, Clone)]
pub struct ScriptedStep {
    pub observation: String,
    pub score: ScoreState,
    pub done: bool,
    pub outcome: Option<Outcome>,
}

impl ScriptedStep {
    /// A non-terminal frame whose text describes the score.
    pub fn progress(score: ScoreState) -> Self {
        Self {
            observation: describe(&score),
            score,
            done: false,
            outcome: None,
        }
    }

    /// A terminal frame decided by the game.
    pub fn finish(score: ScoreState, outcome: Outcome) -> Self {
        Self {
            observation: describe(&score),
            score,
            done: true,
            outcome: Some(outcome),
        }
    }
}

/// A deterministic replay environment.
#[derive(Debug, Clone)]
pub struct ScriptedEnv {
    game: Game,
    action_space: ActionSpace,
    script: Vec<ScriptedStep>,
    /// Index of the next scripted frame.
    cursor: usize,
    score: ScoreState,
    max_steps: usize,
    steps_taken: usize,
    done: bool,
    /// Fail the n-th `step` call of an episode (1-based).
    fault_at: Option<usize>,
    reset_calls: usize,
    step_calls: usize,
    applied: Vec<Action>,
}

impl ScriptedEnv {
    pub fn new(game: Game, script: Vec<ScriptedStep>) -> Self {
        Self {
            game,
            action_space: game.action_space(),
            script,
            cursor: 0,
            score: ScoreState::baseline(game),
            max_steps: game.default_max_steps(),
            steps_taken: 0,
            done: false,
            fault_at: None,
            reset_calls: 0,
            step_calls: 0,
            applied: Vec::new(),
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Make the `step`-th call of every episode fail.
    pub fn with_fault_at(mut self, step: usize) -> Self {
        self.fault_at = Some(step);
        self
    }

    /// The built-in script for `game`.
    pub fn for_game(game: Game) -> Self {
        match game {
            Game::StreetFighter => Self::street_fighter(4),
            Game::StarCraft => Self::star_craft_victory(40),
            Game::PokemonRed => Self::pokemon_red(&[1, 3, 5]),
            Game::SuperMario => Self::super_mario_walk(5),
            Game::TwentyFortyEight => Self::twenty_forty_eight(),
        }
    }

    // -- built-in scripts ---------------------------------------------------

    /// Win two rounds in each of `stages` stages, then lose the next stage
    /// two rounds to none. Clearing the last stage wins the run instead.
    pub fn street_fighter(stages: u32) -> Self {
        let stages = stages.min(street_fighter::STAGES);
        let mut script = Vec::new();
        let mut won = 0;
        let mut lost = 0;
        for stage in 1..=stages {
            won += 1;
            script.push(ScriptedStep::progress(ScoreState::Stages {
                stages_cleared: stage - 1,
                rounds_won: won,
                rounds_lost: lost,
            }));
            won += 1;
            let cleared = ScoreState::Stages {
                stages_cleared: stage,
                rounds_won: won,
                rounds_lost: lost,
            };
            if cleared.is_complete() {
                script.push(ScriptedStep::finish(cleared, Outcome::Success));
                return Self::new(Game::StreetFighter, script);
            }
            script.push(ScriptedStep::progress(cleared));
        }
        lost += 1;
        script.push(ScriptedStep::progress(ScoreState::Stages {
            stages_cleared: stages,
            rounds_won: won,
            rounds_lost: lost,
        }));
        lost += 1;
        script.push(ScriptedStep::finish(
            ScoreState::Stages {
                stages_cleared: stages,
                rounds_won: won,
                rounds_lost: lost,
            },
            Outcome::Failure,
        ));
        Self::new(Game::StreetFighter, script)
    }

    /// Build up for `steps - 1` steps, then win the match.
    pub fn star_craft_victory(steps: usize) -> Self {
        let mut script: Vec<ScriptedStep> = (1..steps)
            .map(|_| ScriptedStep::progress(ScoreState::Matches { wins: 0, total: 0 }))
            .collect();
        script.push(ScriptedStep::finish(
            ScoreState::Matches { wins: 1, total: 1 },
            Outcome::Success,
        ));
        Self::new(Game::StarCraft, script)
    }

    /// Trigger `flags` (1-based) one step apart, then idle. The episode is
    /// won on the step that completes the last story flag.
    pub fn pokemon_red(flags: &[u8]) -> Self {
        let mut triggered = std::collections::BTreeSet::new();
        let mut script = Vec::new();
        for flag in flags {
            triggered.insert(*flag);
            let score = ScoreState::Milestones {
                flags: triggered.clone(),
                total: pokemon_red::TOTAL_FLAGS,
            };
            if score.is_complete() {
                script.push(ScriptedStep::finish(score, Outcome::Success));
                break;
            }
            script.push(ScriptedStep::progress(score));
        }
        Self::new(Game::PokemonRed, script)
    }

    /// Advance `per_step` pixels every step for the whole default budget, or
    /// until Mario reaches the flag.
    pub fn super_mario_walk(per_step: u32) -> Self {
        let budget = Game::SuperMario.default_max_steps();
        let mut script = Vec::new();
        for i in 1..=budget as u32 {
            let score = ScoreState::Distance {
                x_start: super_mario::X_START,
                x_end: (super_mario::X_START + i * per_step).min(super_mario::X_FLAG),
                x_flag: super_mario::X_FLAG,
            };
            if score.is_complete() {
                script.push(ScriptedStep::finish(score, Outcome::Success));
                break;
            }
            script.push(ScriptedStep::progress(score));
        }
        Self::new(Game::SuperMario, script)
    }

    /// A short game that gets stuck at 1200 points.
    pub fn twenty_forty_eight() -> Self {
        let mut script: Vec<ScriptedStep> = [(4, 4), (12, 8), (40, 16), (200, 64), (640, 128)]
            .into_iter()
            .map(|(game_score, max_tile)| {
                ScriptedStep::progress(ScoreState::Tiles {
                    game_score,
                    max_tile,
                })
            })
            .collect();
        script.push(ScriptedStep::finish(
            ScoreState::Tiles {
                game_score: 1200,
                max_tile: 256,
            },
            Outcome::Failure,
        ));
        Self::new(Game::TwentyFortyEight, script)
    }

    // -- inspection ---------------------------------------------------------

    pub fn reset_calls(&self) -> usize {
        self.reset_calls
    }

    pub fn step_calls(&self) -> usize {
        self.step_calls
    }

    /// Every action forwarded to `step`, across episodes.
    pub fn applied_actions(&self) -> &[Action] {
        &self.applied
    }

    fn observation(&self, text: String) -> Observation {
        let mut obs = Observation::text(text)
            .with_info("task_description", self.game.task())
            .with_info("score", self.score.score());
        if self.game == Game::StarCraft {
            obs = obs
                .with_info("action_dict", star_craft::action_dict())
                .with_info("player_race", star_craft::PLAYER_RACE)
                .with_info("enemy_race", star_craft::BOT_RACE);
        }
        obs
    }
}

impl Environment for ScriptedEnv {
    async fn reset(&mut self) -> Result<Observation> {
        self.reset_calls += 1;
        self.cursor = 0;
        self.steps_taken = 0;
        self.done = false;
        self.score = ScoreState::baseline(self.game);

        tracing::debug!(game = %self.game, frames = self.script.len(), "scripted env reset");

        Ok(self.observation(describe(&self.score)))
    }

    async fn step(&mut self, action: &Action) -> Result<Transition> {
        if self.done {
            anyhow::bail!("cannot step in a terminated episode");
        }

        self.step_calls += 1;
        self.steps_taken += 1;

        if self.fault_at == Some(self.steps_taken) {
            anyhow::bail!("emulator stopped responding at step {}", self.steps_taken);
        }

        self.applied.push(action.clone());

        let (text, done, outcome) = match self.script.get(self.cursor) {
            Some(frame) => {
                self.cursor += 1;
                self.score = frame.score.clone();
                (frame.observation.clone(), frame.done, frame.outcome)
            }
            None => ("Nothing happens.".to_string(), false, None),
        };

        let truncated = self.steps_taken >= self.max_steps;
        self.done = done || truncated;

        Ok(Transition {
            observation: self.observation(text),
            score: self.score.clone(),
            done: self.done,
            outcome,
        })
    }

    fn game(&self) -> Game {
        self.game
    }

    fn action_space(&self) -> &ActionSpace {
        &self.action_space
    }

    fn score(&self) -> &ScoreState {
        &self.score
    }

    fn max_steps(&self) -> usize {
        self.max_steps
    }

    fn is_done(&self) -> bool {
        self.done
    }
}

/// Short text rendering of a score record, used as the scripted `obs_str`.
fn describe(score: &ScoreState) -> String {
    match score {
        ScoreState::Stages {
            stages_cleared,
            rounds_won,
            rounds_lost,
        } => format!(
            "Stages cleared: {stages_cleared}\nRounds won: {rounds_won}\nRounds lost: {rounds_lost}"
        ),
        ScoreState::Matches { wins, total } => {
            format!("Matches won: {wins}/{total}\nSupply: 14/15\nMinerals: 50\nGas: 0")
        }
        ScoreState::Milestones { flags, .. } => {
            let names: Vec<&str> = flags
                .iter()
                .filter_map(|f| pokemon_red::flag_name(*f))
                .collect();
            format!(
                "Location: Pallet Town\nCompleted milestones: [{}]",
                names.join(", ")
            )
        }
        ScoreState::Distance { x_end, x_flag, .. } => {
            format!("Mario x position: {x_end}\nFlag x position: {x_flag}")
        }
        ScoreState::Tiles {
            game_score,
            max_tile,
        } => format!("Score: {game_score}\nMax tile: {max_tile}"),
    }
}
