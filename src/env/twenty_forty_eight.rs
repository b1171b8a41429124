//! In-process 2048 environment.
//!
//! Wraps [`Board`] with a seeded RNG so episodes are reproducible. The
//! observation text follows the game server's format: the board, the current
//! score and the largest tile.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing;

use super::traits::{Environment, Observation, Outcome, Transition};
use crate::game::twenty_forty_eight::{Board, Direction, TARGET_TILE};
use crate::game::{Action, ActionSpace, Game, ScoreState};

#[derive(Debug, Clone)]
pub struct TwentyFortyEightEnv {
    rng: StdRng,
    board: Board,
    action_space: ActionSpace,
    score: ScoreState,
    max_steps: usize,
    steps_taken: usize,
    done: bool,
}

impl TwentyFortyEightEnv {
    pub fn new(seed: u64, max_steps: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            board: Board::default(),
            action_space: Game::TwentyFortyEight.action_space(),
            score: ScoreState::baseline(Game::TwentyFortyEight),
            max_steps,
            steps_taken: 0,
            done: false,
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    fn game_score(&self) -> u64 {
        match self.score {
            ScoreState::Tiles { game_score, .. } => game_score,
            _ => 0,
        }
    }

    fn observation(&self) -> Observation {
        let game_score = self.game_score();
        let max_tile = self.board.max_tile();
        Observation::text(format!(
            "Board of 2048 Games:\n{}Score: {game_score}\nMax tile: {max_tile}",
            self.board
        ))
        .with_info("task_description", Game::TwentyFortyEight.task())
        .with_info("score", game_score)
        .with_info("max_tile", max_tile)
    }
}

impl Default for TwentyFortyEightEnv {
    fn default() -> Self {
        Self::new(0, Game::TwentyFortyEight.default_max_steps())
    }
}

impl Environment for TwentyFortyEightEnv {
    async fn reset(&mut self) -> Result<Observation> {
        self.board = Board::new_game(&mut self.rng);
        self.score = ScoreState::baseline(Game::TwentyFortyEight);
        self.steps_taken = 0;
        self.done = false;
        Ok(self.observation())
    }

    async fn step(&mut self, action: &Action) -> Result<Transition> {
        if self.done {
            anyhow::bail!("cannot step in a terminated episode");
        }
        let direction = match action {
            Action::Single(token) => Direction::parse(token),
            Action::Multi(_) => None,
        }
        .ok_or_else(|| anyhow::anyhow!("2048 cannot apply action {action}"))?;

        self.steps_taken += 1;

        // A move that changes nothing is ignored and spawns no tile.
        if let Some(points) = self.board.slide(direction) {
            self.board.spawn(&mut self.rng);
            self.score = ScoreState::Tiles {
                game_score: self.game_score() + points,
                max_tile: self.board.max_tile(),
            };
        } else {
            tracing::debug!(action = %action, "2048 move had no effect");
        }

        let stuck = self.board.is_stuck();
        let outcome = stuck.then(|| {
            if self.board.max_tile() >= TARGET_TILE {
                Outcome::Success
            } else {
                Outcome::Failure
            }
        });
        self.done = stuck || self.steps_taken >= self.max_steps;

        Ok(Transition {
            observation: self.observation(),
            score: self.score.clone(),
            done: self.done,
            outcome,
        })
    }

    fn game(&self) -> Game {
        Game::TwentyFortyEight
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
