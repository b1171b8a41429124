//! 2048 on a 4×4 board.
//!
//! Unlike the emulator-backed games, 2048 is small enough to simulate
//! in-process; [`Board`] implements the sliding and merging rules and is
//! driven by `env::TwentyFortyEightEnv`.

use std::fmt;

use rand::Rng;

use super::action::ActionSpace;
use super::Game;

pub const ACTIONS: [&str; 4] = ["up", "down", "left", "right"];
/// Invalid model output falls back to `left`.
pub const NOOP: &str = "left";
pub const TARGET_SCORE: f64 = 20_000.0;
pub const TARGET_TILE: u64 = 2048;
pub const DEFAULT_MAX_STEPS: usize = 1000;

const SIZE: usize = 4;

pub fn action_space() -> ActionSpace {
    ActionSpace::single(Game::TwentyFortyEight, ACTIONS, NOOP)
}

/// `min(score / 20000 × 100, 100)`.
pub fn score(game_score: u64) -> f64 {
    (game_score as f64 / TARGET_SCORE * 100.0).min(100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    /// Board coordinates of line `k`, ordered from the edge tiles slide
    /// towards.
    fn line(self, k: usize) -> [(usize, usize); SIZE] {
        let mut cells = [(0, 0); SIZE];
        for (i, cell) in cells.iter_mut().enumerate() {
            *cell = match self {
                Self::Left => (k, i),
                Self::Right => (k, SIZE - 1 - i),
                Self::Up => (i, k),
                Self::Down => (SIZE - 1 - i, k),
            };
        }
        cells
    }
}

/// A 4×4 board of tile values (0 = empty).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Board {
    cells: [[u64; SIZE]; SIZE],
}

impl Board {
    pub fn from_rows(cells: [[u64; SIZE]; SIZE]) -> Self {
        Self { cells }
    }

    /// An empty board with two spawned tiles.
    pub fn new_game<R: Rng>(rng: &mut R) -> Self {
        let mut board = Self::default();
        board.spawn(rng);
        board.spawn(rng);
        board
    }

    pub fn rows(&self) -> &[[u64; SIZE]; SIZE] {
        &self.cells
    }

    pub fn max_tile(&self) -> u64 {
        self.cells.iter().flatten().copied().max().unwrap_or(0)
    }

    /// Slide and merge towards `direction`.
    ///
    /// Returns the points gained, or `None` when nothing moved; a move that
    /// changes nothing is not a valid move and spawns no tile.
    pub fn slide(&mut self, direction: Direction) -> Option<u64> {
        let mut moved = false;
        let mut gained = 0;
        for k in 0..SIZE {
            let line = direction.line(k);
            let values: Vec<u64> = line.iter().map(|&(r, c)| self.cells[r][c]).collect();
            let (merged, points) = merge_line(&values);
            for (&(r, c), &v) in line.iter().zip(merged.iter()) {
                if self.cells[r][c] != v {
                    moved = true;
                }
                self.cells[r][c] = v;
            }
            gained += points;
        }
        moved.then_some(gained)
    }

    /// Place a 2 (90%) or a 4 (10%) on a random empty cell.
    pub fn spawn<R: Rng>(&mut self, rng: &mut R) -> bool {
        let empty: Vec<(usize, usize)> = (0..SIZE)
            .flat_map(|r| (0..SIZE).map(move |c| (r, c)))
            .filter(|&(r, c)| self.cells[r][c] == 0)
            .collect();
        if empty.is_empty() {
            return false;
        }
        let (r, c) = empty[rng.gen_range(0..empty.len())];
        self.cells[r][c] = if rng.gen_bool(0.9) { 2 } else { 4 };
        true
    }

    /// True when no direction produces a move.
    pub fn is_stuck(&self) -> bool {
        [Direction::Up, Direction::Down, Direction::Left, Direction::Right]
            .into_iter()
            .all(|d| self.clone().slide(d).is_none())
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.cells {
            let line: Vec<String> = row.iter().map(|v| format!("{v:>5}")).collect();
            writeln!(f, "[{}]", line.join(","))?;
        }
        Ok(())
    }
}

/// Merge one line towards index 0. Each tile merges at most once.
fn merge_line(values: &[u64]) -> (Vec<u64>, u64) {
    let tiles: Vec<u64> = values.iter().copied().filter(|v| *v != 0).collect();
    let mut out = Vec::with_capacity(values.len());
    let mut points = 0;
    let mut i = 0;
    while i < tiles.len() {
        if i + 1 < tiles.len() && tiles[i] == tiles[i + 1] {
            let merged = tiles[i] * 2;
            points += merged;
            out.push(merged);
            i += 2;
        } else {
            out.push(tiles[i]);
            i += 1;
        }
    }
    out.resize(values.len(), 0);
    (out, points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn merges_from_the_movement_side() {
        assert_eq!(merge_line(&[2, 2, 2, 2]), (vec![4, 4, 0, 0], 8));
        assert_eq!(merge_line(&[2, 2, 2, 0]), (vec![4, 2, 0, 0], 4));
        assert_eq!(merge_line(&[2, 0, 2, 4]), (vec![4, 4, 0, 0], 4));
    }

    #[test]
    fn slide_right_and_down() {
        let mut board = Board::from_rows([
            [2, 2, 0, 0],
            [0, 0, 0, 0],
            [0, 0, 0, 0],
            [2, 0, 0, 0],
        ]);
        assert_eq!(board.slide(Direction::Right), Some(4));
        assert_eq!(board.rows()[0], [0, 0, 0, 4]);
        assert_eq!(board.rows()[3], [0, 0, 0, 2]);

        assert_eq!(board.slide(Direction::Down), Some(0));
        assert_eq!(board.rows()[3], [0, 0, 0, 2]);
        assert_eq!(board.rows()[2], [0, 0, 0, 4]);
    }

    #[test]
    fn ineffective_move_is_rejected() {
        let mut board = Board::from_rows([
            [2, 4, 0, 0],
            [0, 0, 0, 0],
            [0, 0, 0, 0],
            [0, 0, 0, 0],
        ]);
        assert_eq!(board.slide(Direction::Left), None);
        assert_eq!(board.slide(Direction::Up), None);
    }

    #[test]
    fn stuck_board_detected() {
        let board = Board::from_rows([
            [2, 4, 2, 4],
            [4, 2, 4, 2],
            [2, 4, 2, 4],
            [4, 2, 4, 2],
        ]);
        assert!(board.is_stuck());
    }

    #[test]
    fn new_game_has_two_tiles() {
        let mut rng = StdRng::seed_from_u64(7);
        let board = Board::new_game(&mut rng);
        let tiles = board.rows().iter().flatten().filter(|v| **v != 0).count();
        assert_eq!(tiles, 2);
    }

    #[test]
    fn score_is_capped() {
        assert_eq!(score(10_000), 50.0);
        assert_eq!(score(40_000), 100.0);
    }
}
