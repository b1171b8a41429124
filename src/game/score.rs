//! Per-game progress records and their scoring formulas.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{pokemon_red, star_craft, street_fighter, super_mario, twenty_forty_eight, Game};

/// Accumulated progress for one episode.
///
/// Only environment adapters construct or mutate a `ScoreState`; the runner
/// and agents read it. [`ScoreState::score`] applies the game's documented
/// formula, so scores stay comparable across games.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreState {
    /// Street Fighter III: stages cleared (each a best-of-3).
    Stages {
        stages_cleared: u32,
        rounds_won: u32,
        rounds_lost: u32,
    },
    /// StarCraft II: matches won out of matches played.
    Matches { wins: u32, total: u32 },
    /// Pokemon Red: 1-based story flags triggered out of `total`.
    Milestones { flags: BTreeSet<u8>, total: u8 },
    /// Super Mario: horizontal progress towards the flag.
    Distance { x_start: u32, x_end: u32, x_flag: u32 },
    /// 2048: in-game score and the largest tile on the board.
    Tiles { game_score: u64, max_tile: u64 },
}

impl ScoreState {
    /// The fixed starting point of every episode of `game`.
    pub fn baseline(game: Game) -> Self {
        match game {
            Game::StreetFighter => Self::Stages {
                stages_cleared: 0,
                rounds_won: 0,
                rounds_lost: 0,
            },
            Game::StarCraft => Self::Matches { wins: 0, total: 0 },
            Game::PokemonRed => Self::Milestones {
                flags: BTreeSet::new(),
                total: pokemon_red::TOTAL_FLAGS,
            },
            Game::SuperMario => Self::Distance {
                x_start: super_mario::X_START,
                x_end: super_mario::X_START,
                x_flag: super_mario::X_FLAG,
            },
            Game::TwentyFortyEight => Self::Tiles {
                game_score: 0,
                max_tile: 0,
            },
        }
    }

    /// The game this record belongs to.
    pub fn game(&self) -> Game {
        match self {
            Self::Stages { .. } => Game::StreetFighter,
            Self::Matches { .. } => Game::StarCraft,
            Self::Milestones { .. } => Game::PokemonRed,
            Self::Distance { .. } => Game::SuperMario,
            Self::Tiles { .. } => Game::TwentyFortyEight,
        }
    }

    /// The benchmark score in `[0, 100]` for well-formed records.
    pub fn score(&self) -> f64 {
        match self {
            Self::Stages { stages_cleared, .. } => street_fighter::score(*stages_cleared),
            Self::Matches { wins, total } => star_craft::score(*wins, *total),
            Self::Milestones { flags, total } => {
                pokemon_red::score(pokemon_red::flags_completed(flags, *total), *total)
            }
            Self::Distance {
                x_start,
                x_end,
                x_flag,
            } => super_mario::score(*x_start, *x_end, *x_flag),
            Self::Tiles { game_score, .. } => twenty_forty_eight::score(*game_score),
        }
    }

    /// Whether the record shows the game's goal reached: every story flag,
    /// the flag pole, or the last stage cleared.
    ///
    /// StarCraft matches and 2048 boards have no such point; their adapters
    /// decide the episode through its outcome.
    pub fn is_complete(&self) -> bool {
        match self {
            Self::Stages { stages_cleared, .. } => *stages_cleared >= street_fighter::STAGES,
            Self::Matches { .. } | Self::Tiles { .. } => false,
            Self::Milestones { flags, total } => {
                *total > 0 && pokemon_red::flags_completed(flags, *total) == usize::from(*total)
            }
            Self::Distance {
                x_start,
                x_end,
                x_flag,
            } => x_flag > x_start && x_end >= x_flag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn baselines_score_zero() {
        for game in Game::all() {
            let baseline = ScoreState::baseline(game);
            assert_eq!(baseline.game(), game);
            assert_eq!(baseline.score(), 0.0, "{game:?}");
        }
    }

    #[test]
    fn mario_distance_formula() {
        let state = ScoreState::Distance {
            x_start: 0,
            x_end: 500,
            x_flag: 3161,
        };
        assert!(approx(state.score(), 15.82));
    }

    #[test]
    fn pokemon_flag_formula() {
        let state = ScoreState::Milestones {
            flags: [1, 3, 5].into_iter().collect(),
            total: 7,
        };
        assert!(approx(state.score(), 42.86));
    }

    #[test]
    fn street_fighter_stage_formula() {
        let state = ScoreState::Stages {
            stages_cleared: 4,
            rounds_won: 8,
            rounds_lost: 2,
        };
        assert_eq!(state.score(), 40.0);
    }

    #[test]
    fn star_craft_win_ratio() {
        assert_eq!(ScoreState::Matches { wins: 1, total: 1 }.score(), 100.0);
        assert_eq!(ScoreState::Matches { wins: 0, total: 1 }.score(), 0.0);
    }

    #[test]
    fn out_of_range_flags_do_not_count() {
        let state = ScoreState::Milestones {
            flags: [0, 8, 9, 10, 11, 12, 13, 14].into_iter().collect(),
            total: 7,
        };
        assert_eq!(state.score(), 0.0);
        assert!(!state.is_complete());

        let state = ScoreState::Milestones {
            flags: (0..=9).collect(),
            total: 7,
        };
        assert_eq!(state.score(), 100.0);
        assert!(state.is_complete());
    }

    #[test]
    fn completion_per_game() {
        let all_flags = ScoreState::Milestones {
            flags: (1..=7).collect(),
            total: 7,
        };
        assert!(all_flags.is_complete());
        let six_flags = ScoreState::Milestones {
            flags: (1..=6).collect(),
            total: 7,
        };
        assert!(!six_flags.is_complete());

        let at_flag = ScoreState::Distance {
            x_start: 0,
            x_end: 3161,
            x_flag: 3161,
        };
        assert!(at_flag.is_complete());
        let short = ScoreState::Distance {
            x_start: 0,
            x_end: 3160,
            x_flag: 3161,
        };
        assert!(!short.is_complete());

        let cleared = ScoreState::Stages {
            stages_cleared: 10,
            rounds_won: 20,
            rounds_lost: 0,
        };
        assert!(cleared.is_complete());
        assert!(!ScoreState::Matches { wins: 1, total: 1 }.is_complete());
        for game in Game::all() {
            assert!(!ScoreState::baseline(game).is_complete(), "{game:?}");
        }
    }

    #[test]
    fn serialises_with_kind_tag() {
        let json = serde_json::to_value(ScoreState::Matches { wins: 2, total: 3 }).unwrap();
        assert_eq!(json["kind"], "matches");
        let back: ScoreState = serde_json::from_value(json).unwrap();
        assert_eq!(back, ScoreState::Matches { wins: 2, total: 3 });
    }
}
