//! The benchmark's games: identifiers, action spaces and scoring.
//!
//! Each game module owns its vocabulary, default step budget and score
//! formula. [`Game`] ties them together so the rest of the harness can stay
//! game-agnostic:
//!
//! - **Street Fighter III** ([`street_fighter`]) -- 1 of 21 moves per step.
//! - **StarCraft II** ([`star_craft`]) -- exactly 5 of 72 actions per step.
//! - **Pokemon Red** ([`pokemon_red`]) -- a button press or a tool call.
//! - **Super Mario** ([`super_mario`]) -- a jump level from 0 to 6.
//! - **2048** ([`twenty_forty_eight`]) -- a slide direction.

pub mod action;
pub mod pokemon_red;
pub mod score;
pub mod star_craft;
pub mod street_fighter;
pub mod super_mario;
pub mod twenty_forty_eight;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use action::{Action, ActionSpace, Arity};
pub use score::ScoreState;

/// A game supported by the harness.
///
/// The serialised identifiers match the game ids used by the game servers
/// and result directories.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum Game {
    #[serde(rename = "twenty_fourty_eight")]
    #[value(name = "twenty_fourty_eight", alias = "2048")]
    TwentyFortyEight,
    #[serde(rename = "pokemon_red")]
    #[value(name = "pokemon_red")]
    PokemonRed,
    #[serde(rename = "super_mario")]
    #[value(name = "super_mario")]
    SuperMario,
    #[serde(rename = "star_craft")]
    #[value(name = "star_craft")]
    StarCraft,
    #[serde(rename = "street_fighter")]
    #[value(name = "street_fighter")]
    StreetFighter,
}

impl Game {
    /// Every game, in evaluation order.
    pub fn all() -> [Game; 5] {
        [
            Self::TwentyFortyEight,
            Self::PokemonRed,
            Self::SuperMario,
            Self::StarCraft,
            Self::StreetFighter,
        ]
    }

    /// Stable identifier (directory names, config keys, server ids).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TwentyFortyEight => "twenty_fourty_eight",
            Self::PokemonRed => "pokemon_red",
            Self::SuperMario => "super_mario",
            Self::StarCraft => "star_craft",
            Self::StreetFighter => "street_fighter",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::TwentyFortyEight => "2048",
            Self::PokemonRed => "Pokemon Red",
            Self::SuperMario => "Super Mario",
            Self::StarCraft => "StarCraft II",
            Self::StreetFighter => "Street Fighter III",
        }
    }

    /// Parse an identifier leniently (case, separators, common aliases).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "2048" | "twentyfourtyeight" | "twentyfortyeight" => Some(Self::TwentyFortyEight),
            "pokemonred" | "pokemon" => Some(Self::PokemonRed),
            "supermario" | "mario" => Some(Self::SuperMario),
            "starcraft" | "starcraft2" | "starcraftii" | "sc2" => Some(Self::StarCraft),
            "streetfighter" | "streetfighter3" | "streetfighteriii" | "sf3" => {
                Some(Self::StreetFighter)
            }
            _ => None,
        }
    }

    pub fn action_space(&self) -> ActionSpace {
        match self {
            Self::TwentyFortyEight => twenty_forty_eight::action_space(),
            Self::PokemonRed => pokemon_red::action_space(),
            Self::SuperMario => super_mario::action_space(),
            Self::StarCraft => star_craft::action_space(),
            Self::StreetFighter => street_fighter::action_space(),
        }
    }

    /// Default step budget per episode.
    pub fn default_max_steps(&self) -> usize {
        match self {
            Self::TwentyFortyEight => twenty_forty_eight::DEFAULT_MAX_STEPS,
            Self::PokemonRed => pokemon_red::DEFAULT_MAX_STEPS,
            Self::SuperMario => super_mario::DEFAULT_MAX_STEPS,
            Self::StarCraft => star_craft::DEFAULT_MAX_STEPS,
            Self::StreetFighter => street_fighter::DEFAULT_MAX_STEPS,
        }
    }

    /// Local port of the game's server.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::TwentyFortyEight => 4001,
            Self::PokemonRed => 4002,
            Self::SuperMario => 4003,
            Self::StarCraft => 4004,
            Self::StreetFighter => 4005,
        }
    }

    /// The task statement handed to agents.
    pub fn task(&self) -> &'static str {
        match self {
            Self::TwentyFortyEight => "Merge Tiles to Reach the Target",
            Self::PokemonRed => "Defeat Brock and obtain the Boulder Badge",
            Self::SuperMario => "Complete stage 1-1",
            Self::StarCraft => "1 vs 1 battle against the built-in AI",
            Self::StreetFighter => "Clear as many stages as possible",
        }
    }

    /// How the score of this game is computed, for listings.
    pub fn score_formula(&self) -> &'static str {
        match self {
            Self::TwentyFortyEight => "min(score / 20000 x 100, 100)",
            Self::PokemonRed => "flags / 7 x 100",
            Self::SuperMario => "(x_end - x_start) / (x_flag - x_start) x 100",
            Self::StarCraft => "wins / total x 100",
            Self::StreetFighter => "stages_cleared x 10",
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loose_parsing() {
        assert_eq!(Game::from_str_loose("Star-Craft"), Some(Game::StarCraft));
        assert_eq!(Game::from_str_loose("2048"), Some(Game::TwentyFortyEight));
        assert_eq!(Game::from_str_loose("twenty_fourty_eight"), Some(Game::TwentyFortyEight));
        assert_eq!(Game::from_str_loose("tetris"), None);
        for game in Game::all() {
            assert_eq!(Game::from_str_loose(game.as_str()), Some(game));
        }
    }

    #[test]
    fn serde_uses_game_ids() {
        let json = serde_json::to_string(&Game::TwentyFortyEight).unwrap();
        assert_eq!(json, "\"twenty_fourty_eight\"");
        let back: Game = serde_json::from_str("\"street_fighter\"").unwrap();
        assert_eq!(back, Game::StreetFighter);
    }

    #[test]
    fn action_spaces_declare_their_game() {
        for game in Game::all() {
            let space = game.action_space();
            assert_eq!(space.game(), game);
            assert!(space.accepts(space.noop()), "{game}: no-op must be valid");
        }
        assert_eq!(Game::StarCraft.action_space().arity(), Arity::Multi(5));
    }

    #[test]
    fn ports_are_distinct() {
        let ports: std::collections::HashSet<_> = Game::all().iter().map(|g| g.default_port()).collect();
        assert_eq!(ports.len(), 5);
    }
}
