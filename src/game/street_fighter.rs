//! Street Fighter III: 3rd Strike.
//!
//! The agent picks one of 21 high-level moves per step. A run is ten stages,
//! each a best-of-3; losing a stage ends the run.

use super::action::ActionSpace;
use super::Game;

pub const ACTIONS: [&str; 21] = [
    "Move Closer",
    "Move Away",
    "Jump Closer",
    "Jump Away",
    "No-Move",
    "Fireball",
    "Megapunch",
    "Hurricane",
    "Megafireball",
    "Super attack 2",
    "Super attack 3",
    "Super attack 4",
    "Low Punch",
    "Medium Punch",
    "High Punch",
    "Low Kick",
    "Medium Kick",
    "High Kick",
    "Low Punch+Low Kick",
    "Medium Punch+Medium Kick",
    "High Punch+High Kick",
];

pub const NOOP: &str = "No-Move";

pub const STAGES: u32 = 10;
pub const ROUNDS_TO_WIN: u32 = 2;
pub const POINTS_PER_STAGE: f64 = 10.0;
pub const DEFAULT_MAX_STEPS: usize = 1000;

pub fn action_space() -> ActionSpace {
    ActionSpace::single(Game::StreetFighter, ACTIONS, NOOP)
}

/// `stages_cleared × 10`.
pub fn score(stages_cleared: u32) -> f64 {
    f64::from(stages_cleared) * POINTS_PER_STAGE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Action;

    #[test]
    fn vocabulary_has_21_moves() {
        assert_eq!(action_space().tokens().len(), 21);
        assert!(action_space().accepts(&Action::single("high punch+high kick")));
    }

    #[test]
    fn full_clear_scores_100() {
        assert_eq!(score(STAGES), 100.0);
    }
}
