//! Super Mario Bros, stage 1-1.
//!
//! Mario runs right on his own; each step the agent only chooses a jump
//! level between 0 (no jump) and 6 (highest).

use super::action::ActionSpace;
use super::Game;

pub const JUMP_LEVELS: [&str; 7] = ["0", "1", "2", "3", "4", "5", "6"];
pub const NOOP: &str = "0";

pub const X_START: u32 = 0;
pub const X_FLAG: u32 = 3161;
pub const DEFAULT_MAX_STEPS: usize = 100;

pub fn action_space() -> ActionSpace {
    ActionSpace::single(Game::SuperMario, JUMP_LEVELS, NOOP)
}

/// `(x_end − x_start) / (x_flag − x_start) × 100`.
pub fn score(x_start: u32, x_end: u32, x_flag: u32) -> f64 {
    if x_flag <= x_start {
        return 0.0;
    }
    (f64::from(x_end) - f64::from(x_start)) / (f64::from(x_flag) - f64::from(x_start)) * 100.0
}

/// Extract the jump level from free-form model output such as
/// `"Jump Level : 3"`: the first digit after the first `:`, or the first
/// digit of the text when there is no label.
pub fn parse_jump_level(text: &str) -> Option<u8> {
    let value = text.split_once(':').map_or(text, |(_, rest)| rest);
    value
        .chars()
        .find(|c| c.is_ascii_digit())
        .and_then(|c| c.to_digit(10))
        .and_then(|d| u8::try_from(d).ok())
        .filter(|d| *d <= 6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reaching_the_flag_scores_100() {
        assert_eq!(score(X_START, X_FLAG, X_FLAG), 100.0);
    }

    #[test]
    fn degenerate_course_scores_zero() {
        assert_eq!(score(10, 20, 10), 0.0);
    }

    #[test]
    fn jump_level_parsing() {
        assert_eq!(parse_jump_level("Jump Level : 3"), Some(3));
        assert_eq!(parse_jump_level("6"), Some(6));
        assert_eq!(parse_jump_level("Jump Level : 9"), None);
        assert_eq!(parse_jump_level("jump high"), None);
        assert_eq!(parse_jump_level("Jump Level : 3 (max 6)"), Some(3));
        assert_eq!(parse_jump_level("Level 2: 5"), Some(5));
        assert_eq!(parse_jump_level("4 (out of 6)"), Some(4));
    }
}
