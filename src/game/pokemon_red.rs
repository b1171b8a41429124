//! Pokemon Red, from the player's bedroom to the Boulder Badge.
//!
//! Agents either press a Game Boy button or issue a named tool call such as
//! `move_to(12, 7)`. Progress is measured by seven story flags.

use std::collections::BTreeSet;

use super::action::ActionSpace;
use super::Game;

pub const BUTTONS: [&str; 8] = ["up", "down", "left", "right", "a", "b", "start", "select"];

pub const TOOLS: [&str; 9] = [
    "move_to",
    "warp_with_warp_point",
    "overworld_map_transition",
    "interact_with_object",
    "continue_dialog",
    "select_move_in_battle",
    "switch_pkmn_in_battle",
    "run_away",
    "use_item_in_battle",
];

/// Story milestones in the order they are normally reached; flag `n` is
/// `FLAGS[n - 1]`.
pub const FLAGS: [&str; 7] = [
    "exit_red_house",
    "encounter_professor_oak",
    "choose_starter",
    "finish_rival_battle",
    "deliver_oaks_parcel",
    "enter_viridian_forest",
    "defeat_brock",
];

pub const TOTAL_FLAGS: u8 = 7;
pub const NOOP: &str = "b";
pub const DEFAULT_MAX_STEPS: usize = 200;

pub fn action_space() -> ActionSpace {
    ActionSpace::single(Game::PokemonRed, BUTTONS, NOOP).with_tools(TOOLS)
}

/// `flags / total × 100`.
pub fn score(flags: usize, total: u8) -> f64 {
    if total == 0 {
        return 0.0;
    }
    flags as f64 / f64::from(total) * 100.0
}

/// Number of distinct flags in `1..=total`; ids outside that range are
/// ignored.
pub fn flags_completed(flags: &BTreeSet<u8>, total: u8) -> usize {
    flags.iter().filter(|f| (1..=total).contains(*f)).count()
}

/// Name of a 1-based flag index, if it exists.
pub fn flag_name(flag: u8) -> Option<&'static str> {
    FLAGS.get(usize::from(flag).checked_sub(1)?).copied()
}
