//! StarCraft II, 1 vs 1 against the built-in AI.
//!
//! Every step carries exactly [`NUM_ACTIONS`] macro decisions drawn from a
//! 72-entry Protoss action dictionary; they are executed in order.

use super::action::ActionSpace;
use super::Game;

pub const NUM_ACTIONS: usize = 5;
pub const NOOP: &str = "EMPTY ACTION";
pub const DEFAULT_MAX_STEPS: usize = 1000;

pub const PLAYER_RACE: &str = "Protoss";
pub const BOT_RACE: &str = "Zerg";
pub const BOT_DIFFICULTY: u8 = 4;

pub const ACTIONS: [&str; 72] = [
    // Train units
    "TRAIN PROBE",
    "TRAIN ZEALOT",
    "TRAIN ADEPT",
    "TRAIN STALKER",
    "TRAIN SENTRY",
    "TRAIN HIGHTEMPLAR",
    "TRAIN DARKTEMPLAR",
    "TRAIN VOIDRAY",
    "TRAIN CARRIER",
    "TRAIN TEMPEST",
    "TRAIN ORACLE",
    "TRAIN PHOENIX",
    "TRAIN MOTHERSHIP",
    "TRAIN OBSERVER",
    "TRAIN IMMORTAL",
    "TRAIN WARPPRISM",
    "TRAIN COLOSSUS",
    "TRAIN DISRUPTOR",
    "MORPH ARCHON",
    // Build structures
    "BUILD PYLON",
    "BUILD ASSIMILATOR",
    "BUILD NEXUS",
    "BUILD GATEWAY",
    "BUILD CYBERNETICSCORE",
    "BUILD FORGE",
    "BUILD TWILIGHTCOUNCIL",
    "BUILD ROBOTICSFACILITY",
    "BUILD STARGATE",
    "BUILD TEMPLARARCHIVE",
    "BUILD DARKSHRINE",
    "BUILD ROBOTICSBAY",
    "BUILD FLEETBEACON",
    "BUILD PHOTONCANNON",
    "BUILD SHIELDBATTERY",
    // Research
    "RESEARCH WARPGATERESEARCH",
    "RESEARCH PROTOSSAIRWEAPONSLEVEL1",
    "RESEARCH PROTOSSAIRWEAPONSLEVEL2",
    "RESEARCH PROTOSSAIRWEAPONSLEVEL3",
    "RESEARCH PROTOSSAIRARMORSLEVEL1",
    "RESEARCH PROTOSSAIRARMORSLEVEL2",
    "RESEARCH PROTOSSAIRARMORSLEVEL3",
    "RESEARCH ADEPTPIERCINGATTACK",
    "RESEARCH BLINKTECH",
    "RESEARCH CHARGE",
    "RESEARCH PROTOSSGROUNDWEAPONSLEVEL1",
    "RESEARCH PROTOSSGROUNDWEAPONSLEVEL2",
    "RESEARCH PROTOSSGROUNDWEAPONSLEVEL3",
    "RESEARCH PROTOSSGROUNDARMORSLEVEL1",
    "RESEARCH PROTOSSGROUNDARMORSLEVEL2",
    "RESEARCH PROTOSSGROUNDARMORSLEVEL3",
    "RESEARCH PROTOSSSHIELDSLEVEL1",
    "RESEARCH PROTOSSSHIELDSLEVEL2",
    "RESEARCH PROTOSSSHIELDSLEVEL3",
    "RESEARCH EXTENDEDTHERMALLANCE",
    "RESEARCH GRAVITICDRIVE",
    "RESEARCH OBSERVERGRAVITICBOOSTER",
    "RESEARCH PSISTORMTECH",
    "RESEARCH VOIDRAYSPEEDUPGRADE",
    "RESEARCH PHOENIXRANGEUPGRADE",
    "RESEARCH TEMPESTGROUNDATTACKUPGRADE",
    // Other
    "SCOUTING PROBE",
    "SCOUTING OBSERVER",
    "SCOUTING ZEALOT",
    "SCOUTING PHOENIX",
    "MULTI-ATTACK",
    "MULTI-RETREAT",
    "CHRONOBOOST NEXUS",
    "CHRONOBOOST CYBERNETICSCORE",
    "CHRONOBOOST TWILIGHTCOUNCIL",
    "CHRONOBOOST STARGATE",
    "CHRONOBOOST FORGE",
    "EMPTY ACTION",
];

pub fn action_space() -> ActionSpace {
    ActionSpace::multi(Game::StarCraft, NUM_ACTIONS, ACTIONS, NOOP)
}

/// The numbered dictionary shown to agents, as the game server publishes it
/// under `game_info.action_dict`.
pub fn action_dict() -> serde_json::Value {
    let entries: serde_json::Map<String, serde_json::Value> = ACTIONS
        .iter()
        .enumerate()
        .map(|(i, a)| (i.to_string(), serde_json::Value::from(*a)))
        .collect();
    serde_json::Value::Object(entries)
}

/// `wins / total × 100`; zero before any match has finished.
pub fn score(wins: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    f64::from(wins) / f64::from(total) * 100.0
}
