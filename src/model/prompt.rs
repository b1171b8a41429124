//! Prompt templates for the game-playing agent.
//!
//! Each game gets its own system prompt describing the rules and the
//! expected answer format. The user prompt is shared: task, previous state,
//! last executed action and current state. Every template asks the model to
//! end with a `### Actions` section, which is what the agent parses.

use crate::env::Observation;
use crate::game::{star_craft, street_fighter, ActionSpace, Arity, Game};
use crate::model::api::ChatMessage;

/// What the agent remembers between two calls.
#[derive(Debug, Clone)]
pub struct PromptHistory<'a> {
    pub prev_state: &'a str,
    pub last_action: &'a str,
    /// One line per earlier episode, oldest first.
    pub past_episodes: &'a [String],
}

impl Default for PromptHistory<'_> {
    fn default() -> Self {
        Self {
            prev_state: "N/A",
            last_action: "No action yet",
            past_episodes: &[],
        }
    }
}

/// Build the full conversation for one decision.
pub fn action_prompt(
    game: Game,
    space: &ActionSpace,
    obs: &Observation,
    history: &PromptHistory<'_>,
) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt(game, space, obs)),
        ChatMessage::user(user_prompt(game, space, obs, history)),
    ]
}

// ---------------------------------------------------------------------------
// System prompts
// ---------------------------------------------------------------------------

fn system_prompt(game: Game, space: &ActionSpace, obs: &Observation) -> String {
    match game {
        Game::TwentyFortyEight => TWENTY_FORTY_EIGHT_SYSTEM.to_string(),
        Game::StarCraft => star_craft_system(space, obs),
        Game::PokemonRed => pokemon_red_system(space),
        Game::SuperMario => SUPER_MARIO_SYSTEM.to_string(),
        Game::StreetFighter => street_fighter_system(),
    }
}

const TWENTY_FORTY_EIGHT_SYSTEM: &str = r#"You are an expert AI agent specialized in playing the 2048 game with advanced strategic reasoning.
Your primary goal is to achieve the highest possible tile value while keeping the board flexible and avoiding a premature game over.

### 2048 Game Rules ###
1. The game is played on a 4x4 grid. Tiles slide in one of four directions: 'up', 'down', 'left', or 'right'.
2. Only two consecutive tiles with the SAME value can merge. Merges cannot occur across empty tiles.
3. All tiles first slide in the chosen direction as far as possible, then merges are applied.
4. A tile can merge only once per move. [2, 2, 2, 2] with 'left' results in [4, 4, 0, 0].
5. An action is only valid if it causes at least one tile to slide or merge. Otherwise it is ignored and no new tile is spawned.
6. After every valid action a new tile (90 percent 2, 10 percent 4) appears in a random empty cell.
7. The game ends when the board is full and no merges are possible.
8. Score increases only when merges occur, by the value of the merged tile.

### Decision Output Format ###
Return your decision in the following exact format:
### Reasoning
<a detailed summary of why this action was chosen>
### Actions
<up, right, left, or down>
"#;

const SUPER_MARIO_SYSTEM: &str = r#"You are playing Super Mario Bros, stage 1-1.
Mario runs to the right automatically. Each turn you only decide how high he jumps.
Jump levels range from 0 (no jump) to 6 (highest jump). Jump over pits, pipes and enemies; do not jump when the path is clear.
The stage is cleared when Mario reaches the flag pole.

Return your decision in the following exact format:
### Reasoning
<why this jump level>
### Actions
Jump Level : <0-6>
"#;

fn star_craft_system(space: &ActionSpace, obs: &Observation) -> String {
    let num_actions = match space.arity() {
        Arity::Multi(n) => n,
        Arity::Single => 1,
    };
    let player_race = obs.info_str("player_race").unwrap_or(star_craft::PLAYER_RACE);
    let enemy_race = obs.info_str("enemy_race").unwrap_or(star_craft::BOT_RACE);
    let action_dict = obs
        .game_info
        .get("action_dict")
        .cloned()
        .unwrap_or_else(star_craft::action_dict);

    format!(
        r#"You are a helpful AI assistant trained to play StarCraft II.
Currently, you are playing as {player_race}. Enemy's race is {enemy_race}.
You will be given a status summary in a game.
Analyze the game progression, provide specific strategic suggestions, and choose the most suitable actions for the current situation.

Actions:
Make {num_actions} actionable and specific decisions that follow the current strategy.
The action decisions must be taken from the ACTION_DICTIONARY below.
They are executed chronologically, so check that each one is affordable after the previous ones.

### ACTION_DICTIONARY
{action_dict}

Respond in the format:
### Analysis
1. ...
### Actions
1: <ACTION1>
2: <ACTION2>
...
{num_actions}: <ACTION{num_actions}>
"#
    )
}

fn pokemon_red_system(space: &ActionSpace) -> String {
    format!(
        r#"You are playing Pokemon Red. Your goal is to leave Pallet Town, choose a starter, deliver Oak's parcel, cross Viridian Forest and defeat Brock.

Each turn you either press one Game Boy button or call one tool.
Buttons: {buttons}
Tools: {tools}
A tool call is written as name(arguments), for example move_to(12, 7).

Respond in the format:
### Reasoning
<why this action>
### Actions
<one button or one tool call>
"#,
        buttons = space.tokens().join(", "),
        tools = space.tools().join(", "),
    )
}

fn street_fighter_system() -> String {
    format!(
        r#"You are playing Street Fighter III as Ken. Each stage is a best-of-3 match; win two rounds to advance.
Read the distance to the opponent and both health bars, then pick the move that deals damage without leaving you open.

Available moves:
{moves}

Respond in the format:
### Reasoning
<why this move>
### Actions
<one move name>
"#,
        moves = street_fighter::ACTIONS.join("\n"),
    )
}

// ---------------------------------------------------------------------------
// User prompt
// ---------------------------------------------------------------------------

fn user_prompt(
    game: Game,
    space: &ActionSpace,
    obs: &Observation,
    history: &PromptHistory<'_>,
) -> String {
    let task = obs.info_str("task_description").unwrap_or(game.task());
    let format_hint = match space.arity() {
        Arity::Multi(n) => format!("exactly {n} numbered lines"),
        Arity::Single => "a single action".to_string(),
    };
    let past = if history.past_episodes.is_empty() {
        String::new()
    } else {
        format!(
            "### Previous episodes\n{}\n\n",
            history.past_episodes.join("\n")
        )
    };
    format!(
        "### Target task\n{task}\n\n{past}### Previous state\n{prev}\n\n### Last executed action\n{last}\n\n### Current state\n{cur}\n\nRespond only in the format described above. The ### Actions section must contain {format_hint}.",
        prev = history.prev_state,
        last = history.last_action,
        cur = obs.obs_str,
    )
}
