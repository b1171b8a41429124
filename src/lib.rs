//! Orak: an agent-environment interaction harness for multi-game LLM
//! benchmarks.
//!
//! An environment adapter produces observations, an agent maps each one to an
//! action, and the runner validates the action, forwards it and records the
//! score until the episode ends.

pub mod agent;
pub mod config;
pub mod env;
pub mod episode;
pub mod error;
pub mod evaluation;
pub mod game;
pub mod model;
