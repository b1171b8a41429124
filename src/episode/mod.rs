//! Episodes: the interaction loop and the results it produces.
//!
//! - [`runner`] -- the [`Runner`] that alternates observations and actions.
//! - [`types`] -- [`EpisodeResult`], termination reasons and step records.

pub mod runner;
pub mod types;

pub use runner::{CancelFlag, Runner, RunnerState};
pub use types::{EpisodeResult, StepRecord, TerminationReason, Warning, WarningKind};
