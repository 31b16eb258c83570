//! Application-level orchestration.
//!
//! This module owns the search/fetch phase machine, the job poll loop, the
//! controller that runs them against a backend, and post-fetch processing.
//! UI/CLI layers talk to it only through commands and events.

mod controller;
pub(crate) mod machine;
mod poll;
mod post_process;
#[cfg(test)]
pub(crate) mod testing;

pub(crate) use controller::{run_controller, ControllerSettings, OrchestratorEvent, UiCommand};
pub(crate) use machine::{Phase, Selection};
pub(crate) use post_process::{process_fetch_completion, CompletedFetch};
