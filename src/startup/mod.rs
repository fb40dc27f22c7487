//! Startup sequencing.
//!
//! `StartupSequencer::run()` is the single entry point: initialize the
//! computational module, install the panic bridge, report how long that took
//! and mount the UI root, failing fast at the first step that goes wrong.

mod sequencer;
mod state;
#[cfg(test)]
mod tests;

pub use sequencer::{StartupError, StartupOutcome, StartupSequencer};
pub use state::{InitializationState, StartupPhase};
