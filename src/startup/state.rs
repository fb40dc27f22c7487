use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

use crate::module::LoadedModule;

/// Initialization state of the computational module.
///
/// Moves `NotStarted -> Pending -> Ready | Failed` and never leaves a
/// terminal phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InitializationState {
    #[default]
    NotStarted,
    Pending,
    Ready(LoadedModule),
    Failed(String),
}

impl InitializationState {
    pub fn phase(&self) -> StartupPhase {
        match self {
            InitializationState::NotStarted => StartupPhase::NotStarted,
            InitializationState::Pending => StartupPhase::Pending,
            InitializationState::Ready(_) => StartupPhase::Ready,
            InitializationState::Failed(_) => StartupPhase::Failed,
        }
    }

    pub fn module(&self) -> Option<&LoadedModule> {
        match self {
            InitializationState::Ready(module) => Some(module),
            _ => None,
        }
    }
}

/// Externally visible startup phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartupPhase {
    NotStarted,
    Pending,
    Ready,
    Failed,
    Mounted,
}

impl fmt::Display for StartupPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StartupPhase::NotStarted => "not started",
            StartupPhase::Pending => "pending",
            StartupPhase::Ready => "ready",
            StartupPhase::Failed => "failed",
            StartupPhase::Mounted => "mounted",
        };
        write!(f, "{}", s)
    }
}

/// Start and end of module initialization.
#[derive(Debug, Clone, Copy)]
pub struct StartupTiming {
    started: Instant,
    finished: Option<Instant>,
}

impl StartupTiming {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            finished: None,
        }
    }

    /// Record the end timestamp and return the elapsed duration.
    pub fn finish(&mut self) -> Duration {
        let finished = *self.finished.get_or_insert_with(Instant::now);
        finished.saturating_duration_since(self.started)
    }
}
