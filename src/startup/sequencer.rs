//! Startup sequencer.
//!
//! Runs the three startup steps strictly in order:
//! ```text
//! initialize()            // async, the only suspension point
//! install panic bridge    // only after initialize() succeeded
//! mount UI root           // only after the bridge is installed
//! ```
//!
//! Any failure aborts the sequence. Nothing is retried, and nothing is
//! mounted unless every earlier step succeeded.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::state::{InitializationState, StartupPhase, StartupTiming};
use crate::bridge::{BridgeError, PanicBridge};
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::module::{LoadedModule, ModuleInitializer, ModuleLoadError};
use crate::mount::{HostElement, MountError, MountHost, MountTarget, RootComponent};
use crate::runtime::{self, StartupReport};

/// Errors that abort startup
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    ModuleLoad(#[from] ModuleLoadError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("mount target #{0} does not exist in the host document")]
    MountTargetMissing(String),

    #[error("failed to mount UI root: {0}")]
    Mount(#[from] MountError),

    #[error("startup already ran (phase: {0})")]
    AlreadyStarted(StartupPhase),
}

/// Result of a successful startup
#[derive(Debug, Clone)]
pub struct StartupOutcome {
    pub run_id: Uuid,
    pub module: LoadedModule,
    /// Module initialization plus bridge installation
    pub elapsed: Duration,
    pub host: HostElement,
}

/// Orchestrates module initialization, panic bridge installation and mount.
pub struct StartupSequencer<I, B, H> {
    initializer: I,
    bridge: B,
    host: H,
    sink: Arc<dyn DiagnosticSink>,
    target: MountTarget,
    root: RootComponent,
    init_timeout: Option<Duration>,
    run_id: Uuid,
    state: InitializationState,
    mounted: bool,
}

impl<I, B, H> StartupSequencer<I, B, H>
where
    I: ModuleInitializer,
    B: PanicBridge,
    H: MountHost,
{
    pub fn new(initializer: I, bridge: B, host: H, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            initializer,
            bridge,
            host,
            sink,
            target: MountTarget::default(),
            root: RootComponent::default(),
            init_timeout: None,
            run_id: Uuid::new_v4(),
            state: InitializationState::NotStarted,
            mounted: false,
        }
    }

    pub fn with_target(mut self, target: MountTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_root(mut self, root: RootComponent) -> Self {
        self.root = root;
        self
    }

    /// Bound module initialization. Unbounded by default.
    pub fn with_init_timeout(mut self, limit: Option<Duration>) -> Self {
        self.init_timeout = limit;
        self
    }

    pub fn phase(&self) -> StartupPhase {
        if self.mounted {
            StartupPhase::Mounted
        } else {
            self.state.phase()
        }
    }

    #[cfg(test)]
    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    /// Run the startup sequence.
    ///
    /// Only the first call does anything; every later call is rejected with
    /// [`StartupError::AlreadyStarted`] without touching the module, the
    /// bridge or the host.
    pub async fn run(&mut self) -> Result<StartupOutcome, StartupError> {
        if !matches!(self.state, InitializationState::NotStarted) {
            let phase = self.phase();
            warn!("Startup already ran (phase: {}), rejecting second run", phase);
            return Err(StartupError::AlreadyStarted(phase));
        }

        let span = info_span!("startup", run_id = %self.run_id);
        self.run_once().instrument(span).await
    }

    async fn run_once(&mut self) -> Result<StartupOutcome, StartupError> {
        let mut timing = StartupTiming::start();
        self.state = InitializationState::Pending;
        info!("🚀 Initializing computational module...");

        let module = match self.initialize_module().await {
            Ok(module) => module,
            Err(e) => {
                let cause = e.to_string();
                self.state = InitializationState::Failed(cause.clone());
                self.sink.emit(DiagnosticEvent::InitFailed { cause });
                return Err(e.into());
            }
        };
        self.state = InitializationState::Ready(module.clone());

        if let Err(e) = self.bridge.install(&self.state) {
            self.sink.emit(DiagnosticEvent::BridgeFailed { cause: e.to_string() });
            return Err(e.into());
        }

        let elapsed = timing.finish();
        self.sink.emit(DiagnosticEvent::init_completed(elapsed));

        let host = self
            .host
            .element_by_id(self.target.id())
            .ok_or_else(|| StartupError::MountTargetMissing(self.target.id().to_string()))?;
        debug!("Resolved mount target {} to <{}>", self.target, host.tag);

        self.host.attach(&host, &self.root)?;
        self.mounted = true;
        self.sink.emit(DiagnosticEvent::Mounted {
            target: self.target.id().to_string(),
            root: self.root.name().to_string(),
        });

        runtime::set_report(StartupReport {
            run_id: self.run_id,
            module: module.clone(),
            init_elapsed_ms: elapsed.as_secs_f64() * 1000.0,
            mount_target: self.target.id().to_string(),
        });

        Ok(StartupOutcome {
            run_id: self.run_id,
            module,
            elapsed,
            host,
        })
    }

    async fn initialize_module(&mut self) -> Result<LoadedModule, ModuleLoadError> {
        match self.init_timeout {
            Some(limit) => tokio::time::timeout(limit, self.initializer.initialize())
                .await
                .map_err(|_| ModuleLoadError::TimedOut(limit))?,
            None => self.initializer.initialize().await,
        }
    }
}
