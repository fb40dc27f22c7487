//! Panic bridge.
//!
//! Converts failures of the computational module into
//! [`DiagnosticEvent::Panic`] events instead of letting them vanish:
//!
//! - the module's own hook export (`setup_panic`) is called, so panics inside
//!   the module are reported by the module's panic machinery;
//! - traps returned by any later call into the module instance are reported;
//! - a process-wide host panic hook reports panics on the host side.
//!
//! The host hook is process-wide, so installation is guarded: it happens at
//! most once per process, and only once the module reached `Ready`.

use chrono::Utc;
use std::panic::{self, PanicHookInfo};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use wasmtime::{Trap, WasmBacktrace};

use crate::diagnostics::{DiagnosticEvent, DiagnosticSink, PanicReport};
use crate::module::ModuleInstance;
use crate::startup::{InitializationState, StartupPhase};

/// Default name of the hook-installation function exported by the module.
pub const DEFAULT_PANIC_EXPORT: &str = "setup_panic";

/// Set once the process-wide hook is in place.
static HOOK_INSTALLED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// Installation attempted before the module finished initializing.
    #[error("panic bridge installed before module initialization completed (phase: {phase})")]
    Premature { phase: StartupPhase },

    #[error("panic bridge is already installed in this process")]
    AlreadyInstalled,

    #[error("module does not export panic hook `{export}`")]
    HookMissing { export: String },

    #[error("module panic hook `{export}` failed: {cause}")]
    HookFailed { export: String, cause: String },
}

/// Installs the panic-to-diagnostic bridge.
pub trait PanicBridge {
    /// Install the bridge. `state` must be `Ready`.
    fn install(&mut self, state: &InitializationState) -> Result<(), BridgeError>;
}

/// Bridge backed by `std::panic::set_hook`.
pub struct ProcessPanicBridge {
    sink: Arc<dyn DiagnosticSink>,
    required_export: Option<String>,
}

impl ProcessPanicBridge {
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            sink,
            required_export: Some(DEFAULT_PANIC_EXPORT.to_string()),
        }
    }

    /// Require a differently named hook export, or none at all.
    pub fn with_required_export(mut self, export: Option<String>) -> Self {
        self.required_export = export;
        self
    }

    fn report_traps(&self, instance: &ModuleInstance) {
        let sink = self.sink.clone();
        let observed = instance.observe_traps(Arc::new(move |export: &str, err: &wasmtime::Error| {
            sink.emit(DiagnosticEvent::Panic(trap_report(export, err)));
        }));
        if !observed {
            debug!("Module traps are already being reported");
        }
    }
}

impl PanicBridge for ProcessPanicBridge {
    fn install(&mut self, state: &InitializationState) -> Result<(), BridgeError> {
        let Some(module) = state.module() else {
            return Err(BridgeError::Premature {
                phase: state.phase(),
            });
        };

        if let Some(export) = &self.required_export {
            let instance = module
                .instance()
                .filter(|_| module.has_export(export))
                .ok_or_else(|| BridgeError::HookMissing {
                    export: export.clone(),
                })?;

            self.report_traps(instance);
            instance.call(export).map_err(|e| BridgeError::HookFailed {
                export: export.clone(),
                cause: e.to_string(),
            })?;
            debug!("Module panic hook `{}` installed", export);
        } else if let Some(instance) = module.instance() {
            self.report_traps(instance);
        }

        if HOOK_INSTALLED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(BridgeError::AlreadyInstalled);
        }

        let sink = self.sink.clone();
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            sink.emit_nonblocking(DiagnosticEvent::Panic(panic_report(info)));
            previous(info);
        }));

        info!("🛡️  Panic bridge installed");
        Ok(())
    }
}

/// Extract message and location from a panic.
pub fn panic_report(info: &PanicHookInfo<'_>) -> PanicReport {
    let payload = info.payload();
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    };

    let location = info
        .location()
        .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
        .unwrap_or_else(|| "unknown location".to_string());

    PanicReport {
        message,
        location,
        timestamp: Utc::now().to_rfc3339(),
    }
}

/// Describe a trap returned from a call into the module.
pub fn trap_report(export: &str, err: &wasmtime::Error) -> PanicReport {
    let message = match err.downcast_ref::<Trap>() {
        Some(trap) => format!("{} in export `{}`", trap, export),
        None => format!("{:#} in export `{}`", err, export),
    };

    let location = err
        .downcast_ref::<WasmBacktrace>()
        .and_then(|trace| trace.frames().first())
        .map(|frame| match frame.func_name() {
            Some(name) => format!("wasm function `{}`", name),
            None => format!("wasm function #{}", frame.func_index()),
        })
        .unwrap_or_else(|| format!("wasm export `{}`", export));

    PanicReport {
        message,
        location,
        timestamp: Utc::now().to_rfc3339(),
    }
}
