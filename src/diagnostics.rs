//! Diagnostics sink for startup and panic events.
//!
//! Every observable thing the sequencer does (module init finished or failed,
//! bridge installation failed, panic or trap captured, UI mounted) is emitted
//! as a [`DiagnosticEvent`] to a [`DiagnosticSink`]. The default sink forwards
//! events to `tracing`, so the duration line shows up on the console like any
//! other log line, while tests swap in a recording sink and assert on the
//! events directly.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::sync::{Arc, Mutex, TryLockError};
#[cfg(test)]
use std::sync::MutexGuard;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Panic captured by the panic bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanicReport {
    pub message: String,
    pub location: String,
    pub timestamp: String,
}

/// A structured diagnostic event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    /// Module initialization (including panic bridge installation) finished.
    InitCompleted { elapsed_ms: f64 },
    /// Module initialization failed; nothing will be mounted.
    InitFailed { cause: String },
    /// The panic bridge could not be installed; nothing will be mounted.
    BridgeFailed { cause: String },
    /// A host panic or a module trap was intercepted by the bridge.
    Panic(PanicReport),
    /// The UI root was attached to the host element.
    Mounted { target: String, root: String },
}

impl DiagnosticEvent {
    pub fn init_completed(elapsed: Duration) -> Self {
        DiagnosticEvent::InitCompleted {
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        }
    }

    /// Short name used in logs and JSON output
    pub fn name(&self) -> &'static str {
        match self {
            DiagnosticEvent::InitCompleted { .. } => "init_completed",
            DiagnosticEvent::InitFailed { .. } => "init_failed",
            DiagnosticEvent::BridgeFailed { .. } => "bridge_failed",
            DiagnosticEvent::Panic(_) => "panic",
            DiagnosticEvent::Mounted { .. } => "mounted",
        }
    }
}

/// Receiver for diagnostic events.
///
/// Implementations must not panic.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, event: DiagnosticEvent);

    /// Emit from inside the process panic hook. The panicking thread may
    /// already hold a lock this sink uses, so this must never block; dropping
    /// the event is acceptable.
    fn emit_nonblocking(&self, event: DiagnosticEvent) {
        self.emit(event)
    }
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for Arc<T> {
    fn emit(&self, event: DiagnosticEvent) {
        (**self).emit(event)
    }

    fn emit_nonblocking(&self, event: DiagnosticEvent) {
        (**self).emit_nonblocking(event)
    }
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, event: DiagnosticEvent) {
        match event {
            DiagnosticEvent::InitCompleted { elapsed_ms } => {
                info!("Call to module init took {:.3} milliseconds", elapsed_ms);
            }
            DiagnosticEvent::InitFailed { cause } => {
                error!("❌ Module initialization failed: {}", cause);
            }
            DiagnosticEvent::BridgeFailed { cause } => {
                error!("❌ Panic bridge installation failed: {}", cause);
            }
            DiagnosticEvent::Panic(report) => {
                error!(
                    location = %report.location,
                    "💥 Panic in computational module: {}", report.message
                );
            }
            DiagnosticEvent::Mounted { target, root } => {
                info!("✅ Mounted <{}> into #{}", root, target);
            }
        }
    }
}

/// Keeps every event in memory.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<DiagnosticEvent>>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock must not disable recording for the
    // rest of the process.
    fn lock(&self) -> MutexGuard<'_, Vec<DiagnosticEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of all recorded events
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.lock().clone()
    }

    /// Number of recorded events with the given name
    pub fn count(&self, name: &str) -> usize {
        self.lock().iter().filter(|e| e.name() == name).count()
    }
}

#[cfg(test)]
impl DiagnosticSink for RecordingSink {
    fn emit(&self, event: DiagnosticEvent) {
        self.lock().push(event);
    }
}

/// Serializes each event as one JSON object per line.
pub struct JsonLinesSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesSink {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    at: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a DiagnosticEvent,
}

fn write_line(writer: &mut dyn Write, event: &DiagnosticEvent) {
    let line = JsonLine {
        at: Utc::now(),
        event,
    };
    let encoded = match serde_json::to_string(&line) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!("Failed to encode {} event: {}", event.name(), e);
            return;
        }
    };

    if let Err(e) = writeln!(writer, "{}", encoded).and_then(|_| writer.flush()) {
        warn!("Failed to write {} event: {}", event.name(), e);
    }
}

impl DiagnosticSink for JsonLinesSink {
    fn emit(&self, event: DiagnosticEvent) {
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        write_line(&mut **writer, &event);
    }

    fn emit_nonblocking(&self, event: DiagnosticEvent) {
        let mut writer = match self.writer.try_lock() {
            Ok(writer) => writer,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            // Held by the panicking thread itself (a writer panicked mid-write)
            Err(TryLockError::WouldBlock) => return,
        };
        write_line(&mut **writer, &event);
    }
}

/// Broadcasts every event to several sinks.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn DiagnosticSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl DiagnosticSink for FanoutSink {
    fn emit(&self, event: DiagnosticEvent) {
        debug!("Dispatching {} event to {} sink(s)", event.name(), self.sinks.len());
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }

    fn emit_nonblocking(&self, event: DiagnosticEvent) {
        for sink in &self.sinks {
            sink.emit_nonblocking(event.clone());
        }
    }
}
