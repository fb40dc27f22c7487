//! Process-wide startup record.
//!
//! The sequencer publishes a [`StartupReport`] once the UI root is mounted.
//! Anything else in the process can then ask whether startup completed and
//! which module it is running against:
//!
//! ```ignore
//! // At startup (done by the sequencer):
//! set_report(report);
//!
//! // Anywhere else:
//! if let Some(report) = get_report() {
//!     debug!("running module {}", report.module.source);
//! }
//! ```

use serde::Serialize;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::module::LoadedModule;

/// Summary of a completed startup.
#[derive(Debug, Clone, Serialize)]
pub struct StartupReport {
    pub run_id: Uuid,
    pub module: LoadedModule,
    pub init_elapsed_ms: f64,
    pub mount_target: String,
}

/// Global startup report.
static REPORT: OnceLock<StartupReport> = OnceLock::new();

/// Publish the startup report.
///
/// Only the first call per process takes effect; later calls are ignored.
pub fn set_report(report: StartupReport) {
    if REPORT.set(report).is_err() {
        tracing::warn!("Attempting to publish a startup report when one already exists. Keeping existing.");
    }
}

/// Get the startup report, `None` until startup completed.
pub fn get_report() -> Option<&'static StartupReport> {
    REPORT.get()
}
