//! Computational module initialization.
//!
//! The computational module is consumed as an opaque asynchronous
//! initializer. [`ModuleInitializer`] is that seam; [`WasmModuleInitializer`]
//! is the production implementation that loads a WebAssembly artifact from
//! disk or over HTTP and compiles it with wasmtime.

mod artifact;
mod instance;
mod wasm;

pub use artifact::ModuleSource;
pub use instance::ModuleInstance;
pub use wasm::WasmModuleInitializer;
#[cfg(test)]
pub(crate) use wasm::instantiate_wat;

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while bringing the computational module up.
#[derive(Debug, Error)]
pub enum ModuleLoadError {
    #[error("failed to read module artifact {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch module artifact {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("module artifact {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("malformed module binary: {0}")]
    Malformed(String),

    #[error("module instantiation failed: {0}")]
    Instantiate(String),

    #[error("module initialization timed out after {0:?}")]
    TimedOut(Duration),
}

/// Kind of an exported item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Function,
    Memory,
    Table,
    Global,
    Other,
}

impl std::fmt::Display for ExportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExportKind::Function => "func",
            ExportKind::Memory => "memory",
            ExportKind::Table => "table",
            ExportKind::Global => "global",
            ExportKind::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// A single export of the loaded module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleExport {
    pub name: String,
    pub kind: ExportKind,
}

/// Description of a successfully initialized module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadedModule {
    /// Where the artifact came from (path or URL)
    pub source: String,
    pub size_bytes: usize,
    pub import_count: usize,
    pub exports: Vec<ModuleExport>,
    #[serde(skip)]
    instance: Option<ModuleInstance>,
}

impl LoadedModule {
    /// Description without a live instance
    #[cfg(test)]
    pub fn new(source: impl Into<String>, exports: Vec<ModuleExport>) -> Self {
        Self {
            source: source.into(),
            size_bytes: 0,
            import_count: 0,
            exports,
            instance: None,
        }
    }

    /// The live instance, present for modules that were actually instantiated
    pub fn instance(&self) -> Option<&ModuleInstance> {
        self.instance.as_ref()
    }

    /// Check whether the module exports a function with this name
    pub fn has_export(&self, name: &str) -> bool {
        self.exports
            .iter()
            .any(|e| e.name == name && e.kind == ExportKind::Function)
    }
}

/// One-shot asynchronous initializer for the computational module.
///
/// The sequencer calls `initialize` at most once per process.
#[async_trait]
pub trait ModuleInitializer: Send {
    async fn initialize(&mut self) -> Result<LoadedModule, ModuleLoadError>;
}
