//! Startup configuration assembled from CLI flags and environment variables.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::bridge::DEFAULT_PANIC_EXPORT;
use crate::module::ModuleSource;
use crate::mount::{MountTarget, RootComponent, DEFAULT_MOUNT_TARGET, DEFAULT_ROOT_COMPONENT};

/// Environment variable naming the module artifact
pub const MODULE_ENV: &str = "BOOTSEQ_MODULE";
/// Environment variable naming the host document
pub const DOCUMENT_ENV: &str = "BOOTSEQ_DOCUMENT";
/// Environment variable naming the mount target id
pub const MOUNT_TARGET_ENV: &str = "BOOTSEQ_MOUNT_TARGET";
/// Environment variable bounding module initialization, in milliseconds
pub const INIT_TIMEOUT_ENV: &str = "BOOTSEQ_INIT_TIMEOUT_MS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unsupported module location `{0}` (expected a file path or an http(s) URL)")]
    UnsupportedModuleSource(String),

    #[error("mount target id must not be empty")]
    EmptyMountTarget,

    #[error("mount target id `{0}` must not contain whitespace or quotes")]
    InvalidMountTarget(String),

    #[error("root component name must not be empty")]
    EmptyRootComponent,

    #[error("init timeout must be greater than zero")]
    ZeroTimeout,
}

/// Everything needed to build a sequencer.
#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub module: ModuleSource,
    pub document: PathBuf,
    pub mount_target: MountTarget,
    pub root_component: RootComponent,
    /// Hook export the module must provide; `None` skips the check
    pub panic_export: Option<String>,
    /// Stub unresolved imports instead of failing instantiation
    pub trap_unknown_imports: bool,
    pub init_timeout: Option<Duration>,
    pub output: Option<PathBuf>,
    pub events: Option<PathBuf>,
}

impl StartupConfig {
    /// Config with defaults for everything except the two required inputs.
    pub fn new(module: &str, document: PathBuf) -> Result<Self, ConfigError> {
        let module = ModuleSource::parse(module)
            .ok_or_else(|| ConfigError::UnsupportedModuleSource(module.to_string()))?;

        Ok(Self {
            module,
            document,
            mount_target: MountTarget::new(DEFAULT_MOUNT_TARGET),
            root_component: RootComponent::new(DEFAULT_ROOT_COMPONENT),
            panic_export: Some(DEFAULT_PANIC_EXPORT.to_string()),
            trap_unknown_imports: false,
            init_timeout: None,
            output: None,
            events: None,
        })
    }

    pub fn with_init_timeout_ms(mut self, millis: Option<u64>) -> Result<Self, ConfigError> {
        self.init_timeout = match millis {
            Some(0) => return Err(ConfigError::ZeroTimeout),
            Some(ms) => Some(Duration::from_millis(ms)),
            None => None,
        };
        Ok(self)
    }

    /// Check values that clap cannot check on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        let target = self.mount_target.id();
        if target.is_empty() {
            return Err(ConfigError::EmptyMountTarget);
        }
        if target.chars().any(|c| c.is_whitespace() || c == '"' || c == '\'') {
            return Err(ConfigError::InvalidMountTarget(target.to_string()));
        }
        if self.root_component.name().trim().is_empty() {
            return Err(ConfigError::EmptyRootComponent);
        }
        Ok(())
    }
}
