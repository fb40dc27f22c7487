//! UI mount collaborator.
//!
//! The sequencer never renders anything itself: it looks the mount target up
//! in the host document and asks the host to attach the root component.

mod html;

pub use html::HtmlDocument;

use thiserror::Error;

/// Default host element id
pub const DEFAULT_MOUNT_TARGET: &str = "app";

/// Default root component name
pub const DEFAULT_ROOT_COMPONENT: &str = "App";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MountError {
    #[error("root component is already mounted into #{0}")]
    AlreadyMounted(String),

    #[error("element #{0} is not part of this document")]
    UnknownElement(String),
}

/// Logical identifier of the host location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountTarget(String);

impl MountTarget {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl Default for MountTarget {
    fn default() -> Self {
        Self::new(DEFAULT_MOUNT_TARGET)
    }
}

impl std::fmt::Display for MountTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to a host location returned by a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostElement {
    pub id: String,
    pub tag: String,
    /// Byte offset at which the element's children begin
    pub content_offset: usize,
}

/// The application's root component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootComponent {
    name: String,
}

impl RootComponent {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Placeholder element the UI layer hydrates.
    pub fn render(&self) -> String {
        format!(r#"<div data-root-component="{}"></div>"#, self.name)
    }
}

impl Default for RootComponent {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT_COMPONENT)
    }
}

/// Surrounding document: element lookup plus the mount action.
pub trait MountHost {
    fn element_by_id(&self, id: &str) -> Option<HostElement>;

    fn attach(&mut self, host: &HostElement, root: &RootComponent) -> Result<(), MountError>;
}
