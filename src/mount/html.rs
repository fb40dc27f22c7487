//! HTML shell document used as the mount host.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

use super::{HostElement, MountError, MountHost, RootComponent};

/// Opening tags carrying an `id` attribute.
fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)<([a-z][a-z0-9-]*)\b[^>]*?\sid\s*=\s*["']([^"']+)["'][^>]*>"#)
            .expect("id pattern is a valid regex")
    })
}

/// An HTML document with its id-carrying elements indexed.
pub struct HtmlDocument {
    html: String,
    elements: HashMap<String, HostElement>,
    mounted_into: Option<String>,
}

impl HtmlDocument {
    pub fn parse(html: impl Into<String>) -> Self {
        let html = html.into();
        let mut elements = HashMap::new();

        for caps in id_pattern().captures_iter(&html) {
            let (Some(whole), Some(tag), Some(id)) = (caps.get(0), caps.get(1), caps.get(2)) else {
                continue;
            };
            // Self-closing elements cannot host children
            if whole.as_str().ends_with("/>") {
                continue;
            }
            if elements.contains_key(id.as_str()) {
                warn!("Duplicate element id #{} in document, keeping the first", id.as_str());
                continue;
            }
            elements.insert(
                id.as_str().to_string(),
                HostElement {
                    id: id.as_str().to_string(),
                    tag: tag.as_str().to_ascii_lowercase(),
                    content_offset: whole.end(),
                },
            );
        }

        debug!("Indexed {} element(s) with an id", elements.len());
        Self {
            html,
            elements,
            mounted_into: None,
        }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let html = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read host document: {:?}", path))?;
        Ok(Self::parse(html))
    }

    #[cfg(test)]
    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn into_html(self) -> String {
        self.html
    }

    /// Id of the element the root was mounted into, if any
    #[cfg(test)]
    pub fn mounted_into(&self) -> Option<&str> {
        self.mounted_into.as_deref()
    }
}

impl MountHost for HtmlDocument {
    fn element_by_id(&self, id: &str) -> Option<HostElement> {
        self.elements.get(id).cloned()
    }

    fn attach(&mut self, host: &HostElement, root: &RootComponent) -> Result<(), MountError> {
        if let Some(existing) = &self.mounted_into {
            return Err(MountError::AlreadyMounted(existing.clone()));
        }
        let element = self
            .elements
            .get(&host.id)
            .filter(|known| *known == host)
            .ok_or_else(|| MountError::UnknownElement(host.id.clone()))?;

        self.html.insert_str(element.content_offset, &root.render());
        self.mounted_into = Some(host.id.clone());
        debug!("Inserted <{}> into <{} id=\"{}\">", root.name(), host.tag, host.id);
        Ok(())
    }
}
