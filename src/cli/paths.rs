use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// File served for a directory, like a static web server would.
const INDEX_FILE: &str = "index.html";

/// Resolve the host document path. A directory resolves to its `index.html`.
pub fn resolve_document(document: &Path) -> Result<PathBuf> {
    let path = if document.is_dir() {
        document.join(INDEX_FILE)
    } else {
        document.to_path_buf()
    };

    path.canonicalize()
        .with_context(|| format!("Host document not found: {}", path.display()))
}
