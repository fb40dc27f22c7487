use std::fmt;
use std::path::PathBuf;
use tracing::debug;
use url::Url;

use super::ModuleLoadError;

/// Location of the module artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSource {
    Path(PathBuf),
    Url(Url),
}

impl ModuleSource {
    /// Classify user input: `http(s)://` URLs are fetched, anything else is
    /// treated as a filesystem path.
    ///
    /// Returns `None` for URLs with a scheme we cannot fetch (e.g. `ftp://`).
    /// Single-letter schemes are Windows drive letters, not URLs.
    pub fn parse(input: &str) -> Option<Self> {
        match Url::parse(input) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Some(ModuleSource::Url(url)),
            Ok(url) if url.scheme().len() > 1 && url.scheme() != "file" => None,
            Ok(url) if url.scheme() == "file" => url.to_file_path().ok().map(ModuleSource::Path),
            _ => Some(ModuleSource::Path(PathBuf::from(input))),
        }
    }

    /// Read the raw artifact bytes. A single attempt; failures are not retried.
    pub(super) async fn fetch(&self, client: &reqwest::Client) -> Result<Vec<u8>, ModuleLoadError> {
        match self {
            ModuleSource::Path(path) => {
                debug!("Reading module artifact from {:?}", path);
                tokio::fs::read(path)
                    .await
                    .map_err(|source| ModuleLoadError::Read {
                        path: path.clone(),
                        source,
                    })
            }
            ModuleSource::Url(url) => {
                debug!("Fetching module artifact from {}", url);
                let fetch_err = |source| ModuleLoadError::Fetch {
                    url: url.to_string(),
                    source,
                };

                let response = client.get(url.clone()).send().await.map_err(fetch_err)?;
                let status = response.status();
                if !status.is_success() {
                    return Err(ModuleLoadError::HttpStatus {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }

                let bytes = response.bytes().await.map_err(fetch_err)?;
                Ok(bytes.to_vec())
            }
        }
    }
}

impl fmt::Display for ModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleSource::Path(path) => write!(f, "{}", path.display()),
            ModuleSource::Url(url) => write!(f, "{}", url),
        }
    }
}
