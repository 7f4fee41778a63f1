// src/fetch/local.rs
//! Filesystem fetcher
//!
//! Reads stubs from a local checkout of the definitions tree. This is the
//! default transport when no registry URL is configured.

use super::{FetchError, FetchRequest, StubFetcher};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Fetch stubs from a definitions root on disk
pub struct LocalFetcher {
    root: PathBuf,
}

impl LocalFetcher {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Resolve a relative stub path under the root, refusing to escape it
    fn stub_path(&self, relative: &str) -> Option<PathBuf> {
        let rel = Path::new(relative);
        if rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            Some(self.root.join(rel))
        } else {
            None
        }
    }
}

#[async_trait]
impl StubFetcher for LocalFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<u8>, FetchError> {
        let path = self
            .stub_path(&request.relative_path)
            .ok_or_else(|| FetchError::Malformed {
                path: request.relative_path.clone(),
                message: "path escapes the definitions root".to_string(),
            })?;

        debug!("Reading stub from {}", path.display());
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => FetchError::NotFound(request.relative_path.clone()),
            _ => FetchError::Io {
                path: request.relative_path.clone(),
                message: e.to_string(),
            },
        })
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Fingerprint;
    use tempfile::TempDir;

    fn request(rel: &str) -> FetchRequest {
        FetchRequest {
            package_name: "left-pad".to_string(),
            relative_path: rel.to_string(),
            fingerprint: Fingerprint::of(b""),
        }
    }

    #[tokio::test]
    async fn test_reads_stub() {
        let dir = TempDir::new().unwrap();
        let rel = "npm/left-pad_v1.x.x/flow_all/left-pad_v1.x.x.js";
        std::fs::create_dir_all(dir.path().join("npm/left-pad_v1.x.x/flow_all")).unwrap();
        std::fs::write(dir.path().join(rel), b"stub").unwrap();

        let fetcher = LocalFetcher::new(dir.path());
        assert_eq!(fetcher.fetch(&request(rel)).await.unwrap(), b"stub");
    }

    #[tokio::test]
    async fn test_missing_stub_is_not_found() {
        let dir = TempDir::new().unwrap();
        let fetcher = LocalFetcher::new(dir.path());
        let err = fetcher.fetch(&request("npm/nope.js")).await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let fetcher = LocalFetcher::new(dir.path());
        for bad in ["../secret.js", "/etc/passwd", "npm/../../x.js"] {
            let err = fetcher.fetch(&request(bad)).await.unwrap_err();
            assert!(matches!(err, FetchError::Malformed { .. }), "{bad}");
        }
    }
}
