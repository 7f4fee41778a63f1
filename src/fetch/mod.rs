// src/fetch/mod.rs
//! Stub content transports
//!
//! A [`StubFetcher`] turns a resolved definition entry into bytes. Backends:
//! - [`LocalFetcher`] - reads straight from a definitions tree on disk
//! - [`HttpFetcher`] - downloads `<registry>/<relative path>`
//! - [`RetryingFetcher`] - wraps another fetcher with bounded retries
//!
//! Only the cache store calls fetchers; everything else goes through it.

pub mod http;
pub mod local;
pub mod retry;

pub use http::HttpFetcher;
pub use local::LocalFetcher;
pub use retry::{RetryPolicy, RetryingFetcher};

use crate::definitions::DefinitionEntry;
use crate::hash::Fingerprint;
use async_trait::async_trait;
use thiserror::Error;

/// What to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub package_name: String,
    /// `/`-separated path of the stub relative to the definitions root
    pub relative_path: String,
    /// Expected content fingerprint
    pub fingerprint: Fingerprint,
}

impl From<&DefinitionEntry> for FetchRequest {
    fn from(entry: &DefinitionEntry) -> Self {
        Self {
            package_name: entry.package_name.clone(),
            relative_path: entry.relative_path.clone(),
            fingerprint: entry.fingerprint.clone(),
        }
    }
}

/// Fetch failures
///
/// Cloneable so one failed fetch can be handed to every task waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Timeouts, connection failures, 5xx responses
    #[error("transient failure fetching {path}: {message}")]
    Transient { path: String, message: String },

    #[error("{0} not found in registry")]
    NotFound(String),

    /// Non-retryable HTTP status other than 404
    #[error("registry rejected {path} with HTTP {status}")]
    Rejected { path: String, status: u16 },

    /// Content arrived but is not what the index describes
    #[error("malformed content for {path}: {message}")]
    Malformed { path: String, message: String },

    #[error("I/O error reading {path}: {message}")]
    Io { path: String, message: String },

    #[error("gave up on {path} after {attempts} attempts: {last}")]
    Exhausted {
        path: String,
        attempts: u32,
        last: String,
    },
}

impl FetchError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

/// A source of stub content
#[async_trait]
pub trait StubFetcher: Send + Sync {
    /// Fetch the bytes of one stub
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<u8>, FetchError>;

    /// Name for log lines
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_errors_retry() {
        let path = "npm/x_v1.x.x/flow_all/x_v1.x.x.js".to_string();
        assert!(
            FetchError::Transient {
                path: path.clone(),
                message: "timeout".into()
            }
            .is_transient()
        );
        assert!(!FetchError::NotFound(path.clone()).is_transient());
        assert!(
            !FetchError::Rejected {
                path: path.clone(),
                status: 403
            }
            .is_transient()
        );
        assert!(
            !FetchError::Malformed {
                path,
                message: "bad".into()
            }
            .is_transient()
        );
    }
}
