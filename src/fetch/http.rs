// src/fetch/http.rs
//! HTTP registry fetcher
//!
//! A registry is any static file server that mirrors the definitions tree:
//! the stub at `npm/left-pad_v1.x.x/flow_all/left-pad_v1.x.x.js` is served at
//! `<registry>/npm/left-pad_v1.x.x/flow_all/left-pad_v1.x.x.js`.

use super::{FetchError, FetchRequest, StubFetcher};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use std::time::Duration;
use tracing::debug;

/// User agent sent with every request
const USER_AGENT: &str = concat!("stubkit/", env!("CARGO_PKG_VERSION"));

/// Fetch stubs from an HTTP registry
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpFetcher {
    /// Create a fetcher for `base_url` with a per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid registry URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "registry URL '{base_url}' cannot hold paths"
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Init(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, base_url })
    }

    /// URL for a stub, with each path segment percent-encoded
    fn stub_url(&self, relative: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(relative.split('/'));
        }
        url
    }

    fn classify_status(path: &str, status: StatusCode) -> FetchError {
        if status == StatusCode::NOT_FOUND {
            FetchError::NotFound(path.to_string())
        } else if status.is_server_error()
            || status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
        {
            FetchError::Transient {
                path: path.to_string(),
                message: format!("HTTP {status}"),
            }
        } else {
            FetchError::Rejected {
                path: path.to_string(),
                status: status.as_u16(),
            }
        }
    }

    fn classify_transport(path: &str, err: reqwest::Error) -> FetchError {
        if err.is_builder() {
            FetchError::Malformed {
                path: path.to_string(),
                message: err.to_string(),
            }
        } else {
            // Timeouts, connect failures and interrupted bodies
            FetchError::Transient {
                path: path.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl StubFetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> std::result::Result<Vec<u8>, FetchError> {
        let path = request.relative_path.as_str();
        let url = self.stub_url(path);
        debug!("Fetching stub via HTTP: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::classify_transport(path, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::classify_status(path, status));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Self::classify_transport(path, e))?;

        // Stubs are source text
        if std::str::from_utf8(&body).is_err() {
            return Err(FetchError::Malformed {
                path: path.to_string(),
                message: "content is not valid UTF-8".to_string(),
            });
        }

        Ok(body.to_vec())
    }

    fn name(&self) -> &str {
        "http"
    }
}
