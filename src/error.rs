// src/error.rs

//! Crate-level error type
//!
//! Each component has its own error enum; this wraps them for callers that
//! drive several components at once.

use crate::definitions::IndexBuildError;
use crate::fetch::FetchError;
use crate::installer::InstallError;
use crate::version::RangeParseError;
use thiserror::Error;

/// Result type for stubkit operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed version or version range
    #[error(transparent)]
    Parse(#[from] RangeParseError),

    /// The definitions tree could not be indexed
    #[error(transparent)]
    Index(#[from] IndexBuildError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Install(#[from] InstallError),

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// A component could not be set up
    #[error("initialization failed: {0}")]
    Init(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
