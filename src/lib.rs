// src/lib.rs

//! Stubkit
//!
//! Resolves, caches, and installs versioned type-definition stubs from a
//! definitions tree into a consumer project.
//!
//! # Architecture
//!
//! - Index: the definitions tree is scanned once into typed entries; path
//!   names are never matched as strings after that
//! - Resolution: pure selection by version range, narrowest range wins, ties
//!   are reported instead of guessed
//! - Cache: content keyed by SHA-256 fingerprint, single fetch per
//!   fingerprint however many tasks ask for it
//! - Install: idempotent, never overwrites local changes without `force`
//! - Batch: bounded parallelism, per-package outcomes, one final report

pub mod cache;
pub mod config;
pub mod definitions;
mod error;
pub mod fetch;
pub mod hash;
pub mod installer;
pub mod pipeline;
pub mod resolver;
pub mod version;

pub use cache::{CacheEntry, CacheStore};
pub use definitions::{DefinitionEntry, DefinitionIndex, DefinitionScope, IndexBuildError};
pub use error::{Error, Result};
pub use fetch::{FetchError, StubFetcher};
pub use hash::Fingerprint;
pub use installer::{InstallError, InstallReport, InstallStatus, Installer};
pub use pipeline::{BatchReport, PackageOutcome, Pipeline};
pub use resolver::{ResolutionRequest, ResolutionResult, resolve};
pub use version::{RangeParseError, VersionRange};
