// src/cache/mod.rs

//! Local stub cache
//!
//! Fetched stub content is stored by fingerprint, the way git stores objects:
//!
//! ```text
//! <cache>/objects/{first2}/{rest}        stub bytes
//! <cache>/objects/{first2}/{rest}.meta   JSON sidecar with the fetch time
//! ```
//!
//! The cache is an optimization only: deleting it never changes what gets
//! installed. Content is verified against its fingerprint both when fetched
//! and when read back, so a corrupt object is discarded and fetched again.
//! Failed fetches are never recorded. Eviction is by age or by clearing
//! everything.

pub mod coalesce;

pub use coalesce::RequestCoalescer;

use crate::fetch::FetchError;
use crate::hash::Fingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Subdirectory holding cached objects
const OBJECTS_DIR: &str = "objects";
/// Extension of the metadata sidecar
const META_EXTENSION: &str = "meta";

/// A cached stub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub content: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

/// Sidecar stored next to each object
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheMeta {
    fetched_at: DateTime<Utc>,
    size: u64,
}

/// Counters for one cache instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests served from disk
    pub hits: u64,
    /// Underlying fetches actually performed
    pub fetches: u64,
    /// Requests that shared another request's in-flight fetch
    pub coalesced: u64,
}

/// Result of an eviction or clear
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    pub removed: usize,
    pub kept: usize,
    pub bytes_freed: u64,
}

/// Fingerprint-keyed store for fetched stub content
pub struct CacheStore {
    root: PathBuf,
    inflight: RequestCoalescer<Result<Vec<u8>, FetchError>>,
    hits: AtomicU64,
    fetches: AtomicU64,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("root", &self.root)
            .field("hits", &self.hits)
            .field("fetches", &self.fetches)
            .finish_non_exhaustive()
    }
}

impl CacheStore {
    /// Open (creating if needed) a cache rooted at `root`
    pub fn open(root: impl AsRef<Path>) -> crate::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let objects = root.join(OBJECTS_DIR);
        if !objects.exists() {
            fs::create_dir_all(&objects)?;
            debug!("Created cache directory: {}", objects.display());
        }

        Ok(Self {
            root,
            inflight: RequestCoalescer::new(),
            hits: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Storage path: objects/{first2}/{rest}
    fn object_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        let (prefix, rest) = fingerprint.as_str().split_at(2);
        self.root.join(OBJECTS_DIR).join(prefix).join(rest)
    }

    fn meta_path(object: &Path) -> PathBuf {
        object.with_extension(META_EXTENSION)
    }

    /// Return the content for `fingerprint`, fetching it on a miss
    ///
    /// Concurrent calls for the same fingerprint share a single fetch. Fetched
    /// bytes must hash to `fingerprint`; anything else is
    /// [`FetchError::Malformed`] and is not stored.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        fingerprint: &Fingerprint,
        fetch: F,
    ) -> Result<Vec<u8>, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, FetchError>>,
    {
        if let Some(entry) = self.get(fingerprint).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(entry.content);
        }

        self.inflight
            .coalesce(fingerprint.as_str(), move || async move {
                // Another flight may have filled the cache since the check above
                if let Some(entry) = self.get(fingerprint).await {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(entry.content);
                }

                self.fetches.fetch_add(1, Ordering::Relaxed);
                let data = fetch().await?;

                if !fingerprint.matches(&data) {
                    return Err(FetchError::Malformed {
                        path: fingerprint.short().to_string(),
                        message: format!(
                            "content hashes to {}, expected {}",
                            Fingerprint::of(&data).short(),
                            fingerprint.short()
                        ),
                    });
                }

                if let Err(e) = self.put(fingerprint, &data).await {
                    warn!("Failed to cache {}: {}", fingerprint.short(), e);
                }
                Ok(data)
            })
            .await
    }

    /// Read a cached entry, discarding it if its content no longer matches
    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        let path = self.object_path(fingerprint);
        let content = tokio::fs::read(&path).await.ok()?;

        if !fingerprint.matches(&content) {
            warn!("Discarding corrupt cache object {}", path.display());
            let _ = tokio::fs::remove_file(&path).await;
            let _ = tokio::fs::remove_file(Self::meta_path(&path)).await;
            return None;
        }

        let fetched_at = match tokio::fs::read(Self::meta_path(&path)).await {
            Ok(raw) => serde_json::from_slice::<CacheMeta>(&raw)
                .map(|meta| meta.fetched_at)
                .ok(),
            Err(_) => None,
        }
        .or_else(|| modified_time(&path))
        .unwrap_or_else(Utc::now);

        debug!("Cache hit: {}", fingerprint.short());
        Some(CacheEntry {
            fingerprint: fingerprint.clone(),
            content,
            fetched_at,
        })
    }

    /// Store content under its fingerprint
    ///
    /// Written to a temporary file and renamed into place so readers never see
    /// a partial object.
    pub async fn put(&self, fingerprint: &Fingerprint, data: &[u8]) -> io::Result<()> {
        let path = self.object_path(fingerprint);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = path.with_extension(format!("tmp.{:08x}", rand::random::<u32>()));
        tokio::fs::write(&temp_path, data).await?;
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }

        let meta = CacheMeta {
            fetched_at: Utc::now(),
            size: data.len() as u64,
        };
        let json = serde_json::to_vec(&meta).map_err(io::Error::other)?;
        tokio::fs::write(Self::meta_path(&path), json).await?;

        debug!("Cached {} ({} bytes)", fingerprint.short(), data.len());
        Ok(())
    }

    /// Remove entries fetched more than `max_age` ago
    pub fn evict_older_than(&self, max_age: chrono::Duration) -> io::Result<EvictionReport> {
        let cutoff = Utc::now() - max_age;
        self.evict(|fetched_at| fetched_at < cutoff)
    }

    /// Remove every entry
    pub fn clear(&self) -> io::Result<EvictionReport> {
        self.evict(|_| true)
    }

    fn evict(&self, should_remove: impl Fn(DateTime<Utc>) -> bool) -> io::Result<EvictionReport> {
        let mut report = EvictionReport::default();
        let objects = self.root.join(OBJECTS_DIR);
        if !objects.exists() {
            return Ok(report);
        }

        for entry in WalkDir::new(&objects).min_depth(2).max_depth(2) {
            let entry = entry.map_err(io::Error::from)?;
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if name.contains(".tmp.") {
                // Leftover from an interrupted write
                let _ = fs::remove_file(path);
                continue;
            }
            if path.extension().is_some_and(|ext| ext == META_EXTENSION) {
                continue;
            }

            let fetched_at = read_meta(path)
                .map(|meta| meta.fetched_at)
                .or_else(|| modified_time(path))
                .unwrap_or_else(Utc::now);
            if !should_remove(fetched_at) {
                report.kept += 1;
                continue;
            }

            report.bytes_freed += entry.metadata().map(|m| m.len()).unwrap_or(0);
            fs::remove_file(path)?;
            match fs::remove_file(Self::meta_path(path)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
            report.removed += 1;
        }

        info!(
            "Cache eviction: removed {}, kept {}, freed {} bytes",
            report.removed, report.kept, report.bytes_freed
        );
        Ok(report)
    }

    /// Hit, fetch and coalescing counters since this store was opened
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            coalesced: self.inflight.coalesced_count(),
        }
    }
}

fn read_meta(object: &Path) -> Option<CacheMeta> {
    let raw = fs::read(CacheStore::meta_path(object)).ok()?;
    serde_json::from_slice(&raw).ok()
}

fn modified_time(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}
