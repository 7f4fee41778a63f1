// src/commands/cache.rs
//! Cache maintenance commands

use anyhow::{Context, Result};
use stubkit::cache::CacheStore;
use stubkit::config::Config;

fn open(config: &Config) -> Result<CacheStore> {
    CacheStore::open(&config.paths.cache)
        .with_context(|| format!("Failed to open cache at {}", config.paths.cache.display()))
}

/// Remove entries older than `max_age_days` (config default when `None`)
pub fn cmd_cache_prune(config: &Config, max_age_days: Option<u32>) -> Result<()> {
    let days = max_age_days.unwrap_or(config.cache.max_age_days);
    let report = open(config)?
        .evict_older_than(chrono::Duration::days(i64::from(days)))
        .context("Failed to prune cache")?;

    println!(
        "Removed {} cached stubs older than {} days ({} bytes), kept {}",
        report.removed, days, report.bytes_freed, report.kept
    );
    Ok(())
}

/// Remove every cached entry
pub fn cmd_cache_clean(config: &Config) -> Result<()> {
    let cache = open(config)?;
    let report = cache.clear().context("Failed to clear cache")?;

    println!(
        "Removed {} cached stubs ({} bytes) from {}",
        report.removed,
        report.bytes_freed,
        cache.root().display()
    );
    Ok(())
}
