// src/config.rs
//! Configuration file parsing
//!
//! Supports an optional TOML file with the following sections:
//! - [paths] - Definitions tree, install root, cache directory
//! - [registry] - Remote registry URL
//! - [fetch] - Retry and timeout settings
//! - [batch] - Parallelism
//! - [cache] - Eviction age
//!
//! Every field has a default, so an empty file (or no file) is valid.

use crate::fetch::RetryPolicy;
use crate::fetch::retry::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS};
use crate::pipeline::DEFAULT_JOBS;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "stubkit.toml";

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsSection,

    #[serde(default)]
    pub registry: RegistrySection,

    #[serde(default)]
    pub fetch: FetchSection,

    #[serde(default)]
    pub batch: BatchSection,

    #[serde(default)]
    pub cache: CacheSection,
}

/// [paths]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PathsSection {
    /// Root of the definitions tree
    #[serde(default = "default_definitions")]
    pub definitions: PathBuf,

    /// Where stubs are installed in the consumer project
    #[serde(default = "default_install")]
    pub install: PathBuf,

    /// Local cache directory
    #[serde(default = "default_cache_dir")]
    pub cache: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            definitions: default_definitions(),
            install: default_install(),
            cache: default_cache_dir(),
        }
    }
}

/// [registry]
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RegistrySection {
    /// Base URL; when absent stubs are read from the local definitions tree
    #[serde(default)]
    pub url: Option<String>,
}

/// [fetch]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FetchSection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl FetchSection {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// [batch]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BatchSection {
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
        }
    }
}

/// [cache]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CacheSection {
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            max_age_days: default_max_age_days(),
        }
    }
}

fn default_definitions() -> PathBuf {
    PathBuf::from("definitions")
}

fn default_install() -> PathBuf {
    PathBuf::from("flow-typed")
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("stubkit")
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}

fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_jobs() -> usize {
    DEFAULT_JOBS
}

fn default_max_age_days() -> u32 {
    30
}

impl Config {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load `explicit` if given, else `./stubkit.toml` if it exists, else defaults
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.fetch.max_attempts == 0 {
            anyhow::bail!("fetch.max_attempts must be at least 1");
        }
        if self.fetch.base_delay_ms > self.fetch.max_delay_ms {
            anyhow::bail!(
                "fetch.base_delay_ms ({}) must be <= fetch.max_delay_ms ({})",
                self.fetch.base_delay_ms,
                self.fetch.max_delay_ms
            );
        }
        if self.fetch.timeout_secs == 0 {
            anyhow::bail!("fetch.timeout_secs must be at least 1");
        }
        if self.batch.jobs == 0 {
            anyhow::bail!("batch.jobs must be at least 1");
        }
        if let Some(url) = &self.registry.url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            anyhow::bail!("registry.url must be an http(s) URL, got {}", url);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.paths.definitions, PathBuf::from("definitions"));
        assert_eq!(config.paths.install, PathBuf::from("flow-typed"));
        assert!(config.paths.cache.ends_with("stubkit"));
        assert_eq!(config.registry.url, None);
        assert_eq!(config.fetch.retry_policy(), RetryPolicy::default());
        assert_eq!(config.batch.jobs, 4);
        assert_eq!(config.cache.max_age_days, 30);
        config.validate().unwrap();
    }

    #[test]
    fn test_full_config() {
        let config: Config = toml::from_str(
            r#"
            [paths]
            definitions = "/srv/defs"
            install = "types"
            cache = "/tmp/stubcache"

            [registry]
            url = "https://registry.example.com/defs"

            [fetch]
            max_attempts = 5
            base_delay_ms = 50
            max_delay_ms = 800
            timeout_secs = 10

            [batch]
            jobs = 16

            [cache]
            max_age_days = 7
            "#,
        )
        .unwrap();

        config.validate().unwrap();
        assert_eq!(config.paths.definitions, PathBuf::from("/srv/defs"));
        assert_eq!(
            config.registry.url.as_deref(),
            Some("https://registry.example.com/defs")
        );
        assert_eq!(config.fetch.retry_policy().max_attempts, 5);
        assert_eq!(config.fetch.timeout(), Duration::from_secs(10));
        assert_eq!(config.batch.jobs, 16);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        for bad in [
            "[fetch]\nmax_attempts = 0",
            "[fetch]\nbase_delay_ms = 10000\nmax_delay_ms = 10",
            "[batch]\njobs = 0",
            "[registry]\nurl = \"ftp://example.com\"",
        ] {
            let config: Config = toml::from_str(bad).unwrap();
            assert!(config.validate().is_err(), "accepted: {bad}");
        }
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(toml::from_str::<Config>("[batch]\nworkers = 3").is_err());
    }

    #[test]
    fn test_load_reports_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[batch]\njobs = 0").unwrap();
        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("batch.jobs"));

        let err = Config::load(Path::new("/nonexistent/stubkit.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/stubkit.toml"));
    }
}
