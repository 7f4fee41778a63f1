// src/commands/install.rs
//! Stub installation command

use super::{build_requests, load_index};
use crate::cli::RequestArgs;
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use stubkit::cache::CacheStore;
use stubkit::config::Config;
use stubkit::fetch::{HttpFetcher, LocalFetcher, RetryingFetcher, StubFetcher};
use stubkit::installer::Installer;
use stubkit::pipeline::{BatchReport, PackageOutcome, Pipeline};
use tracing::info;

/// Command-line overrides for `install`
pub struct InstallOptions {
    pub force: bool,
    pub target: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub registry: Option<String>,
}

/// Resolve, fetch and install; returns whether every package succeeded
pub async fn cmd_install(
    config: &Config,
    request: &RequestArgs,
    options: InstallOptions,
) -> Result<bool> {
    let requests = build_requests(request)?;

    let definitions = request
        .definitions
        .clone()
        .unwrap_or_else(|| config.paths.definitions.clone());
    let target = options.target.unwrap_or_else(|| config.paths.install.clone());
    let jobs = options.jobs.unwrap_or(config.batch.jobs);
    let registry = options.registry.or_else(|| config.registry.url.clone());

    let index = load_index(&definitions)?;
    let cache = CacheStore::open(&config.paths.cache).with_context(|| {
        format!("Failed to open cache at {}", config.paths.cache.display())
    })?;

    let fetcher: Arc<dyn StubFetcher> = match registry {
        Some(url) => {
            info!("Fetching stubs from registry {}", url);
            let http = HttpFetcher::new(&url, config.fetch.timeout())?;
            Arc::new(RetryingFetcher::new(
                Arc::new(http),
                config.fetch.retry_policy(),
            ))
        }
        None => Arc::new(LocalFetcher::new(&definitions)),
    };

    let pipeline = Pipeline::new(
        Arc::new(index),
        Arc::new(cache),
        fetcher,
        Installer::new(&target, options.force),
    )
    .with_jobs(jobs);

    let report = pipeline.run(requests).await;
    print!("{}", render_report(&report));
    Ok(report.is_success())
}

/// Human-readable report: one line per package, then a summary
pub(crate) fn render_report(report: &BatchReport) -> String {
    let mut out = String::new();

    for package in &report.packages {
        let label = package.request.label();
        let status = package.outcome.label();
        let _ = match &package.outcome {
            PackageOutcome::Installed(install) | PackageOutcome::UpToDate(install) => writeln!(
                out,
                "  {:<12} {} -> {}",
                status,
                label,
                install.target.display()
            ),
            PackageOutcome::Ambiguous(candidates) => {
                let _ = writeln!(out, "  {:<12} {}, candidates:", status, label);
                for candidate in candidates {
                    let _ = writeln!(out, "{:>17}{}", "", candidate.relative_path);
                }
                Ok(())
            }
            PackageOutcome::NotFound => writeln!(out, "  {:<12} {}", status, label),
            PackageOutcome::Failed(reason) => {
                writeln!(out, "  {:<12} {}: {}", status, label, reason)
            }
        };
    }

    let summary = report.summary();
    let _ = writeln!(
        out,
        "\n{} installed, {} up to date, {} ambiguous, {} not found, {} failed",
        summary.installed, summary.up_to_date, summary.ambiguous, summary.not_found, summary.failed
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use stubkit::cache::CacheStats;
    use stubkit::pipeline::{FailureReason, PackageReport};
    use stubkit::resolver::ResolutionRequest;
    use stubkit::version::Version;

    #[test]
    fn test_render_report() {
        let request = |name: &str| {
            ResolutionRequest::package(name, Version::new(1, 0, 0), Version::new(0, 200, 0))
        };
        let report = BatchReport {
            packages: vec![
                PackageReport {
                    request: request("missing"),
                    entry: None,
                    outcome: PackageOutcome::NotFound,
                },
                PackageReport {
                    request: request("lodash"),
                    entry: None,
                    outcome: PackageOutcome::Failed(FailureReason::WouldOverwrite(
                        PathBuf::from("flow-typed/npm/lodash_v1.x.x.js"),
                    )),
                },
            ],
            cache: CacheStats::default(),
        };

        let text = render_report(&report);
        assert!(text.contains("not found    missing@1.0.0"));
        assert!(text.contains("failed       lodash@1.0.0: would overwrite flow-typed/npm/lodash_v1.x.x.js"));
        assert!(text.ends_with("0 installed, 0 up to date, 0 ambiguous, 1 not found, 1 failed\n"));
    }
}
