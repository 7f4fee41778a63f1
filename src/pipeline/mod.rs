// src/pipeline/mod.rs

//! Batch resolve, fetch and install
//!
//! A batch runs in three phases:
//!
//! 1. Resolve every request against the index.
//! 2. Check that no two requests resolve to different entries with the same
//!    install path. Both sides of a collision fail; neither is installed.
//! 3. Fetch (through the cache) and install the rest, up to `jobs` at a time.
//!    A request for an entry already claimed earlier in the batch runs after
//!    the others, against the files they left behind.
//!
//! One package failing never stops the others. The final [`BatchReport`]
//! lists one outcome per request, in request order.

use crate::cache::{CacheStats, CacheStore};
use crate::definitions::{DefinitionEntry, DefinitionIndex};
use crate::fetch::{FetchError, FetchRequest, StubFetcher};
use crate::installer::{ExistingFiles, InstallError, InstallReport, InstallStatus, Installer};
use crate::resolver::{self, ResolutionRequest, ResolutionResult};
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default number of packages processed concurrently
pub const DEFAULT_JOBS: usize = 4;

/// Why a package failed
#[derive(Debug)]
pub enum FailureReason {
    /// Target exists with different content and `force` was not given
    WouldOverwrite(PathBuf),
    /// Another request in the batch resolves to the same target file
    Conflict { target: PathBuf, other: String },
    Fetch(FetchError),
    Install(InstallError),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::WouldOverwrite(path) => write!(
                f,
                "would overwrite {} (local changes; use --force)",
                path.display()
            ),
            FailureReason::Conflict { target, other } => {
                write!(f, "{} is also targeted by {}", target.display(), other)
            }
            FailureReason::Fetch(e) => write!(f, "{e}"),
            FailureReason::Install(e) => write!(f, "{e}"),
        }
    }
}

/// Final state of one requested package
#[derive(Debug)]
pub enum PackageOutcome {
    /// Written (fresh or forced over local changes)
    Installed(InstallReport),
    UpToDate(InstallReport),
    /// Several equally specific entries; candidates sorted by path
    Ambiguous(Vec<DefinitionEntry>),
    NotFound,
    Failed(FailureReason),
}

impl PackageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PackageOutcome::Installed(_) | PackageOutcome::UpToDate(_))
    }

    /// Short label for the report
    pub fn label(&self) -> &'static str {
        match self {
            PackageOutcome::Installed(report) if report.status == InstallStatus::Overwritten => {
                "overwritten"
            }
            PackageOutcome::Installed(_) => "installed",
            PackageOutcome::UpToDate(_) => "up to date",
            PackageOutcome::Ambiguous(_) => "ambiguous",
            PackageOutcome::NotFound => "not found",
            PackageOutcome::Failed(_) => "failed",
        }
    }
}

/// One line of the final report
#[derive(Debug)]
pub struct PackageReport {
    pub request: ResolutionRequest,
    /// The entry selected for this request, when resolution succeeded
    pub entry: Option<DefinitionEntry>,
    pub outcome: PackageOutcome,
}

/// Per-outcome counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub installed: usize,
    pub up_to_date: usize,
    pub ambiguous: usize,
    pub not_found: usize,
    pub failed: usize,
}

/// Outcome of a whole batch
#[derive(Debug)]
pub struct BatchReport {
    /// In request order
    pub packages: Vec<PackageReport>,
    pub cache: CacheStats,
}

impl BatchReport {
    /// True only if every package was installed or already up to date
    pub fn is_success(&self) -> bool {
        self.packages.iter().all(|p| p.outcome.is_success())
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for package in &self.packages {
            match package.outcome {
                PackageOutcome::Installed(_) => summary.installed += 1,
                PackageOutcome::UpToDate(_) => summary.up_to_date += 1,
                PackageOutcome::Ambiguous(_) => summary.ambiguous += 1,
                PackageOutcome::NotFound => summary.not_found += 1,
                PackageOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }
}

/// Everything a batch needs
pub struct Pipeline {
    index: Arc<DefinitionIndex>,
    cache: Arc<CacheStore>,
    fetcher: Arc<dyn StubFetcher>,
    installer: Installer,
    jobs: usize,
}

impl Pipeline {
    pub fn new(
        index: Arc<DefinitionIndex>,
        cache: Arc<CacheStore>,
        fetcher: Arc<dyn StubFetcher>,
        installer: Installer,
    ) -> Self {
        Self {
            index,
            cache,
            fetcher,
            installer,
            jobs: DEFAULT_JOBS,
        }
    }

    /// Limit how many packages are fetched and installed at once
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Resolve every request without fetching or writing anything
    pub fn resolve_all(&self, requests: &[ResolutionRequest]) -> Vec<ResolutionResult> {
        requests
            .iter()
            .map(|request| resolver::resolve(&self.index, request))
            .collect()
    }

    /// Run the whole batch
    pub async fn run(&self, requests: Vec<ResolutionRequest>) -> BatchReport {
        info!(
            "Processing {} requests ({} at a time)",
            requests.len(),
            self.jobs
        );

        let resolutions = self.resolve_all(&requests);
        let mut outcomes: Vec<Option<PackageOutcome>> =
            std::iter::repeat_with(|| None).take(requests.len()).collect();
        let mut chosen: Vec<Option<DefinitionEntry>> = vec![None; requests.len()];

        for (i, resolution) in resolutions.into_iter().enumerate() {
            match resolution {
                ResolutionResult::Found(entry) => chosen[i] = Some(entry),
                ResolutionResult::Ambiguous(candidates) => {
                    warn!(
                        "{}: {} equally specific definitions",
                        requests[i],
                        candidates.len()
                    );
                    outcomes[i] = Some(PackageOutcome::Ambiguous(candidates));
                }
                ResolutionResult::NotFound => {
                    warn!("{}: no matching definition", requests[i]);
                    outcomes[i] = Some(PackageOutcome::NotFound);
                }
            }
        }

        self.mark_collisions(&requests, &chosen, &mut outcomes);

        let existing = match self.installer.scan_existing() {
            Ok(existing) => existing,
            Err(e) => {
                // install() falls back to checking each target on disk
                warn!("Could not scan install root: {}", e);
                ExistingFiles::new()
            }
        };

        let mut claimed = HashSet::new();
        let (work, repeats): (Vec<_>, Vec<_>) = chosen
            .iter()
            .enumerate()
            .filter(|(i, _)| outcomes[*i].is_none())
            .filter_map(|(i, entry)| entry.as_ref().map(|e| (i, e)))
            .partition(|(_, entry)| claimed.insert(entry.relative_path.as_str()));

        let finished: Vec<(usize, PackageOutcome)> = stream::iter(work)
            .map(|(i, entry)| {
                let existing = &existing;
                async move { (i, self.fetch_and_install(entry, existing).await) }
            })
            .buffer_unordered(self.jobs)
            .collect()
            .await;

        for (i, outcome) in finished {
            outcomes[i] = Some(outcome);
        }

        // The snapshot predates the first pass, so repeats check the disk
        let fresh = ExistingFiles::new();
        for (i, entry) in repeats {
            debug!("{}: {} already handled in this batch", requests[i], entry.id());
            outcomes[i] = Some(self.fetch_and_install(entry, &fresh).await);
        }

        let packages: Vec<PackageReport> = requests
            .into_iter()
            .zip(chosen)
            .zip(outcomes)
            .map(|((request, entry), outcome)| PackageReport {
                request,
                entry,
                // Every slot was filled by resolution, collision check or install
                outcome: outcome.unwrap_or(PackageOutcome::NotFound),
            })
            .collect();

        let report = BatchReport {
            packages,
            cache: self.cache.stats(),
        };
        let summary = report.summary();
        info!(
            "Batch complete: {} installed, {} up to date, {} ambiguous, {} not found, {} failed",
            summary.installed,
            summary.up_to_date,
            summary.ambiguous,
            summary.not_found,
            summary.failed
        );
        report
    }

    /// Fail every request whose install path a different entry also resolves to
    ///
    /// Requests that resolve to the very same entry share the target and are
    /// not a conflict.
    fn mark_collisions(
        &self,
        requests: &[ResolutionRequest],
        chosen: &[Option<DefinitionEntry>],
        outcomes: &mut [Option<PackageOutcome>],
    ) {
        let mut by_target: HashMap<PathBuf, Vec<usize>> = HashMap::new();
        for (i, entry) in chosen.iter().enumerate() {
            if let Some(entry) = entry {
                by_target.entry(entry.install_path()).or_default().push(i);
            }
        }

        for (target, claimants) in by_target {
            let first = claimants
                .first()
                .and_then(|&i| chosen[i].as_ref())
                .map(|e| e.relative_path.as_str());
            let same_entry = claimants
                .iter()
                .all(|&i| chosen[i].as_ref().map(|e| e.relative_path.as_str()) == first);
            if same_entry {
                continue;
            }
            let target = self.installer.root().join(target);
            for &i in &claimants {
                let other = claimants
                    .iter()
                    .filter(|&&j| j != i)
                    .map(|&j| requests[j].label())
                    .collect::<Vec<_>>()
                    .join(", ");
                warn!("{}: {} is also targeted by {}", requests[i], target.display(), other);
                outcomes[i] = Some(PackageOutcome::Failed(FailureReason::Conflict {
                    target: target.clone(),
                    other,
                }));
            }
        }
    }

    async fn fetch_and_install(
        &self,
        entry: &DefinitionEntry,
        existing: &ExistingFiles,
    ) -> PackageOutcome {
        let request = FetchRequest::from(entry);
        let fetcher = Arc::clone(&self.fetcher);

        let content = match self
            .cache
            .get_or_fetch(&entry.fingerprint, || async move { fetcher.fetch(&request).await })
            .await
        {
            Ok(content) => content,
            Err(e) => {
                warn!("Fetching {} failed: {}", entry.relative_path, e);
                return PackageOutcome::Failed(FailureReason::Fetch(e));
            }
        };

        debug!(
            "Installing {} ({} bytes via {})",
            entry.id(),
            content.len(),
            self.fetcher.name()
        );
        match self.installer.install(entry, &content, existing) {
            Ok(report) => match report.status {
                InstallStatus::Installed | InstallStatus::Overwritten => {
                    PackageOutcome::Installed(report)
                }
                InstallStatus::UpToDate => PackageOutcome::UpToDate(report),
                InstallStatus::WouldOverwrite => {
                    PackageOutcome::Failed(FailureReason::WouldOverwrite(report.target))
                }
            },
            Err(e) => {
                warn!("Installing {} failed: {}", entry.id(), e);
                PackageOutcome::Failed(FailureReason::Install(e))
            }
        }
    }
}
