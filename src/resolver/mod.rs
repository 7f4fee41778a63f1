// src/resolver/mod.rs

//! Stub selection
//!
//! Picks the definition entry that best fits an installed library version and
//! the consumer's type checker version:
//!
//! 1. Keep entries whose library range includes the library version and whose
//!    tool range includes the tool version.
//! 2. Keep the entries with the narrowest library range.
//! 3. Of those, keep the entries with the narrowest tool range.
//! 4. One left: found. Several left: ambiguous. None: not found.
//!
//! "Narrowest" compares the interval of each range that actually contains the
//! requested version: a tighter upper bound wins, then a higher lower bound.
//! Ties are never broken arbitrarily.

use crate::definitions::{DefinitionEntry, DefinitionIndex, DefinitionScope};
use crate::version::{Specificity, Version};
use std::fmt;
use tracing::debug;

/// What to resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
    pub package_name: String,
    pub scope: DefinitionScope,
    pub installed_library_version: Version,
    pub tool_version: Version,
}

impl ResolutionRequest {
    /// Request the stub for an npm package
    pub fn package(
        package_name: impl Into<String>,
        installed_library_version: Version,
        tool_version: Version,
    ) -> Self {
        Self {
            package_name: package_name.into(),
            scope: DefinitionScope::ScopedToPackage,
            installed_library_version,
            tool_version,
        }
    }

    /// Request the stub for an environment
    ///
    /// Environments are unversioned, so the library version is a placeholder
    /// that every environment entry's `*` range accepts.
    pub fn environment(env_name: impl Into<String>, tool_version: Version) -> Self {
        Self {
            package_name: env_name.into(),
            scope: DefinitionScope::EnvironmentGlobal,
            installed_library_version: Version::new(0, 0, 0),
            tool_version,
        }
    }

    /// `left-pad@1.3.0` or `env:node`
    pub fn label(&self) -> String {
        match self.scope {
            DefinitionScope::ScopedToPackage => {
                format!("{}@{}", self.package_name, self.installed_library_version)
            }
            DefinitionScope::EnvironmentGlobal => format!("env:{}", self.package_name),
        }
    }
}

impl fmt::Display for ResolutionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Outcome of resolving one request
#[derive(Debug, Clone)]
pub enum ResolutionResult {
    Found(DefinitionEntry),
    /// Equally specific candidates, sorted by relative path
    Ambiguous(Vec<DefinitionEntry>),
    NotFound,
}

impl ResolutionResult {
    pub fn found(&self) -> Option<&DefinitionEntry> {
        match self {
            ResolutionResult::Found(entry) => Some(entry),
            _ => None,
        }
    }
}

/// Resolve a request against the index
///
/// Pure function of its inputs; the same index and request always give the
/// same result, including candidate order.
pub fn resolve(index: &DefinitionIndex, request: &ResolutionRequest) -> ResolutionResult {
    let entries = index.lookup_scoped(request.scope, &request.package_name);
    select(entries, request)
}

/// Apply matching and the specificity tie-break to one package's entries
pub fn select(entries: &[DefinitionEntry], request: &ResolutionRequest) -> ResolutionResult {
    let matching: Vec<(Specificity, Specificity, &DefinitionEntry)> = entries
        .iter()
        .filter_map(|entry| {
            let library = entry
                .library_range
                .specificity_for(&request.installed_library_version)?;
            let tool = entry.tool_range.specificity_for(&request.tool_version)?;
            Some((library, tool, entry))
        })
        .collect();

    debug!(
        "{}: {} of {} entries match tool {}",
        request,
        matching.len(),
        entries.len(),
        request.tool_version
    );

    let Some(best_library) = matching.iter().map(|(lib, _, _)| *lib).min() else {
        return ResolutionResult::NotFound;
    };
    let Some(best_tool) = matching
        .iter()
        .filter(|(lib, _, _)| *lib == best_library)
        .map(|(_, tool, _)| *tool)
        .min()
    else {
        return ResolutionResult::NotFound;
    };

    let mut winners: Vec<&DefinitionEntry> = matching
        .iter()
        .filter(|(lib, tool, _)| *lib == best_library && *tool == best_tool)
        .map(|(_, _, entry)| *entry)
        .collect();

    if winners.len() == 1 {
        let chosen = winners[0];
        debug!("{}: selected {}", request, chosen.relative_path);
        return ResolutionResult::Found(chosen.clone());
    }

    winners.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    debug!("{}: {} equally specific candidates", request, winners.len());
    ResolutionResult::Ambiguous(winners.into_iter().cloned().collect())
}
