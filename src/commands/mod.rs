// src/commands/mod.rs
//! Command handlers for the stubkit CLI

mod cache;
mod install;
mod resolve;
mod validate;

pub use cache::{cmd_cache_clean, cmd_cache_prune};
pub use install::{InstallOptions, cmd_install};
pub use resolve::cmd_resolve;
pub use validate::cmd_validate_defs;

use crate::cli::RequestArgs;
use anyhow::{Context, Result, bail};
use std::path::Path;
use stubkit::definitions::DefinitionIndex;
use stubkit::resolver::ResolutionRequest;
use stubkit::version::parse_version;
use tracing::info;

/// Split `name@version`, keeping a leading `@scope/`
fn parse_package_spec(spec: &str) -> Result<(&str, &str)> {
    let (name, version) = match spec.rsplit_once('@') {
        Some((name, version)) if !name.is_empty() => (name, version),
        _ => bail!("'{}' is not of the form name@version", spec),
    };
    if version.is_empty() {
        bail!("'{}' is missing a version after '@'", spec);
    }
    Ok((name, version))
}

/// Turn command-line request arguments into resolution requests
///
/// Packages come first, in the order given, followed by environments.
pub(crate) fn build_requests(args: &RequestArgs) -> Result<Vec<ResolutionRequest>> {
    if args.packages.is_empty() && args.envs.is_empty() {
        bail!("nothing to resolve: give at least one name@version or --env");
    }

    let tool_version = parse_version(&args.tool_version)
        .with_context(|| format!("Invalid --tool-version '{}'", args.tool_version))?;

    let mut requests = Vec::with_capacity(args.packages.len() + args.envs.len());
    for spec in &args.packages {
        let (name, version) = parse_package_spec(spec)?;
        let version = parse_version(version)
            .with_context(|| format!("Invalid version in '{}'", spec))?;
        requests.push(ResolutionRequest::package(name, version, tool_version.clone()));
    }
    for env in &args.envs {
        requests.push(ResolutionRequest::environment(env.as_str(), tool_version.clone()));
    }
    Ok(requests)
}

/// Build the index, treating any problem in the tree as fatal
pub(crate) fn load_index(root: &Path) -> Result<DefinitionIndex> {
    let index = DefinitionIndex::build(root)
        .with_context(|| format!("Failed to index definitions at {}", root.display()))?;
    info!("Loaded {} definitions from {}", index.len(), root.display());
    Ok(index)
}
