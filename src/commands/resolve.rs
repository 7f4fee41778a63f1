// src/commands/resolve.rs
//! Dry-run resolution

use super::{build_requests, load_index};
use crate::cli::RequestArgs;
use anyhow::Result;
use stubkit::config::Config;
use stubkit::resolver::{self, ResolutionResult};

/// Print what each request resolves to; returns whether all were found
pub fn cmd_resolve(config: &Config, request: &RequestArgs) -> Result<bool> {
    let requests = build_requests(request)?;
    let definitions = request
        .definitions
        .clone()
        .unwrap_or_else(|| config.paths.definitions.clone());
    let index = load_index(&definitions)?;

    let mut all_found = true;
    for req in &requests {
        match resolver::resolve(&index, req) {
            ResolutionResult::Found(entry) => {
                println!("{} -> {}", req, entry.relative_path);
                println!("    installs as {}", entry.install_path().display());
            }
            ResolutionResult::Ambiguous(candidates) => {
                all_found = false;
                println!("{} is ambiguous between:", req);
                for candidate in candidates {
                    println!("    {}", candidate.relative_path);
                }
            }
            ResolutionResult::NotFound => {
                all_found = false;
                println!(
                    "{}: no definition for tool version {}",
                    req, req.tool_version
                );
            }
        }
    }
    Ok(all_found)
}
