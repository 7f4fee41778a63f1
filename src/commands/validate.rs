// src/commands/validate.rs
//! Definitions tree validation

use super::load_index;
use anyhow::Result;
use std::path::PathBuf;
use stubkit::config::Config;
use stubkit::definitions::DefinitionScope;

/// Index the tree and print counts and overlaps
///
/// A tree that fails to index is an error; overlaps are only reported.
pub fn cmd_validate_defs(config: &Config, definitions: Option<PathBuf>) -> Result<()> {
    let root = definitions.unwrap_or_else(|| config.paths.definitions.clone());
    let index = load_index(&root)?;

    println!("Definitions tree: {}", root.display());
    println!(
        "  {} definitions for {} packages and {} environments",
        index.len(),
        index.name_count(DefinitionScope::ScopedToPackage),
        index.name_count(DefinitionScope::EnvironmentGlobal)
    );

    let test_files: usize = index.iter().map(|e| e.test_files.len()).sum();
    println!("  {} test files", test_files);

    let overlaps = index.overlaps();
    if overlaps.is_empty() {
        println!("  no overlapping ranges");
    } else {
        println!(
            "  {} overlapping pairs (requests in the shared range may be ambiguous):",
            overlaps.len()
        );
        for overlap in &overlaps {
            println!("    {}: {} <-> {}", overlap.package_name, overlap.first, overlap.second);
        }
    }
    Ok(())
}
