// src/cli/mod.rs
//! CLI definitions for stubkit
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.
//!
//! - `install` - Resolve, fetch and install stubs
//! - `resolve` - Show which stub each request would get
//! - `validate-defs` - Check a definitions tree
//! - `cache` - Cache maintenance
//! - `completions` - Shell completion scripts

use clap::{ArgAction, Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

mod cache;

pub use cache::CacheCommands;

#[derive(Parser)]
#[command(name = "stubkit")]
#[command(author = "Stubkit Contributors")]
#[command(version)]
#[command(about = "Resolve, cache, and install versioned type-definition stubs", long_about = None)]
pub struct Cli {
    /// Configuration file (default: ./stubkit.toml if present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// What to resolve
#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Packages as name@version (scoped: @scope/name@version)
    #[arg(value_name = "PKG@VERSION")]
    pub packages: Vec<String>,

    /// Version of the type checker the stubs must support
    #[arg(long, value_name = "VERSION")]
    pub tool_version: String,

    /// Environment definitions to include (node, dom, ...)
    #[arg(long = "env", value_name = "NAME")]
    pub envs: Vec<String>,

    /// Definitions tree to read from
    #[arg(long, value_name = "DIR")]
    pub definitions: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve, fetch and install stubs for the given packages
    Install {
        #[command(flatten)]
        request: RequestArgs,

        /// Replace installed stubs that have local changes
        #[arg(short, long)]
        force: bool,

        /// Install root in the consumer project
        #[arg(short, long, value_name = "DIR")]
        target: Option<PathBuf>,

        /// Packages processed concurrently
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Fetch stubs from this registry instead of the local tree
        #[arg(long, value_name = "URL")]
        registry: Option<String>,
    },

    /// Show which stub each request resolves to, without installing
    Resolve {
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Index a definitions tree and report problems
    ValidateDefs {
        /// Definitions tree to check
        #[arg(long, value_name = "DIR")]
        definitions: Option<PathBuf>,
    },

    /// Local cache maintenance
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
