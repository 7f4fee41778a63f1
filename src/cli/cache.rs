// src/cli/cache.rs
//! Cache maintenance commands

use clap::Subcommand;

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Remove cached stubs older than a given age
    Prune {
        /// Maximum age in days (default: cache.max_age_days from config)
        #[arg(long)]
        max_age_days: Option<u32>,
    },

    /// Remove every cached stub
    Clean,
}
