//! `cloudcom cache`: inspect the cache document.
//!
//! ```bash
//! cloudcom cache list
//! cloudcom cache list --format json
//! cloudcom cache verify   # exits non-zero on entries without artifacts
//! ```

use super::CliConfig;
use crate::core::CloudcomError;
use crate::scanner::Dialect;
use crate::store::{CacheEntry, CacheKey, ComponentCache};
use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::path::Path;

/// Cache inspection commands.
#[derive(Debug, Args)]
pub struct CacheCommand {
    #[command(subcommand)]
    command: CacheSubcommand,
}

#[derive(Debug, Subcommand)]
enum CacheSubcommand {
    /// List cached components
    List {
        /// Output format
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Report successful entries whose artifacts are missing
    Verify,
}

/// One cache entry with the artifacts found for it.
#[derive(Debug, Serialize)]
struct ListedEntry {
    tag: String,
    identifier: String,
    success: bool,
    deps: Vec<String>,
    artifacts: Vec<String>,
}

impl ListedEntry {
    fn new(key: CacheKey, entry: CacheEntry, component_dir: &Path) -> Self {
        let artifacts = [Dialect::Jsx, Dialect::Vue]
            .into_iter()
            .map(|dialect| format!("{}.{}", key.identifier, dialect.artifact_extension()))
            .filter(|name| component_dir.join(name).is_file())
            .collect();

        Self {
            tag: key.tag_name,
            identifier: key.identifier,
            success: entry.success,
            deps: entry.deps.iter().map(ToString::to_string).collect(),
            artifacts,
        }
    }
}

impl CacheCommand {
    /// Runs the command.
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let config = cli.load_project().await?;
        let cache = ComponentCache::load(config.resolved_cache_file()).await?;
        let component_dir = config.component_dir();

        let entries: Vec<ListedEntry> = cache
            .entries()
            .into_iter()
            .map(|(key, entry)| ListedEntry::new(key, entry, &component_dir))
            .collect();

        match self.command {
            CacheSubcommand::List {
                format,
            } => {
                if format == "json" {
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                } else {
                    print_entries(&entries);
                }
                Ok(())
            }
            CacheSubcommand::Verify => verify(&entries),
        }
    }
}

fn print_entries(entries: &[ListedEntry]) {
    if entries.is_empty() {
        println!("{}", "No cached components".yellow());
        return;
    }

    for entry in entries {
        let status = if entry.success {
            "ok".green()
        } else {
            "failed".red()
        };
        println!("{} {} [{}]", entry.tag.bold(), entry.identifier, status);
        if !entry.deps.is_empty() {
            println!("    deps: {}", entry.deps.join(", "));
        }
        if entry.artifacts.is_empty() {
            println!("    {}", "no artifacts".dimmed());
        } else {
            println!("    artifacts: {}", entry.artifacts.join(", "));
        }
    }
}

fn verify(entries: &[ListedEntry]) -> Result<()> {
    let missing: Vec<&ListedEntry> =
        entries.iter().filter(|e| e.success && e.artifacts.is_empty()).collect();

    if missing.is_empty() {
        println!("{} {} cache entries verified", "✓".green(), entries.len());
        return Ok(());
    }

    for entry in &missing {
        println!("{} {} ({}): artifact missing", "✗".red(), entry.identifier, entry.tag);
    }
    Err(CloudcomError::CacheDesync {
        count: missing.len(),
    }
    .into())
}
