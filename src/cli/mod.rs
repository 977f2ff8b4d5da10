//! Command-line interface for cloudcom.
//!
//! The binary is a thin host around [`Transformer`](crate::transform::Transformer)
//! for builds that cannot embed the library. Transformed source goes to stdout
//! (or back into the inputs with `--write`); logs, progress and summaries go to
//! stderr so output can be piped.
//!
//! # Commands
//!
//! - `transform` - rewrite sources, materializing referenced components
//! - `init` - write an example `cloudcom.toml` and the support modules
//! - `cache list` / `cache verify` - inspect the cache document
//!
//! # Global options
//!
//! - `--config <path>` - configuration file (default `./cloudcom.toml`)
//! - `--verbose` / `--quiet` - log level (`RUST_LOG` wins when set)
//! - `--no-progress` - disable progress bars

mod cache;
mod init;
mod transform;

pub use cache::CacheCommand;
pub use init::InitCommand;
pub use transform::TransformCommand;

use crate::config::ProjectConfig;
use crate::constants::{CONFIG_FILE_NAME, NO_PROGRESS_ENV};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Settings shared by every command, derived from the global flags.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: Option<String>,

    /// Whether progress bars are disabled
    pub no_progress: bool,

    /// Explicit configuration file
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration file to use: `--config` or `./cloudcom.toml`.
    pub fn config_file(&self) -> PathBuf {
        self.config_path.clone().unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }

    /// Whether progress bars may be shown.
    pub fn progress_enabled(&self) -> bool {
        !self.no_progress && std::env::var_os(NO_PROGRESS_ENV).is_none()
    }

    /// Loads the project configuration, falling back to defaults when the file
    /// is missing.
    pub async fn load_project(&self) -> Result<ProjectConfig> {
        let path = self.config_file();
        let config = ProjectConfig::load_or_default(&path).await?;
        if config.components.is_empty() {
            tracing::warn!(
                "No components configured in {}; sources pass through unchanged",
                path.display()
            );
        }
        Ok(config)
    }

    /// Installs the stderr log subscriber.
    ///
    /// `RUST_LOG` takes precedence over the level chosen by the flags.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(self.log_level.as_deref().unwrap_or("error"))
        });

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

/// Command-line arguments.
#[derive(Parser)]
#[command(
    name = "cloudcom",
    about = "Rewrite cloud component tags into locally materialized modules",
    version,
    author,
    long_about = "cloudcom finds configured component tags in JSX and Vue sources, fetches each \
                  component (and its dependencies) from its endpoint, writes importable modules \
                  into an artifact directory and rewrites the tags to import them."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to cloudcom.toml
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Disable progress bars
    #[arg(long, global = true)]
    no_progress: bool,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Transform source files
    Transform(TransformCommand),

    /// Create cloudcom.toml and the support modules
    Init(InitCommand),

    /// Inspect the component cache
    Cache(CacheCommand),
}

impl Cli {
    /// Runs the selected command.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        config.init_logging();
        self.execute_with_config(config).await
    }

    /// Derives the [`CliConfig`] from the global flags.
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            Some("error".to_string())
        } else {
            Some("info".to_string())
        };

        CliConfig {
            log_level,
            no_progress: self.no_progress,
            config_path: self.config.clone(),
        }
    }

    /// Runs the selected command with an explicit configuration.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        match self.command {
            Commands::Transform(cmd) => cmd.execute(&config).await,
            Commands::Init(cmd) => cmd.execute(&config).await,
            Commands::Cache(cmd) => cmd.execute(&config).await,
        }
    }
}

/// Display form of `path` relative to `base` when it lies inside it.
pub(crate) fn display_relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base).unwrap_or(path).display().to_string()
}
