//! `cloudcom init`: write an example `cloudcom.toml` and the support modules.

use super::{CliConfig, display_relative};
use crate::codegen::CodeGenerator;
use crate::config::ProjectConfig;
use crate::core::CloudcomError;
use crate::scanner::Dialect;
use crate::utils::fs::{absolutize, write_all_if_changed};
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::Path;

/// Creates a project configuration.
#[derive(Debug, Args)]
pub struct InitCommand {
    /// Overwrite an existing configuration file
    #[arg(short, long)]
    force: bool,
}

impl InitCommand {
    /// Runs the command.
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let path = cli.config_file();

        if path.exists() && !self.force {
            return Err(CloudcomError::ConfigError {
                message: format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                ),
            }
            .into());
        }

        let cwd = std::env::current_dir().context("Failed to determine current directory")?;
        let base_dir = absolutize(
            &cwd,
            path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new(".")),
        );
        if !base_dir.exists() {
            tokio::fs::create_dir_all(&base_dir)
                .await
                .with_context(|| format!("Failed to create {}", base_dir.display()))?;
        }

        let config = ProjectConfig::example().with_base_dir(&base_dir);
        config.save_to(&path).await?;
        println!("{} Created {}", "✓".green(), path.display());

        let generator = CodeGenerator::new(
            Dialect::Jsx,
            config.resolved_artifact_dir(),
            config.renderer_module.clone(),
        )?;
        let files =
            generator.support_files()?.into_iter().map(|f| (f.path, f.content)).collect();
        let written = write_all_if_changed(files).await?;

        println!(
            "{} Support modules in {} ({written} written)",
            "✓".green(),
            display_relative(&config.resolved_artifact_dir(), &base_dir)
        );
        println!("\nEdit the [[components]] entries, then run `cloudcom transform <files>`.");
        Ok(())
    }
}
