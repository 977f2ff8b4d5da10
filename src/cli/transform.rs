//! `cloudcom transform`: run the transform over files or glob patterns.
//!
//! ```bash
//! cloudcom transform src/App.jsx               # print the result
//! cloudcom transform src/App.jsx --out App.js  # write it elsewhere
//! cloudcom transform 'src/**/*.vue' --write    # rewrite in place
//! ```

use super::{CliConfig, display_relative};
use crate::core::CloudcomError;
use crate::materializer::MaterializeReport;
use crate::scanner::Dialect;
use crate::transform::{TransformOutput, Transformer};
use crate::utils::fs::{atomic_write, write_if_changed_async};
use crate::utils::progress::create_progress_bar;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use futures::future::join_all;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Rewrites component tags in source files.
#[derive(Debug, Args)]
pub struct TransformCommand {
    /// Files or glob patterns
    #[arg(required = true, value_name = "PATH|GLOB")]
    inputs: Vec<String>,

    /// Source dialect; `auto` picks it from each file extension
    #[arg(long, default_value = "auto", value_parser = ["auto", "jsx", "vue"])]
    dialect: String,

    /// Rewrite inputs in place (only files whose output differs)
    #[arg(short, long)]
    write: bool,

    /// Write the single result to this file instead of stdout
    #[arg(short, long, value_name = "FILE", conflicts_with = "write")]
    out: Option<PathBuf>,
}

/// Totals across all transformed files.
#[derive(Debug, Default)]
struct Summary {
    files: usize,
    changed: usize,
    references: usize,
    definition_errors: usize,
    report: MaterializeReport,
}

impl Summary {
    fn add(&mut self, output: &TransformOutput) {
        self.files += 1;
        self.changed += usize::from(output.changed);
        self.references += output.references.len();
        self.definition_errors += output.definition_errors.len();
        self.report += output.report;
    }

    fn print(&self) {
        eprintln!(
            "{} {} file(s), {} changed: {} reference(s), {} fetched, {} cached",
            "✓".green(),
            self.files,
            self.changed,
            self.references,
            self.report.fetched,
            self.report.cache_hits
        );

        if self.report.failed > 0 {
            eprintln!("  {} {} component(s) replaced by fallbacks", "!".yellow(), self.report.failed);
        }
        if self.definition_errors > 0 {
            eprintln!(
                "  {} {} tag(s) with a missing or malformed definition",
                "!".yellow(),
                self.definition_errors
            );
        }
        if self.report.cycles > 0 {
            eprintln!("  {} {} dependency cycle(s) skipped", "!".yellow(), self.report.cycles);
        }
        if self.report.write_errors > 0 {
            eprintln!("  {} {} artifact(s) could not be written", "✗".red(), self.report.write_errors);
        }
    }
}

impl TransformCommand {
    /// Runs the command.
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let dialect = match self.dialect.as_str() {
            "auto" => None,
            other => Some(Dialect::from_str(other)?),
        };

        let files = expand_inputs(&self.inputs)?;
        if files.len() > 1 && !self.write {
            return Err(CloudcomError::InvalidArguments {
                message: format!(
                    "{} inputs matched; use --write to transform several files in place",
                    files.len()
                ),
            }
            .into());
        }

        let config = cli.load_project().await?;
        let transformer = Transformer::from_config(&config).await?;

        let progress = create_progress_bar(files.len() as u64, cli.progress_enabled() && self.write);
        progress.set_message("Transforming");

        let tasks = files.iter().map(|path| {
            let transformer = &transformer;
            let progress = &progress;
            async move {
                let result = transformer.transform_file(path, dialect).await;
                progress.inc(1);
                result.with_context(|| format!("Failed to transform {}", path.display()))
            }
        });
        let results = join_all(tasks).await;
        progress.finish_and_clear();

        let mut summary = Summary::default();
        let base = config.base_dir().to_path_buf();
        for (path, result) in files.iter().zip(results) {
            let output = result?;
            summary.add(&output);
            self.emit(path, &output, &base).await?;
        }

        summary.print();
        Ok(())
    }

    async fn emit(&self, path: &Path, output: &TransformOutput, base: &Path) -> Result<()> {
        if self.write {
            if output.changed {
                write_if_changed_async(path.to_path_buf(), output.code.clone()).await?;
                eprintln!("  {} {}", "rewrote".cyan(), display_relative(path, base));
            }
            return Ok(());
        }

        if let Some(out) = &self.out {
            atomic_write(out, output.code.as_bytes())?;
            return Ok(());
        }

        let mut stdout = std::io::stdout().lock();
        stdout.write_all(output.code.as_bytes()).context("Failed to write to stdout")?;
        stdout.flush().context("Failed to flush stdout")?;
        Ok(())
    }
}

/// Expands paths and glob patterns, keeping first-seen order.
fn expand_inputs(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for input in inputs {
        let matches: Vec<PathBuf> = if is_glob(input) {
            glob::glob(input)
                .map_err(|e| CloudcomError::InvalidArguments {
                    message: format!("invalid glob pattern '{input}': {e}"),
                })?
                .filter_map(|entry| match entry {
                    Ok(path) if path.is_file() => Some(path),
                    Ok(_) => None,
                    Err(e) => {
                        tracing::warn!("Skipping unreadable match: {e}");
                        None
                    }
                })
                .collect()
        } else {
            let path = PathBuf::from(input);
            if path.is_file() { vec![path] } else { Vec::new() }
        };

        if matches.is_empty() {
            return Err(CloudcomError::InputNotFound {
                pattern: input.clone(),
            }
            .into());
        }

        for path in matches {
            if seen.insert(path.clone()) {
                files.push(path);
            }
        }
    }

    Ok(files)
}

fn is_glob(input: &str) -> bool {
    input.contains(['*', '?', '['])
}
