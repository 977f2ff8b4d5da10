//! cloudcom CLI entry point
//!
//! Parses arguments, runs the selected command and renders failures as
//! user-facing errors with suggestions:
//! - `transform` - rewrite component tags in source files
//! - `init` - write an example cloudcom.toml and the support modules
//! - `cache` - list or verify the component cache

use anyhow::Result;
use clap::Parser;
use cloudcom_cli::cli;
use cloudcom_cli::core::error::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
