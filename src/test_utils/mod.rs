//! Test utilities for cloudcom
//!
//! Helpers shared by unit tests and the integration suites (which reach them
//! through the `test-utils` feature):
//!
//! - [`init_test_logging`] installs a test-writer subscriber once
//! - [`MockFetcher`] scripts component responses without a network
//! - [`ProjectFixture`] and [`SourceFixture`] build temporary projects and
//!   sample sources
//!
//! # Example
//!
//! ```rust,no_run
//! use cloudcom_cli::test_utils::{MockFetcher, ProjectFixture};
//!
//! # fn example() -> anyhow::Result<()> {
//! let project = ProjectFixture::new("https://components.example.com/api")?;
//! let fetcher = MockFetcher::new().with_payload("shop", "1.0.0", "function () {}", &[]);
//! assert!(project.file_exists("cloudcom.toml"));
//! # Ok(())
//! # }
//! ```

pub mod fixtures;
pub mod mock_fetcher;

pub use fixtures::{ProjectFixture, SourceFixture};
pub use mock_fetcher::MockFetcher;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Installs the subscriber at most once per process. Uses `level` when given,
/// otherwise `RUST_LOG`; with neither, tests run silently.
///
/// ```bash
/// RUST_LOG=cloudcom_cli=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}
