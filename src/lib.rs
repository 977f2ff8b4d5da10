//! cloudcom - cloud component tag rewriting for JSX and Vue sources
//!
//! A build-time source transform. Component tags configured in `cloudcom.toml`
//! (for example `<Widget def="shop@1.2.0" />`) are resolved against a remote
//! endpoint, the fetched runtime code and its transitive dependencies are
//! written as ordinary modules into an artifact directory, and the tags are
//! rewritten to import those modules. The host bundler then treats the
//! components like any other local code.
//!
//! # Architecture Overview
//!
//! One [`Transformer`] is created per build. For each source it:
//!
//! 1. scans the source for configured tags ([`scanner`]), producing positional
//!    rewrite edits and the distinct component references,
//! 2. materializes every reference ([`materializer`]): cached components are
//!    reused, the rest are fetched ([`resolver`]) with bounded concurrency and
//!    rendered to artifacts ([`codegen`]), recursively for their dependencies,
//! 3. persists the cache document ([`store`]),
//! 4. applies the edits ([`rewriter`]).
//!
//! Failures of individual components never fail the build: a component that
//! cannot be fetched is replaced by a generated fallback that renders an
//! error message, and a tag with a missing or malformed `def` renders a
//! definition-error component.
//!
//! # Core Modules
//!
//! - [`transform`] - the per-source entry point
//! - [`scanner`] - JSX and Vue tag scanning, dialect selection
//! - [`component`] - references, dependency descriptors and identifier derivation
//! - [`resolver`] - the fetch seam and its HTTP implementation
//! - [`materializer`] - recursive, deduplicated resolution
//! - [`codegen`] - artifact and support module templates
//! - [`rewriter`] - applies rewrite plans to source text
//! - [`store`] - the persistent component cache
//!
//! ## Supporting Modules
//!
//! - [`config`] - `cloudcom.toml`
//! - [`core`] - error types and user-facing error formatting
//! - [`cli`] - the `cloudcom` binary
//! - [`utils`] - file writes and progress bars
//!
//! # Configuration (cloudcom.toml)
//!
//! ```toml
//! artifact_dir = ".cloudcom"
//!
//! [[components]]
//! tag_name = "Widget"
//! def_keyword = "def"
//! api = "https://components.example.com/api/runtime"
//! ```
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use cloudcom_cli::config::ProjectConfig;
//! use cloudcom_cli::scanner::Dialect;
//! use cloudcom_cli::Transformer;
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ProjectConfig::load_from(Path::new("cloudcom.toml")).await?;
//! let transformer = Transformer::from_config(&config).await?;
//!
//! let output = transformer
//!     .transform(r#"const a = <Widget def="shop@1.2.0" />;"#, Dialect::Jsx)
//!     .await?;
//! println!("{}", output.code);
//! # Ok(())
//! # }
//! ```

// Core functionality modules
pub mod cli;
pub mod codegen;
pub mod component;
pub mod config;
pub mod constants;
pub mod core;
pub mod materializer;
pub mod resolver;
pub mod rewriter;
pub mod scanner;
pub mod store;
pub mod transform;

// Supporting modules
pub mod utils;

pub use transform::{TransformOutput, Transformer};

// test_utils module is available for both unit tests and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
