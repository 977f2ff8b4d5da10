//! Core error types for cloudcom
//!
//! Errors come in two layers:
//!
//! - [`CloudcomError`] is the strongly-typed enum library code returns and
//!   matches on. It covers configuration, file system, cache document, artifact
//!   and template failures, plus CLI usage errors.
//! - [`ErrorContext`] wraps an error with a suggestion and details for the
//!   terminal. [`user_friendly_error`] turns any `anyhow::Error` into one,
//!   recognizing [`CloudcomError`], [`FileOperationError`], IO and TOML errors.
//!
//! Component-level problems (unreachable endpoints, malformed definitions,
//! dependency cycles) are not errors at this level: the transform degrades them
//! to fallback components and only logs them.
//!
//! # Example
//!
//! ```rust
//! use cloudcom_cli::core::{CloudcomError, user_friendly_error};
//!
//! let error = anyhow::Error::from(CloudcomError::ConfigNotFound {
//!     path: "cloudcom.toml".to_string(),
//! });
//! let context = user_friendly_error(error);
//! assert!(context.suggestion.is_some());
//! ```

pub mod error;
pub mod file_error;

pub use error::{CloudcomError, ErrorContext, user_friendly_error};
pub use file_error::{FileOperation, FileOperationContext, FileOperationError, FileResultExt};
