//! Error handling for cloudcom
//!
//! This module provides the error types and user-friendly error reporting for the
//! cloudcom loader. The error system is designed around two core principles:
//! 1. **Strongly-typed errors** for precise error handling in code
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Architecture
//!
//! - [`CloudcomError`] - Enumerated error types for environment-level failures
//! - [`ErrorContext`] - Wrapper that adds user-friendly messages and suggestions
//!
//! Component-level failures (a tag with a broken definition, a component the
//! remote service cannot deliver) are *not* errors in this sense. They degrade
//! to fallback artifacts and are reported through
//! [`MaterializeReport`](crate::materializer::MaterializeReport). The variants
//! below cover what is left: configuration, file system and CLI usage problems.
//!
//! # Examples
//!
//! ```rust,no_run
//! use cloudcom_cli::core::{CloudcomError, ErrorContext, user_friendly_error};
//!
//! fn load() -> anyhow::Result<()> {
//!     Err(CloudcomError::ConfigNotFound { path: "cloudcom.toml".to_string() }.into())
//! }
//!
//! if let Err(e) = load() {
//!     user_friendly_error(e).display();
//! }
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for cloudcom operations
///
/// Each variant names one failure mode and carries the paths or values needed
/// to explain it to a user. Variants wrapping foreign errors are converted
/// automatically with `?`.
#[derive(Error, Debug)]
pub enum CloudcomError {
    /// Configuration file does not exist
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// Path that was searched
        path: String,
    },

    /// Configuration file exists but is not valid TOML for the expected schema
    #[error("Invalid configuration file syntax in {file}")]
    ConfigParseError {
        /// Path to the configuration file
        file: String,
        /// Parser message
        reason: String,
    },

    /// Configuration is syntactically valid but semantically unusable
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the problem
        message: String,
    },

    /// File system operation failed
    #[error("File system error: {operation}")]
    FileSystemError {
        /// Operation that failed (e.g. "write artifact")
        operation: String,
        /// Path involved
        path: String,
    },

    /// Permission denied for a file system operation
    #[error("Permission denied: {operation}")]
    PermissionDenied {
        /// Operation that failed
        operation: String,
        /// Path involved
        path: String,
    },

    /// The cache document could not be read, merged or written
    #[error("Cache document error at {path}: {reason}")]
    CacheDocumentError {
        /// Path of the cache document
        path: String,
        /// What went wrong
        reason: String,
    },

    /// Timed out waiting for another process to release the cache lock
    #[error("Timed out waiting for cache lock: {path}")]
    LockTimeout {
        /// Lock file path
        path: String,
    },

    /// A generated artifact could not be written
    #[error("Failed to write artifact '{identifier}' to {path}")]
    ArtifactWriteFailed {
        /// Identifier of the artifact
        identifier: String,
        /// Target path
        path: String,
        /// Underlying reason
        reason: String,
    },

    /// A code generation template failed to render
    #[error("Failed to render template '{template}': {reason}")]
    TemplateError {
        /// Template name
        template: String,
        /// Tera error message
        reason: String,
    },

    /// Unknown dialect name on the command line
    #[error("Unknown dialect '{value}'")]
    InvalidDialect {
        /// Value supplied by the user
        value: String,
    },

    /// No input file matched a path or glob pattern
    #[error("No input files matched '{pattern}'")]
    InputNotFound {
        /// Path or pattern supplied by the user
        pattern: String,
    },

    /// Invalid combination of command-line arguments
    #[error("Invalid arguments: {message}")]
    InvalidArguments {
        /// Explanation
        message: String,
    },

    /// The cache claims success for components whose artifacts are missing
    #[error("{count} cache entries point at missing artifacts")]
    CacheDesync {
        /// Number of desynchronized entries
        count: usize,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Catch-all with a preformatted message
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
    },
}

impl Clone for CloudcomError {
    fn clone(&self) -> Self {
        match self {
            Self::ConfigNotFound {
                path,
            } => Self::ConfigNotFound {
                path: path.clone(),
            },
            Self::ConfigParseError {
                file,
                reason,
            } => Self::ConfigParseError {
                file: file.clone(),
                reason: reason.clone(),
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            Self::FileSystemError {
                operation,
                path,
            } => Self::FileSystemError {
                operation: operation.clone(),
                path: path.clone(),
            },
            Self::PermissionDenied {
                operation,
                path,
            } => Self::PermissionDenied {
                operation: operation.clone(),
                path: path.clone(),
            },
            Self::CacheDocumentError {
                path,
                reason,
            } => Self::CacheDocumentError {
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::LockTimeout {
                path,
            } => Self::LockTimeout {
                path: path.clone(),
            },
            Self::ArtifactWriteFailed {
                identifier,
                path,
                reason,
            } => Self::ArtifactWriteFailed {
                identifier: identifier.clone(),
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::TemplateError {
                template,
                reason,
            } => Self::TemplateError {
                template: template.clone(),
                reason: reason.clone(),
            },
            Self::InvalidDialect {
                value,
            } => Self::InvalidDialect {
                value: value.clone(),
            },
            Self::InputNotFound {
                pattern,
            } => Self::InputNotFound {
                pattern: pattern.clone(),
            },
            Self::InvalidArguments {
                message,
            } => Self::InvalidArguments {
                message: message.clone(),
            },
            Self::CacheDesync {
                count,
            } => Self::CacheDesync {
                count: *count,
            },
            // io, toml and json errors are not Clone; keep their message
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::TomlError(e) => Self::Other {
                message: format!("TOML parsing error: {e}"),
            },
            Self::TomlSerError(e) => Self::Other {
                message: format!("TOML serialization error: {e}"),
            },
            Self::JsonError(e) => Self::Other {
                message: format!("JSON error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Error wrapper carrying user-facing guidance
///
/// Suggestions are actionable steps; details explain why the error happened.
/// [`display`](ErrorContext::display) prints all three to stderr with colors.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: CloudcomError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: CloudcomError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error context to stderr with terminal colors
    ///
    /// - Error message: red and bold
    /// - Details: yellow
    /// - Suggestion: green
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with contextual suggestions
///
/// Known [`CloudcomError`] variants get tailored guidance; IO and TOML errors
/// are mapped onto the closest variant; anything else is reported with its
/// full cause chain.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(cloudcom_error) = error.downcast_ref::<CloudcomError>() {
        return create_error_context(cloudcom_error.clone());
    }

    if let Some(file_error) = error.downcast_ref::<super::file_error::FileOperationError>() {
        let suggestion = match file_error.source.kind() {
            std::io::ErrorKind::NotFound => "Check that the path exists and is spelled correctly",
            std::io::ErrorKind::PermissionDenied => "Check the permissions of the file and its directory",
            _ => "Check that the file is accessible and not locked by another process",
        };
        return ErrorContext::new(CloudcomError::FileSystemError {
            operation: file_error.operation.to_string(),
            path: file_error.file_path.display().to_string(),
        })
        .with_suggestion(suggestion)
        .with_details(file_error.user_message());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::new(CloudcomError::PermissionDenied {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check ownership and permissions of the artifact directory and input files")
                .with_details("cloudcom needs to read sources and write generated modules next to the cache document");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::new(CloudcomError::FileSystemError {
                    operation: "file access".to_string(),
                    path: "unknown".to_string(),
                })
                .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(CloudcomError::ConfigParseError {
            file: crate::constants::CONFIG_FILE_NAME.to_string(),
            reason: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax of cloudcom.toml. Each component is a [[components]] table");
    }

    // Generic error - include the full error chain for better diagnostics
    let mut message = error.to_string();
    let chain: Vec<String> =
        error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(CloudcomError::Other {
        message,
    })
}

fn create_error_context(error: CloudcomError) -> ErrorContext {
    match &error {
        CloudcomError::ConfigNotFound { .. } => ErrorContext::new(error)
            .with_suggestion("Run 'cloudcom init' to create a cloudcom.toml, or pass --config <path>")
            .with_details("cloudcom reads the tag configuration from cloudcom.toml in the current directory by default"),

        CloudcomError::ConfigParseError { file, .. } => {
            let suggestion = format!(
                "Check the TOML syntax in {file}. Common issues: missing quotes, [components] instead of [[components]]"
            );
            ErrorContext::new(error).with_suggestion(suggestion)
        }

        CloudcomError::ConfigError { .. } => ErrorContext::new(error)
            .with_suggestion("Every component needs tag_name, def_keyword and an absolute http(s) api URL"),

        CloudcomError::PermissionDenied { path, .. } => {
            let suggestion = format!("Check permissions for {path}");
            ErrorContext::new(error).with_suggestion(suggestion)
        }

        CloudcomError::CacheDocumentError { .. } => ErrorContext::new(error)
            .with_suggestion("Remove the cache document to force a full refetch on the next build")
            .with_details("The cache document only records which components were already materialized"),

        CloudcomError::LockTimeout { .. } => ErrorContext::new(error)
            .with_suggestion("Another build may be holding the lock. Wait for it to finish and retry")
            .with_details("The cache document is locked while it is merged and rewritten"),

        CloudcomError::ArtifactWriteFailed { .. } => ErrorContext::new(error)
            .with_suggestion("Check free disk space and permissions of the artifact directory"),

        CloudcomError::InvalidDialect { .. } => ErrorContext::new(error)
            .with_suggestion("Use one of: auto, jsx, vue"),

        CloudcomError::InputNotFound { .. } => ErrorContext::new(error)
            .with_suggestion("Quote glob patterns so the shell does not expand them, e.g. 'src/**/*.jsx'"),

        CloudcomError::CacheDesync { .. } => ErrorContext::new(error)
            .with_suggestion("Run a build; desynchronized components are refetched automatically")
            .with_details("An entry marked successful whose artifact file is missing is treated as a cache miss"),

        _ => ErrorContext::new(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_display_includes_details_and_suggestion() {
        let ctx = ErrorContext::new(CloudcomError::ConfigNotFound {
            path: "cloudcom.toml".to_string(),
        })
        .with_details("details here")
        .with_suggestion("do this");

        let rendered = ctx.to_string();
        assert!(rendered.contains("Configuration file not found: cloudcom.toml"));
        assert!(rendered.contains("Details: details here"));
        assert!(rendered.contains("Suggestion: do this"));
    }

    #[test]
    fn test_user_friendly_error_for_known_variant() {
        let err = anyhow::Error::from(CloudcomError::ConfigNotFound {
            path: "x.toml".to_string(),
        });
        let ctx = user_friendly_error(err);
        assert!(matches!(ctx.error, CloudcomError::ConfigNotFound { .. }));
        assert!(ctx.suggestion.unwrap().contains("cloudcom init"));
    }

    #[test]
    fn test_user_friendly_error_keeps_cause_chain() {
        let err = anyhow::anyhow!("root cause").context("outer failure");
        let ctx = user_friendly_error(err);
        let message = ctx.error.to_string();
        assert!(message.contains("outer failure"));
        assert!(message.contains("Caused by:"));
        assert!(message.contains("root cause"));
    }

    #[test]
    fn test_clone_preserves_io_message() {
        let err = CloudcomError::IoError(std::io::Error::other("disk gone"));
        let cloned = err.clone();
        assert!(cloned.to_string().contains("disk gone"));
    }
}
