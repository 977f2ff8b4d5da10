//! Structured file system errors
//!
//! File operations capture their context (what was being done, to which path,
//! and on whose behalf) at the call site, so the message shown to the user
//! does not depend on parsing an `io::Error` string later.

use std::path::PathBuf;
use thiserror::Error;

/// Context recorded for a file operation
#[derive(Debug, Clone)]
pub struct FileOperationContext {
    /// The type of operation being performed
    pub operation: FileOperation,
    /// The file path being accessed
    pub file_path: PathBuf,
    /// Why the file is being accessed
    pub purpose: String,
    /// The component that initiated the operation
    pub caller: String,
}

/// Types of file operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOperation {
    /// Reading a file completely
    Read,
    /// Writing a file
    Write,
    /// Creating a directory
    CreateDir,
    /// Acquiring an advisory lock
    Lock,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::CreateDir => write!(f, "creating directory"),
            FileOperation::Lock => write!(f, "locking"),
        }
    }
}

impl FileOperationContext {
    /// Create a new file operation context
    pub fn new(
        operation: FileOperation,
        file_path: impl Into<PathBuf>,
        purpose: impl Into<String>,
        caller: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            file_path: file_path.into(),
            purpose: purpose.into(),
            caller: caller.into(),
        }
    }
}

/// File operation error with full context
#[derive(Error, Debug)]
#[error("File operation failed: {operation} {}", file_path.display())]
pub struct FileOperationError {
    /// The type of operation that failed
    pub operation: FileOperation,
    /// The file path that was being accessed
    pub file_path: PathBuf,
    /// Why the file was being accessed
    pub purpose: String,
    /// What code initiated the operation
    pub caller: String,
    /// The underlying IO error
    #[source]
    pub source: std::io::Error,
}

impl FileOperationError {
    /// Create a new file operation error from context and IO error
    pub fn new(context: FileOperationContext, source: std::io::Error) -> Self {
        Self {
            operation: context.operation,
            file_path: context.file_path,
            purpose: context.purpose,
            caller: context.caller,
            source,
        }
    }

    /// User-facing message with a hint for the common error kinds.
    pub fn user_message(&self) -> String {
        let mut message = format!(
            "Failed {} '{}' for {} ({})",
            self.operation,
            self.file_path.display(),
            self.purpose,
            self.caller
        );

        match self.source.kind() {
            std::io::ErrorKind::NotFound => {
                message.push_str("\n\nThe file does not exist at the specified path.");
            }
            std::io::ErrorKind::PermissionDenied => {
                message.push_str(&format!(
                    "\n\nPermission denied. Check file/directory permissions for: {}",
                    self.file_path.display()
                ));
            }
            std::io::ErrorKind::InvalidData => {
                message.push_str("\n\nThe file contains invalid data or encoding.");
                message.push_str("\nSource files must be valid UTF-8 text.");
            }
            _ => {
                message.push_str(&format!("\n\nError details: {}", self.source));
            }
        }

        message
    }
}

/// Extension trait for Result types to add file operation context
pub trait FileResultExt<T> {
    /// Add file operation context to a Result
    fn with_file_context(
        self,
        operation: FileOperation,
        file_path: impl Into<PathBuf>,
        purpose: impl Into<String>,
        caller: impl Into<String>,
    ) -> Result<T, FileOperationError>;
}

impl<T> FileResultExt<T> for Result<T, std::io::Error> {
    fn with_file_context(
        self,
        operation: FileOperation,
        file_path: impl Into<PathBuf>,
        purpose: impl Into<String>,
        caller: impl Into<String>,
    ) -> Result<T, FileOperationError> {
        self.map_err(|io_error| {
            let context = FileOperationContext::new(operation, file_path, purpose, caller);
            FileOperationError::new(context, io_error)
        })
    }
}
