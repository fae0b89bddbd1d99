//! Error types for the notification sender.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the broadside error type.
pub type Result<T> = std::result::Result<T, BroadsideError>;

/// Main error type for the notification sender.
///
/// Only run-level preconditions surface as errors. Problems local to a single
/// filter line, address, or batch are absorbed with a logged warning and never
/// interrupt the overall run.
#[derive(Error, Debug)]
pub enum BroadsideError {
    /// Filter file is structurally corrupt (no parseable rule lines at all)
    #[error("Filter file unparseable: {0}")]
    Parse(String),

    /// Invalid configuration (e.g., zero batch size, missing attachment file)
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Attachment exceeds the per-attachment size ceiling
    #[error("Attachment too large: {path} is {size} bytes (limit {limit})")]
    AttachmentTooLarge {
        path: PathBuf,
        size: u64,
        limit: u64,
    },

    /// Transport failure reported by the send capability.
    ///
    /// Recoverable at batch granularity: triggers the retry machine rather
    /// than aborting the run.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// I/O error (e.g., statting an attachment)
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// General error from anyhow
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
