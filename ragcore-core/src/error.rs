//! Error taxonomy for the pipeline.
//!
//! Four kinds, matching the propagation policy: malformed input never
//! aborts a whole run, parse failures are scoped to the one document/
//! page/object they occur in, store errors are retried before they
//! bubble up, and invariant violations are bugs, not user errors.

use std::fmt;

/// The leaf error type every stage in the pipeline can produce.
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    /// Bad input handed to the pipeline by the caller: an unreadable
    /// file, an unsupported archive member, a malformed config.
    #[error("invalid input: {0}")]
    Input(String),

    /// A parse failure scoped to one document, page, or object. These
    /// are recorded and skipped rather than aborting the whole run.
    #[error("parse error in {context}: {message}")]
    Parse { context: String, message: String },

    /// A store round-trip failed after exhausting retries.
    #[error("store operation failed after retries: {0}")]
    StoreTransient(String),

    /// An internal invariant was violated — a bug, not a user error.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl CoreError {
    pub fn parse(context: impl Into<String>, message: impl fmt::Display) -> Self {
        CoreError::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        CoreError::Invariant(message.into())
    }

    /// Whether a caller should retry the operation that produced this
    /// error (only transient store failures are worth retrying).
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::StoreTransient(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
