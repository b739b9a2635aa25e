//! Unified error type for mediaforged.
//!
//! All crates funnel their failures into [`Error`]. [`Error::is_transient`]
//! tells callers whether retrying on a later run can succeed.

use std::fmt;

/// Unified error type covering all failure modes in mediaforged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "item", "pool").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// Input or configuration failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A conflicting operation is already in progress.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A remote call failed (connection, timeout, non-success status).
    #[error("Transport error [{url}]: {message}")]
    Transport {
        /// The URL that was requested.
        url: String,
        /// Human-readable error description.
        message: String,
    },

    /// A fetched document could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The operation observed a cancellation request.
    #[error("Operation cancelled")]
    Cancelled,

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the failure is scoped to an external resource and may succeed
    /// on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Io { .. } | Error::Transport { .. } | Error::Parse(_)
        )
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Transport`].
    pub fn transport(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::Transport {
            url: url.into(),
            message: message.to_string(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
