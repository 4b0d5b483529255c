//! Error types for Wiretap

use thiserror::Error;

/// Result type for Wiretap operations
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Errors that can occur while capturing traffic
///
/// Only [`CaptureError::Transport`] ever reaches the wrapped call's caller;
/// every other variant is logged and discarded where it occurs so that
/// capture stays invisible to the instrumented client.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Insert was given a record that already carries an identity
    #[error("record already has identity {0}")]
    AlreadyIdentified(i64),

    /// Update was given a record that was never inserted
    #[error("record has no identity")]
    MissingIdentity,

    /// Update was given an identity the store does not know
    #[error("record not found: {0}")]
    RecordNotFound(i64),

    /// Store backend failure
    #[error("store error: {0}")]
    Store(String),

    /// The wrapped HTTP call itself failed
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}
