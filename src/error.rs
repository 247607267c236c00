//! Error type shared by all reconciliation steps.

use thiserror::Error;

/// Errors that fail a reconciliation pass and ask for a retry.
///
/// Absent objects are not errors: lookups report them as `None`.
#[derive(Debug, Error)]
pub enum Error {
    /// A read or write against the Kubernetes API failed, including
    /// optimistic-concurrency conflicts.
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// An object could not be encoded for submission.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An object is missing a field needed to act on it.
    #[error("object is missing {0}")]
    MissingObjectKey(&'static str),
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;
