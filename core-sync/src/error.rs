use thiserror::Error;

/// Sync failures.
///
/// `Clone` so that every caller awaiting a coalesced sync receives the same
/// error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The remote snapshot could not be fetched or decoded. Local state is
    /// untouched.
    #[error("Remote fetch failed for {domain}: {message}")]
    RemoteFetch { domain: String, message: String },

    /// Applying the snapshot failed and the transaction was rolled back.
    #[error("Sync transaction failed for {domain}: {message}")]
    Transaction { domain: String, message: String },

    #[error("Invalid scope '{scope}' for {domain}: {reason}")]
    InvalidScope {
        domain: String,
        scope: String,
        reason: String,
    },

    #[error("Unknown sync domain: {0}")]
    UnknownDomain(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Sync cancelled")]
    Cancelled,

    /// The task running the sync panicked or was aborted.
    #[error("Sync task failed: {0}")]
    TaskFailed(String),
}

impl SyncError {
    /// Whether a later attempt at the same sync could succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SyncError::RemoteFetch { .. } | SyncError::Transaction { .. } | SyncError::Cancelled
        )
    }
}

impl From<core_library::LibraryError> for SyncError {
    fn from(err: core_library::LibraryError) -> Self {
        SyncError::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
