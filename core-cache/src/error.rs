use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Failures inside the cache. None of these leave the public API; the manager
/// logs them and reports a miss instead.
#[derive(Error, Debug)]
pub(crate) enum CacheError {
    #[error("Key-value store error: {0}")]
    Store(#[from] BridgeError),

    #[error("Corrupted cache entry '{key}': {message}")]
    Corruption { key: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub(crate) type Result<T> = std::result::Result<T, CacheError>;
