//! # Playback Error Types

use thiserror::Error;

/// Errors returned by queue and resolver operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// The requested track id is not part of the current queue.
    #[error("Track not in queue: {0}")]
    TrackNotInQueue(String),

    /// Operation needs at least one queued track.
    #[error("Queue is empty")]
    EmptyQueue,

    /// Media base URL could not be parsed or cannot be used as a base.
    #[error("Invalid media base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
