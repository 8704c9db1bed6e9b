//! # Playback State Module
//!
//! Playback-side state that lives in the core rather than in the host player.
//!
//! ## Overview
//!
//! - [`QueueStateStore`](queue::QueueStateStore): the single shared playback
//!   queue (order, shuffle, repeat, current track). Every clone of the handle
//!   sees the same state, and observers can subscribe to snapshots.
//! - [`TrackResolver`](resolver::TrackResolver): turns a mirrored media record
//!   into something playable, preferring a downloaded local file and falling
//!   back to the remote URL.
//!
//! Audio decoding and output stay in the host.

pub mod error;
pub mod queue;
pub mod resolver;

pub use error::{PlaybackError, Result};
pub use queue::{AdvanceDirection, AdvanceOutcome, QueueState, QueueStateStore, RepeatMode};
pub use resolver::{MediaUrlBuilder, PlayableRef, TrackResolver};
