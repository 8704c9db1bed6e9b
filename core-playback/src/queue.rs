//! # Queue State Store
//!
//! One playback queue shared by every component that reads or changes it.
//!
//! `QueueStateStore` is a cheap `Clone` handle; all clones point at the same
//! state, so a mutation through one handle is visible through every other
//! handle immediately. Every mutation also publishes a fresh [`QueueState`]
//! snapshot on a watch channel (see [`QueueStateStore::subscribe`]).
//!
//! ## Invariants
//!
//! - `current_queue` is always a permutation of `original_queue`.
//! - A non-empty `current_song_id` is always present in `current_queue`.
//! - `original_queue` only changes through [`QueueStateStore::build_queue`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! let queue = QueueStateStore::new();
//! queue.build_queue(songs, Some("song-1"), Some("library".into()));
//! queue.toggle_shuffle(true);
//!
//! match queue.advance(AdvanceDirection::Next)? {
//!     AdvanceOutcome::Moved { song_id, .. } => player.play(&song_id),
//!     AdvanceOutcome::RestartCurrent { .. } => player.seek_to_start(),
//!     AdvanceOutcome::Unchanged { .. } => player.stop(),
//! }
//! ```

use crate::error::{PlaybackError, Result};
use core_library::models::MediaRecord;
use core_runtime::events::{CoreEvent, EventBus, QueueEvent};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Repeat behaviour at track and queue boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    /// Replay the current track
    Track,
    /// Wrap around at either end of the queue
    Queue,
}

impl RepeatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::Track => "track",
            RepeatMode::Queue => "queue",
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceDirection {
    Next,
    Previous,
}

/// What the player should do after [`QueueStateStore::advance`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// The current track changed
    Moved { index: usize, song_id: String },
    /// Repeat-track mode: play the same track again from the start
    RestartCurrent { index: usize, song_id: String },
    /// Already at the boundary with repeat off; nothing changed
    Unchanged { index: usize, song_id: String },
}

impl AdvanceOutcome {
    pub fn song_id(&self) -> &str {
        match self {
            AdvanceOutcome::Moved { song_id, .. }
            | AdvanceOutcome::RestartCurrent { song_id, .. }
            | AdvanceOutcome::Unchanged { song_id, .. } => song_id,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            AdvanceOutcome::Moved { index, .. }
            | AdvanceOutcome::RestartCurrent { index, .. }
            | AdvanceOutcome::Unchanged { index, .. } => *index,
        }
    }
}

/// Snapshot of the playback queue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueState {
    /// Tracks in the order the queue was built with
    pub original_queue: Vec<MediaRecord>,
    /// Play order: `original_queue` or a shuffled permutation of it
    pub current_queue: Vec<MediaRecord>,
    pub is_shuffle_enabled: bool,
    pub repeat_mode: RepeatMode,
    pub current_song_id: Option<String>,
    /// Last track whose end-of-track was handled
    pub last_processed_track_id: Option<String>,
    /// Where the queue was started from, e.g. "library" or a playlist id
    pub context: Option<String>,
}

impl QueueState {
    pub fn len(&self) -> usize {
        self.current_queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current_queue.is_empty()
    }

    /// Position of the current track in `current_queue`
    pub fn current_index(&self) -> Option<usize> {
        let id = self.current_song_id.as_deref()?;
        self.current_queue.iter().position(|t| t.id == id)
    }

    pub fn current_track(&self) -> Option<&MediaRecord> {
        self.current_index().map(|i| &self.current_queue[i])
    }

    fn contains(&self, id: &str) -> bool {
        self.current_queue.iter().any(|t| t.id == id)
    }
}

/// Shared handle onto the playback queue
#[derive(Clone)]
pub struct QueueStateStore {
    state: Arc<RwLock<QueueState>>,
    publisher: Arc<watch::Sender<QueueState>>,
    rng: Arc<Mutex<StdRng>>,
    event_bus: Option<Arc<EventBus>>,
}

impl Default for QueueStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueStateStore {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Store whose shuffles are reproducible for a given seed.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        let (publisher, _) = watch::channel(QueueState::default());
        Self {
            state: Arc::new(RwLock::new(QueueState::default())),
            publisher: Arc::new(publisher),
            rng: Arc::new(Mutex::new(rng)),
            event_bus: None,
        }
    }

    /// Emit queue events on `event_bus`.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> QueueState {
        self.state.read().clone()
    }

    pub fn current_song_id(&self) -> Option<String> {
        self.state.read().current_song_id.clone()
    }

    pub fn current_track(&self) -> Option<MediaRecord> {
        self.state.read().current_track().cloned()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.state.read().current_index()
    }

    pub fn is_shuffle_enabled(&self) -> bool {
        self.state.read().is_shuffle_enabled
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.state.read().repeat_mode
    }

    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().is_empty()
    }

    /// Receive a snapshot after every mutation.
    pub fn subscribe(&self) -> watch::Receiver<QueueState> {
        self.publisher.subscribe()
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Replace the queue.
    ///
    /// Duplicate ids keep their first occurrence. The current track is
    /// `start_id` when it is in `tracks`, otherwise the first track. With
    /// shuffle on, the current track is placed first in the shuffled order.
    /// Shuffle and repeat settings carry over from the previous queue.
    ///
    /// Returns the new current track.
    pub fn build_queue(
        &self,
        tracks: Vec<MediaRecord>,
        start_id: Option<&str>,
        context: Option<String>,
    ) -> Option<MediaRecord> {
        let mut seen = HashSet::new();
        let tracks: Vec<MediaRecord> = tracks
            .into_iter()
            .filter(|t| seen.insert(t.id.clone()))
            .collect();

        let start = start_id
            .and_then(|id| tracks.iter().find(|t| t.id == id))
            .or_else(|| tracks.first())
            .map(|t| t.id.clone());

        let current = self.mutate(|state, rng| {
            state.current_queue = if state.is_shuffle_enabled {
                shuffled_with_first(&tracks, start.as_deref(), rng)
            } else {
                tracks.clone()
            };
            state.original_queue = tracks;
            state.current_song_id = start;
            state.last_processed_track_id = None;
            state.context = context;
            state.current_track().cloned()
        });

        let state = self.snapshot();
        info!(
            track_count = state.len(),
            context = ?state.context,
            shuffle = state.is_shuffle_enabled,
            "Built playback queue"
        );
        self.emit(QueueEvent::Built {
            context: state.context.clone(),
            track_count: state.len() as u32,
            current_song_id: state.current_song_id.clone(),
        });

        current
    }

    /// Turn shuffle on or off.
    ///
    /// Enabling draws a fresh permutation of the original order with the
    /// current track first. Disabling restores the original order.
    pub fn toggle_shuffle(&self, enabled: bool) {
        let repeat = self.mutate(|state, rng| {
            state.current_queue = if enabled {
                shuffled_with_first(
                    &state.original_queue,
                    state.current_song_id.as_deref(),
                    rng,
                )
            } else {
                state.original_queue.clone()
            };
            state.is_shuffle_enabled = enabled;
            state.repeat_mode
        });

        debug!(enabled, "Shuffle toggled");
        self.emit(QueueEvent::ModeChanged {
            shuffle: enabled,
            repeat: repeat.to_string(),
        });
    }

    pub fn set_repeat_mode(&self, mode: RepeatMode) {
        let shuffle = self.mutate(|state, _| {
            state.repeat_mode = mode;
            state.is_shuffle_enabled
        });

        debug!(mode = %mode, "Repeat mode set");
        self.emit(QueueEvent::ModeChanged {
            shuffle,
            repeat: mode.to_string(),
        });
    }

    /// Make `song_id` the current track.
    ///
    /// # Errors
    /// `TrackNotInQueue` if `song_id` is not queued; the state is unchanged.
    pub fn set_current_song_id(&self, song_id: &str) -> Result<()> {
        self.mutate(|state, _| {
            if !state.contains(song_id) {
                return Err(PlaybackError::TrackNotInQueue(song_id.to_string()));
            }
            state.current_song_id = Some(song_id.to_string());
            Ok(())
        })?;

        self.emit(QueueEvent::CurrentChanged {
            current_song_id: Some(song_id.to_string()),
        });
        Ok(())
    }

    /// Step to the next or previous track according to the repeat mode.
    ///
    /// # Errors
    /// `EmptyQueue` if nothing is queued.
    pub fn advance(&self, direction: AdvanceDirection) -> Result<AdvanceOutcome> {
        let outcome = self.mutate(|state, _| {
            let len = state.current_queue.len();
            if len == 0 {
                return Err(PlaybackError::EmptyQueue);
            }

            let outcome = match (state.current_index(), state.repeat_mode) {
                (Some(index), RepeatMode::Track) => AdvanceOutcome::RestartCurrent {
                    index,
                    song_id: state.current_queue[index].id.clone(),
                },
                (None, _) => {
                    let index = match direction {
                        AdvanceDirection::Next => 0,
                        AdvanceDirection::Previous => len - 1,
                    };
                    AdvanceOutcome::Moved {
                        index,
                        song_id: state.current_queue[index].id.clone(),
                    }
                }
                (Some(index), repeat) => {
                    let wrap = repeat == RepeatMode::Queue;
                    let target = match direction {
                        AdvanceDirection::Next if index + 1 < len => Some(index + 1),
                        AdvanceDirection::Next if wrap => Some(0),
                        AdvanceDirection::Previous if index > 0 => Some(index - 1),
                        AdvanceDirection::Previous if wrap => Some(len - 1),
                        _ => None,
                    };
                    match target {
                        Some(next) if next != index => AdvanceOutcome::Moved {
                            index: next,
                            song_id: state.current_queue[next].id.clone(),
                        },
                        _ => AdvanceOutcome::Unchanged {
                            index,
                            song_id: state.current_queue[index].id.clone(),
                        },
                    }
                }
            };

            if let AdvanceOutcome::Moved { song_id, .. } = &outcome {
                state.current_song_id = Some(song_id.clone());
            }
            Ok(outcome)
        })?;

        debug!(?direction, ?outcome, "Advanced queue");
        if let AdvanceOutcome::Moved { song_id, .. } = &outcome {
            self.emit(QueueEvent::CurrentChanged {
                current_song_id: Some(song_id.clone()),
            });
        }
        Ok(outcome)
    }

    /// Record that the end of `track_id` has been handled.
    ///
    /// Returns `false` when `track_id` was already the last processed track,
    /// so duplicate end-of-track notifications can be ignored.
    pub fn mark_processed(&self, track_id: &str) -> bool {
        self.mutate(|state, _| {
            if state.last_processed_track_id.as_deref() == Some(track_id) {
                return false;
            }
            state.last_processed_track_id = Some(track_id.to_string());
            true
        })
    }

    /// Drop the queue and restore default modes.
    pub fn reset(&self) {
        self.mutate(|state, _| *state = QueueState::default());
        info!("Playback queue reset");
        self.emit(QueueEvent::Cleared);
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut QueueState, &mut StdRng) -> R) -> R {
        let mut state = self.state.write();
        let result = {
            let mut rng = self.rng.lock();
            f(&mut state, &mut rng)
        };
        // Publish under the write lock so subscribers see mutations in order.
        self.publisher.send_replace(state.clone());
        result
    }

    fn emit(&self, event: QueueEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Queue(event)).ok();
        }
    }
}

impl fmt::Debug for QueueStateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("QueueStateStore")
            .field("len", &state.len())
            .field("current_song_id", &state.current_song_id)
            .field("shuffle", &state.is_shuffle_enabled)
            .field("repeat", &state.repeat_mode)
            .finish()
    }
}

/// Random permutation of `tracks` with `first_id` (if present) at index 0.
fn shuffled_with_first(
    tracks: &[MediaRecord],
    first_id: Option<&str>,
    rng: &mut StdRng,
) -> Vec<MediaRecord> {
    let mut shuffled = tracks.to_vec();
    shuffled.shuffle(rng);

    if let Some(id) = first_id {
        if let Some(pos) = shuffled.iter().position(|t| t.id == id) {
            let track = shuffled.remove(pos);
            shuffled.insert(0, track);
        }
    }
    shuffled
}
