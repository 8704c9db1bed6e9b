//! Queue and resolver working together over a directory of downloads

use bridge_desktop::DirectoryOfflineFileStore;
use core_library::MediaRecord;
use core_playback::{
    AdvanceDirection, AdvanceOutcome, MediaUrlBuilder, PlayableRef, QueueStateStore, RepeatMode,
    TrackResolver,
};
use std::sync::Arc;

fn songs() -> Vec<MediaRecord> {
    (1..=3)
        .map(|i| {
            let mut song = MediaRecord::new(format!("song-{}", i), "u1", format!("Song {}", i), "A");
            song.media_path = format!("songs/song-{}.mp3", i);
            song
        })
        .collect()
}

#[tokio::test]
async fn test_plays_through_queue_mixing_local_and_remote() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("song-2.mp3"), b"audio").unwrap();

    let resolver = TrackResolver::new(
        Arc::new(DirectoryOfflineFileStore::with_root(dir.path().to_path_buf())),
        MediaUrlBuilder::new(Some("https://media.example.com")).unwrap(),
    );
    let queue = QueueStateStore::with_seed(3);
    let ui_handle = queue.clone();

    let first = queue
        .build_queue(songs(), Some("song-1"), Some("library".to_string()))
        .unwrap();
    assert_eq!(ui_handle.current_song_id().as_deref(), Some("song-1"));

    let playable = resolver.resolve(&first).await;
    assert_eq!(
        playable.uri().as_deref(),
        Some("https://media.example.com/songs/song-1.mp3")
    );

    queue.advance(AdvanceDirection::Next).unwrap();
    let second = ui_handle.current_track().unwrap();
    match resolver.resolve(&second).await {
        PlayableRef::Local { path, fallback_url, .. } => {
            assert_eq!(path, dir.path().join("song-2.mp3"));
            assert_eq!(
                fallback_url.as_deref(),
                Some("https://media.example.com/songs/song-2.mp3")
            );
        }
        other => panic!("expected local copy, got {:?}", other),
    }
}

#[tokio::test]
async fn test_track_end_handling_is_deduplicated() {
    let queue = QueueStateStore::with_seed(3);
    queue.build_queue(songs(), None, None);
    queue.set_repeat_mode(RepeatMode::Queue);

    let mut advanced = Vec::new();
    // The player may report the same track ending more than once.
    for _ in 0..2 {
        let ended = queue.current_song_id().unwrap();
        for _ in 0..2 {
            if queue.mark_processed(&ended) {
                advanced.push(queue.advance(AdvanceDirection::Next).unwrap());
            }
        }
    }

    assert_eq!(advanced.len(), 2);
    assert_eq!(
        advanced.last(),
        Some(&AdvanceOutcome::Moved {
            index: 2,
            song_id: "song-3".to_string()
        })
    );
}

#[tokio::test]
async fn test_shuffle_survives_rebuild() {
    let queue = QueueStateStore::with_seed(11);
    queue.toggle_shuffle(true);
    queue.set_repeat_mode(RepeatMode::Track);

    queue.build_queue(songs(), Some("song-3"), Some("playlist-9".to_string()));
    let state = queue.snapshot();

    assert!(state.is_shuffle_enabled);
    assert_eq!(state.repeat_mode, RepeatMode::Track);
    assert_eq!(state.current_queue[0].id, "song-3");
    assert_eq!(state.context.as_deref(), Some("playlist-9"));
}
