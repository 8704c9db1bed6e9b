//! # Repository Pattern Implementation
//!
//! Read access goes through the repository traits. Writes that belong to a
//! sync run are associated functions taking `&mut Transaction<'_, Sqlite>` so
//! the sync coordinator can group upserts, prunes and section replacement
//! into one atomic unit.
//!
//! ## Available Repositories
//!
//! - `MediaRepository` - Catalog media records
//! - `PlaylistRepository` - User playlists
//! - `LikeRepository` - User likes keyed by (user, media)
//! - `SectionCacheRepository` - Ordered id lists for ranked views
//! - `PendingReconciliationRepository` - Optimistic writes awaiting remote truth

pub mod like;
pub mod media;
pub mod pending;
pub mod playlist;
pub mod section;

pub use like::{LikeRepository, SqliteLikeRepository};
pub use media::{MediaRepository, SqliteMediaRepository};
pub use pending::{PendingReconciliationRepository, SqlitePendingReconciliationRepository};
pub use playlist::{PlaylistRepository, SqlitePlaylistRepository};
pub use section::{SectionCacheRepository, SqliteSectionCacheRepository};
