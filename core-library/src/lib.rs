//! # Local Library Store
//!
//! Owns the local mirror database: schema, migrations and repositories for
//! media records, playlists, likes, section caches and pending
//! reconciliation markers.
//!
//! The remote store is authoritative. Everything written here is either a
//! copy of remote rows applied by a sync run or device-local state (local file
//! paths) that sync never overwrites.

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{LibraryError, Result};
pub use models::{
    LikeRecord, MediaRecord, PendingReconciliation, PlaylistRecord, SectionCacheEntry,
    GLOBAL_SCOPE,
};
