//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux). Mobile hosts inject their own adapters.
//!
//! ## Overview
//!
//! - `KeyValueStore` using a SQLite-backed table
//! - `OfflineFileStore` using a directory of downloaded media files
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DirectoryOfflineFileStore, SqliteKeyValueStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let kv = SqliteKeyValueStore::new("data/kv.db".into()).await.unwrap();
//!     let offline = DirectoryOfflineFileStore::new();
//!
//!     // Use in core configuration
//! }
//! ```

mod kv_store;
mod offline_files;

pub use kv_store::SqliteKeyValueStore;
pub use offline_files::DirectoryOfflineFileStore;
