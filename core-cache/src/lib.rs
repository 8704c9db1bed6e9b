//! # TTL Query Cache
//!
//! Time-bounded persistence of query results on top of a host
//! [`KeyValueStore`](bridge_traits::storage::KeyValueStore).
//!
//! Every payload is stored as a JSON envelope `{ "data": .., "timestamp": .. }`
//! under `"{prefix}:{key}"`. Expired and malformed entries are evicted lazily
//! when read. Store failures are logged and absorbed, so callers only ever see
//! a hit or a miss.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_cache::{TtlCacheConfig, TtlCacheManager};
//!
//! let cache = TtlCacheManager::new(store, clock, TtlCacheConfig::default());
//! cache.save("catalog", &songs).await;
//! let songs: Option<Vec<Song>> = cache.load("catalog").await;
//! ```

pub mod config;
pub mod envelope;
mod error;
pub mod manager;
pub mod stats;

pub use config::{TtlCacheConfig, DEFAULT_CACHE_PREFIX, DEFAULT_MAX_AGE};
pub use envelope::CacheEnvelope;
pub use manager::TtlCacheManager;
pub use stats::CacheStats;
