//! # Host Bridge Traits
//!
//! Capability traits the host application implements for the sync core.
//!
//! ## Overview
//!
//! The core never talks to the network, the key-value store, the file system
//! or the session layer directly. Each of those is a trait defined here and
//! injected at construction time, which keeps the core testable and lets each
//! mobile host use its native stack.
//!
//! ## Traits
//!
//! - [`RemoteStoreClient`](remote::RemoteStoreClient) - Remote source of truth (table selects and RPCs)
//! - [`KeyValueStore`](storage::KeyValueStore) - String key-value persistence for the TTL cache
//! - [`OfflineFileStore`](storage::OfflineFileStore) - Index of locally downloaded media
//! - [`IdentityProvider`](session::IdentityProvider) - Currently signed-in user
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with a descriptive error when a required capability is
//! missing:
//!
//! ```ignore
//! let remote = builder.remote
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "RemoteStoreClient".to_string(),
//!         message: "No remote store client provided".to_string(),
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits return [`BridgeError`](error::BridgeError). Implementations
//! should map connectivity failures to `Transport`, deadline expiry to
//! `Timeout`, and local storage failures to `DatabaseError` or `Io`.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared across async
//! tasks behind an `Arc`.

pub mod error;
pub mod remote;
pub mod session;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use remote::{Filter, Order, RemoteRow, RemoteStoreClient, SelectRequest};
pub use session::{IdentityProvider, StaticIdentity};
pub use storage::{KeyValueStore, OfflineFileStore};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
