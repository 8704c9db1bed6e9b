//! Workspace entry crate.
//!
//! Exposes the service façade behind feature flags so host applications can
//! depend on `media-sync-workspace` alone instead of wiring each crate.

#[cfg(feature = "core")]
pub use core_service::*;
