//! # Sync Module
//!
//! Keeps the local mirror consistent with the remote source of truth.
//!
//! ## Components
//!
//! - **Domains** (`domain`): what can be synced, its [`DomainKind`] and scope rules
//! - **Reconciliation** (`reconcile`): row decoding and transactional apply
//! - **Retry** (`retry`): pluggable [`RetryPolicy`] for remote fetches
//! - **Sync Coordinator** (`coordinator`): fetch, apply, coalesce, emit events
//! - **Scheduler** (`scheduler`): periodic background sync

pub mod coordinator;
pub mod domain;
pub mod error;
mod reconcile;
pub mod retry;
pub mod scheduler;

pub use coordinator::{SkipReason, SyncConfig, SyncCoordinator, SyncCoordinatorBuilder, SyncOutcome};
pub use domain::{CacheInvalidation, DomainKind, SyncDomain, SyncTarget, DEFAULT_TRENDING_PERIOD};
pub use error::{Result, SyncError};
pub use retry::{ExponentialBackoff, NoRetry, RetryPolicy};
pub use scheduler::SyncScheduler;
