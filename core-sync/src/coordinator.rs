//! # Sync Coordinator
//!
//! Reconciles remote snapshots into the local mirror.
//!
//! ## Workflow
//!
//! Every domain runs the same template:
//!
//! 1. Resolve the scope (explicit, signed-in user, or domain default). A
//!    user-scoped domain with no identity returns an empty outcome.
//! 2. Fetch the full remote snapshot under the fetch timeout and the injected
//!    [`RetryPolicy`]. Nothing local is touched until the fetch completes.
//! 3. Decode every row. A malformed row fails the sync as a remote error.
//! 4. An empty snapshot clears a mirror slice but leaves a derived section
//!    untouched.
//! 5. In one transaction: upsert, prune or replace the section, resolve
//!    pending markers. Any failure rolls the whole transaction back.
//! 6. On success invalidate dependent query-cache entries and emit events.
//!
//! Concurrent calls for the same domain and resolved scope share one
//! in-flight run, so only one fetch and one transaction happen. The run is a
//! spawned task: dropping every caller does not stop it mid-transaction.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{SyncCoordinator, SyncDomain};
//!
//! let coordinator = SyncCoordinator::builder(pool, remote, identity)
//!     .event_bus(event_bus)
//!     .cache(cache)
//!     .build();
//!
//! let outcome = coordinator.sync(SyncDomain::Catalog, None).await?;
//! println!("synced {} songs", outcome.synced_count);
//! ```

use crate::domain::{CacheInvalidation, DomainKind, SyncDomain, SyncKey, SyncTarget};
use crate::reconcile::{apply_snapshot, decode_snapshot, Snapshot};
use crate::retry::{ExponentialBackoff, RetryPolicy};
use crate::{Result, SyncError};
use bridge_traits::error::BridgeError;
use bridge_traits::remote::{RemoteRow, RemoteStoreClient, SelectRequest};
use bridge_traits::session::IdentityProvider;
use bridge_traits::time::{Clock, SystemClock};
use core_cache::TtlCacheManager;
use core_library::models::PendingReconciliation;
use core_library::repositories::{
    PendingReconciliationRepository, SqlitePendingReconciliationRepository,
};
use core_runtime::config::SyncSettings;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, SyncEvent};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn, Instrument};

/// Sync coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Deadline for a single remote fetch attempt
    pub fetch_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from_settings(&SyncSettings::default())
    }
}

impl SyncConfig {
    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self {
            fetch_timeout: Duration::from_millis(settings.fetch_timeout_ms),
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}

/// Why a sync finished without applying anything
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// User-scoped domain with no explicit scope and nobody signed in
    NoIdentity,
    /// Derived domain returned no rows; the previous section was kept
    EmptyDerived,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoIdentity => "no_identity",
            SkipReason::EmptyDerived => "empty_derived",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub domain: SyncDomain,
    /// Resolved scope; `None` when the run was skipped before resolution
    pub scope: Option<String>,
    /// Remote records processed
    pub synced_count: u64,
    /// Local rows deleted because the remote no longer has them
    pub pruned_count: u64,
    /// Pending reconciliation markers cleared by this run
    pub resolved_pending: u64,
    pub skipped: Option<SkipReason>,
}

impl SyncOutcome {
    fn skipped(domain: SyncDomain, scope: Option<String>, reason: SkipReason) -> Self {
        Self {
            domain,
            scope,
            synced_count: 0,
            pruned_count: 0,
            resolved_pending: 0,
            skipped: Some(reason),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

type SharedSync = Shared<BoxFuture<'static, Result<SyncOutcome>>>;

struct Inner {
    pool: SqlitePool,
    remote: Arc<dyn RemoteStoreClient>,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    cache: Option<TtlCacheManager>,
    event_bus: Option<Arc<EventBus>>,
    retry: Arc<dyn RetryPolicy>,
    config: SyncConfig,
    pending: SqlitePendingReconciliationRepository,
    in_flight: Mutex<HashMap<SyncKey, SharedSync>>,
    shutdown: CancellationToken,
}

/// Builder for [`SyncCoordinator`]
pub struct SyncCoordinatorBuilder {
    pool: SqlitePool,
    remote: Arc<dyn RemoteStoreClient>,
    identity: Arc<dyn IdentityProvider>,
    clock: Option<Arc<dyn Clock>>,
    cache: Option<TtlCacheManager>,
    event_bus: Option<Arc<EventBus>>,
    retry: Option<Arc<dyn RetryPolicy>>,
    config: SyncConfig,
}

impl SyncCoordinatorBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Query cache whose dependent entries are invalidated after each sync
    pub fn cache(mut self, cache: TtlCacheManager) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Defaults to [`ExponentialBackoff`] with the default sync settings
    pub fn retry_policy(mut self, retry: Arc<dyn RetryPolicy>) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> SyncCoordinator {
        let pending = SqlitePendingReconciliationRepository::new(self.pool.clone());
        SyncCoordinator {
            inner: Arc::new(Inner {
                pool: self.pool,
                remote: self.remote,
                identity: self.identity,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                cache: self.cache,
                event_bus: self.event_bus,
                retry: self
                    .retry
                    .unwrap_or_else(|| Arc::new(ExponentialBackoff::default())),
                config: self.config,
                pending,
                in_flight: Mutex::new(HashMap::new()),
                shutdown: CancellationToken::new(),
            }),
        }
    }
}

/// Pulls remote snapshots and applies them to the local mirror
///
/// Cloning is cheap; clones share the in-flight map and shutdown token.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<Inner>,
}

impl SyncCoordinator {
    pub fn builder(
        pool: SqlitePool,
        remote: Arc<dyn RemoteStoreClient>,
        identity: Arc<dyn IdentityProvider>,
    ) -> SyncCoordinatorBuilder {
        SyncCoordinatorBuilder {
            pool,
            remote,
            identity,
            clock: None,
            cache: None,
            event_bus: None,
            retry: None,
            config: SyncConfig::default(),
        }
    }

    /// Sync one domain.
    ///
    /// `scope` overrides the domain default: an owner id for the catalog, a
    /// user id for playlists, likes and recommendations, a period for
    /// trending. Spotlight takes no scope.
    #[instrument(skip(self))]
    pub async fn sync(&self, domain: SyncDomain, scope: Option<&str>) -> Result<SyncOutcome> {
        if self.inner.shutdown.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let current_user = if domain.is_user_scoped() && scope.is_none() {
            self.inner.identity.current_user_id()
        } else {
            None
        };

        let Some(scope) = domain.resolve_scope(scope, current_user)? else {
            info!("No signed-in user; skipping user-scoped sync");
            self.inner.emit(CoreEvent::Sync(SyncEvent::Skipped {
                domain: domain.to_string(),
                scope: None,
                reason: SkipReason::NoIdentity.to_string(),
            }));
            return Ok(SyncOutcome::skipped(domain, None, SkipReason::NoIdentity));
        };

        let key = SyncKey { domain, scope };
        let shared = {
            let mut in_flight = self.inner.in_flight.lock();
            match in_flight.get(&key) {
                Some(existing) => {
                    debug!(scope = %key.log_scope(), "Joining in-flight sync");
                    existing.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let run_key = key.clone();
                    let handle = tokio::spawn(async move {
                        let result = inner.run(&run_key).await;
                        inner.in_flight.lock().remove(&run_key);
                        result
                    }
                    .in_current_span());
                    let future = async move {
                        handle
                            .await
                            .unwrap_or_else(|e| Err(SyncError::TaskFailed(e.to_string())))
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(key, future.clone());
                    future
                }
            }
        };

        shared.await
    }

    /// Sync a target.
    pub async fn sync_target(&self, target: &SyncTarget) -> Result<SyncOutcome> {
        self.sync(target.domain, target.scope.as_deref()).await
    }

    /// Sync each target in order. A failure does not stop the remaining
    /// targets.
    pub async fn sync_all(&self, targets: &[SyncTarget]) -> Vec<(SyncTarget, Result<SyncOutcome>)> {
        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            let result = self.sync_target(target).await;
            if let Err(e) = &result {
                warn!(domain = %target.domain, error = %e, "Sync target failed");
            }
            results.push((target.clone(), result));
        }
        results
    }

    /// Record that a local optimistic write to `entity_id` is unconfirmed.
    /// The next successful sync of the same domain and scope clears it.
    pub async fn mark_pending(
        &self,
        domain: SyncDomain,
        scope: &str,
        entity_id: &str,
        reason: &str,
    ) -> Result<()> {
        let now = self.inner.clock.unix_timestamp_millis();
        self.inner
            .pending
            .mark(domain.as_str(), scope, entity_id, reason, now)
            .await?;
        debug!(domain = %domain, entity_id, "Marked pending reconciliation");
        Ok(())
    }

    /// Outstanding pending markers for a slice.
    pub async fn pending(
        &self,
        domain: SyncDomain,
        scope: &str,
    ) -> Result<Vec<PendingReconciliation>> {
        Ok(self.inner.pending.list(domain.as_str(), scope).await?)
    }

    /// Number of syncs currently running.
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    /// Abort in-progress fetches and refuse new syncs.
    pub fn shutdown(&self) {
        info!("Shutting down sync coordinator");
        self.inner.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }
}

impl Inner {
    fn emit(&self, event: CoreEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(event).ok();
        }
    }

    async fn run(&self, key: &SyncKey) -> Result<SyncOutcome> {
        let domain = key.domain;
        let event_scope = (!key.scope.is_empty()).then(|| key.scope.clone());
        let started = Instant::now();

        info!(domain = %domain, scope = %key.log_scope(), "Starting sync");
        self.emit(CoreEvent::Sync(SyncEvent::Started {
            domain: domain.to_string(),
            scope: event_scope.clone(),
        }));

        let result = self.execute(key).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(outcome) => match outcome.skipped {
                Some(reason) => {
                    info!(domain = %domain, scope = %key.log_scope(), %reason, "Sync skipped");
                    self.emit(CoreEvent::Sync(SyncEvent::Skipped {
                        domain: domain.to_string(),
                        scope: event_scope,
                        reason: reason.to_string(),
                    }));
                }
                None => {
                    info!(
                        domain = %domain,
                        scope = %key.log_scope(),
                        synced_count = outcome.synced_count,
                        pruned_count = outcome.pruned_count,
                        duration_ms,
                        "Sync completed"
                    );
                    self.emit(CoreEvent::Sync(SyncEvent::Completed {
                        domain: domain.to_string(),
                        scope: event_scope,
                        synced_count: outcome.synced_count,
                        pruned_count: outcome.pruned_count,
                        duration_ms,
                    }));
                }
            },
            Err(e) => {
                error!(domain = %domain, scope = %key.log_scope(), error = %e, "Sync failed");
                self.emit(CoreEvent::Sync(SyncEvent::Failed {
                    domain: domain.to_string(),
                    scope: event_scope,
                    message: e.to_string(),
                    recoverable: e.is_recoverable(),
                }));
            }
        }

        result
    }

    async fn execute(&self, key: &SyncKey) -> Result<SyncOutcome> {
        let domain = key.domain;
        let scope = key.scope.as_str();

        let rows = self.fetch(domain, scope).await?;
        let synced_at = self.clock.unix_timestamp_millis();
        let snapshot = decode_snapshot(domain, scope, rows, synced_at).map_err(|message| {
            SyncError::RemoteFetch {
                domain: domain.to_string(),
                message: format!("invalid remote row: {}", message),
            }
        })?;

        if snapshot.is_empty() && domain.kind() == DomainKind::Derived {
            return Ok(SyncOutcome::skipped(
                domain,
                Some(key.scope.clone()),
                SkipReason::EmptyDerived,
            ));
        }

        let stats = self.apply(domain, scope, &snapshot, synced_at).await?;

        self.after_commit(domain, scope, &snapshot, stats.pruned).await;

        Ok(SyncOutcome {
            domain,
            scope: Some(key.scope.clone()),
            synced_count: stats.synced,
            pruned_count: stats.pruned,
            resolved_pending: stats.resolved_pending,
            skipped: None,
        })
    }

    async fn apply(
        &self,
        domain: SyncDomain,
        scope: &str,
        snapshot: &Snapshot,
        synced_at: i64,
    ) -> Result<crate::reconcile::ApplyStats> {
        let transaction_error = |message: String| SyncError::Transaction {
            domain: domain.to_string(),
            message,
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| transaction_error(e.to_string()))?;

        // Dropping `tx` on the error path rolls everything back.
        let stats = apply_snapshot(&mut tx, domain, scope, snapshot, synced_at)
            .await
            .map_err(|e| transaction_error(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| transaction_error(e.to_string()))?;

        Ok(stats)
    }

    async fn after_commit(&self, domain: SyncDomain, scope: &str, snapshot: &Snapshot, pruned: u64) {
        let event_scope = (!scope.is_empty()).then(|| scope.to_string());

        if let Some(key) = domain.section_key(scope) {
            self.emit(CoreEvent::Library(LibraryEvent::SectionUpdated {
                key,
                item_count: snapshot.len() as u32,
            }));
        } else if snapshot.is_empty() && pruned > 0 {
            self.emit(CoreEvent::Library(LibraryEvent::SliceCleared {
                domain: domain.to_string(),
                scope: event_scope,
            }));
        }

        if let Some(cache) = &self.cache {
            let keys = match domain.cache_invalidation(scope) {
                CacheInvalidation::Keys(keys) => {
                    for key in &keys {
                        cache.remove(key).await;
                    }
                    keys
                }
                CacheInvalidation::Families(families) => cache.remove_families(&families).await,
            };
            debug!(domain = %domain, removed = keys.len(), "Invalidated query cache");
            self.emit(CoreEvent::Library(LibraryEvent::CacheInvalidated { keys }));
        }
    }

    async fn fetch(&self, domain: SyncDomain, scope: &str) -> Result<Vec<RemoteRow>> {
        let timeout_ms = self.config.fetch_timeout.as_millis() as u64;
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            let outcome = tokio::select! {
                _ = self.shutdown.cancelled() => return Err(SyncError::Cancelled),
                outcome = tokio::time::timeout(self.config.fetch_timeout, self.fetch_once(domain, scope)) => outcome,
            };

            let error = match outcome {
                Ok(Ok(rows)) => {
                    debug!(domain = %domain, rows = rows.len(), attempt, "Fetched remote snapshot");
                    return Ok(rows);
                }
                Ok(Err(e)) => e,
                Err(_) => BridgeError::Timeout(timeout_ms),
            };

            match self.retry.delay_for(attempt, &error) {
                Some(delay) => {
                    warn!(
                        domain = %domain,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Remote fetch failed; retrying"
                    );
                    tokio::select! {
                        _ = self.shutdown.cancelled() => return Err(SyncError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => {
                    return Err(SyncError::RemoteFetch {
                        domain: domain.to_string(),
                        message: error.to_string(),
                    });
                }
            }
        }
    }

    async fn fetch_once(
        &self,
        domain: SyncDomain,
        scope: &str,
    ) -> std::result::Result<Vec<RemoteRow>, BridgeError> {
        match domain {
            SyncDomain::Catalog => {
                let mut request = SelectRequest::new("songs").order_by("created_at", false);
                if !scope.is_empty() {
                    request = request.filter("user_id", scope);
                }
                self.remote.select(request).await
            }
            SyncDomain::Playlists => {
                let request = SelectRequest::new("playlists")
                    .filter("user_id", scope)
                    .order_by("created_at", false);
                self.remote.select(request).await
            }
            SyncDomain::Likes => {
                let request = SelectRequest::new("likes")
                    .filter("user_id", scope)
                    .order_by("created_at", false);
                self.remote.select(request).await
            }
            SyncDomain::Recommendations => {
                self.remote
                    .rpc("get_recommendations", json!({ "user_id": scope }))
                    .await
            }
            SyncDomain::Trending => {
                self.remote
                    .rpc("get_trending_songs", json!({ "period": scope }))
                    .await
            }
            SyncDomain::Spotlight => self.remote.rpc("get_spotlight_songs", json!({})).await,
        }
    }
}

impl fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("config", &self.inner.config)
            .field("in_flight", &self.in_flight_count())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}
