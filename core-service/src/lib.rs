//! Core service façade and bootstrap helpers.
//!
//! This crate wires the host-provided bridges collected in a
//! [`CoreConfig`](core_runtime::config::CoreConfig) (remote client, identity,
//! key-value store, offline file index, clock) into the shared core: the local
//! mirror pool, the query cache, the sync coordinator and scheduler, the shared
//! playback queue and the track resolver. Every component is constructed once
//! here and handed out by reference, so all callers observe the same state.
//!
//! Desktop apps typically enable the `desktop-shims` feature (which depends on
//! `bridge-desktop`) to get default key-value and offline file stores.
//!
//! ```ignore
//! use core_service::CoreService;
//! use core_sync::SyncDomain;
//!
//! let core = CoreService::bootstrap(config).await?;
//! core.sync(SyncDomain::Catalog, None).await?;
//! let songs = core.catalog(None).await?;
//! let playable = core.play(songs, Some("song-1"), Some("library".into())).await;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use bridge_traits::session::IdentityProvider;
use core_cache::{TtlCacheConfig, TtlCacheManager};
use core_library::models::{LikeRecord, MediaRecord, PlaylistRecord};
use core_library::repositories::{
    LikeRepository, MediaRepository, PlaylistRepository, SectionCacheRepository,
    SqliteLikeRepository, SqliteMediaRepository, SqlitePlaylistRepository,
    SqliteSectionCacheRepository,
};
use core_library::{create_pool, DatabaseConfig};
use core_playback::{MediaUrlBuilder, PlayableRef, QueueStateStore, TrackResolver};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
use core_sync::{
    DomainKind, ExponentialBackoff, SyncConfig, SyncCoordinator, SyncDomain, SyncOutcome,
    SyncScheduler, SyncTarget,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;
use tracing::{info, instrument};

/// Targets synced by the background scheduler: every domain at its default
/// scope.
pub fn default_sync_targets() -> Vec<SyncTarget> {
    SyncDomain::ALL.iter().copied().map(SyncTarget::from).collect()
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<Inner>,
}

struct Inner {
    config: CoreConfig,
    pool: SqlitePool,
    event_bus: Arc<EventBus>,
    cache: TtlCacheManager,
    coordinator: SyncCoordinator,
    scheduler: Option<SyncScheduler>,
    queue: QueueStateStore,
    resolver: TrackResolver,
    media: SqliteMediaRepository,
    playlists: SqlitePlaylistRepository,
    likes: SqliteLikeRepository,
    sections: SqliteSectionCacheRepository,
}

impl CoreService {
    /// Open the local mirror and construct every component.
    ///
    /// Starts the background sync scheduler when
    /// `config.features.enable_background_sync` is set, so this must run
    /// inside a Tokio runtime.
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let db_config = if config.is_in_memory() {
            DatabaseConfig::in_memory()
        } else {
            DatabaseConfig::new(config.database_path.clone())
        };
        let pool = create_pool(db_config)
            .await
            .map_err(|e| CoreError::InitializationFailed(format!("local mirror: {}", e)))?;

        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));

        let cache_config = TtlCacheConfig::new()
            .with_prefix(config.cache.prefix.clone())
            .with_max_age(Duration::from_millis(config.cache.max_age_ms));
        cache_config
            .validate()
            .map_err(CoreError::InitializationFailed)?;
        let cache = TtlCacheManager::new(
            Arc::clone(&config.kv_store),
            Arc::clone(&config.clock),
            cache_config,
        );

        let coordinator = SyncCoordinator::builder(
            pool.clone(),
            Arc::clone(&config.remote_client),
            Arc::clone(&config.identity),
        )
        .clock(Arc::clone(&config.clock))
        .cache(cache.clone())
        .event_bus(Arc::clone(&event_bus))
        .retry_policy(Arc::new(ExponentialBackoff::from_settings(&config.sync)))
        .config(SyncConfig::from_settings(&config.sync))
        .build();

        let scheduler = if config.features.enable_background_sync {
            let scheduler = SyncScheduler::new(
                coordinator.clone(),
                default_sync_targets(),
                Duration::from_secs(config.sync.background_interval_secs),
            );
            scheduler.start();
            Some(scheduler)
        } else {
            None
        };

        let queue = QueueStateStore::new().with_event_bus(Arc::clone(&event_bus));

        let urls = MediaUrlBuilder::new(config.media_base_url.as_deref())?;
        let resolver = TrackResolver::new(Arc::clone(&config.offline_files), urls);

        info!(
            in_memory = config.is_in_memory(),
            background_sync = scheduler.is_some(),
            "Core service ready"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                media: SqliteMediaRepository::new(pool.clone()),
                playlists: SqlitePlaylistRepository::new(pool.clone()),
                likes: SqliteLikeRepository::new(pool.clone()),
                sections: SqliteSectionCacheRepository::new(pool.clone()),
                config,
                pool,
                event_bus,
                cache,
                coordinator,
                scheduler,
                queue,
                resolver,
            }),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.inner.event_bus)
    }

    pub fn subscribe_events(&self) -> Receiver<CoreEvent> {
        self.inner.event_bus.subscribe()
    }

    pub fn cache(&self) -> &TtlCacheManager {
        &self.inner.cache
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.inner.coordinator
    }

    pub fn scheduler(&self) -> Option<&SyncScheduler> {
        self.inner.scheduler.as_ref()
    }

    /// The one shared playback queue.
    pub fn queue(&self) -> &QueueStateStore {
        &self.inner.queue
    }

    pub fn resolver(&self) -> &TrackResolver {
        &self.inner.resolver
    }

    // ------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------

    pub async fn sync(&self, domain: SyncDomain, scope: Option<&str>) -> Result<SyncOutcome> {
        Ok(self.inner.coordinator.sync(domain, scope).await?)
    }

    /// Sync every domain at its default scope.
    pub async fn sync_all(&self) -> Vec<(SyncTarget, core_sync::Result<SyncOutcome>)> {
        self.inner
            .coordinator
            .sync_all(&default_sync_targets())
            .await
    }

    // ------------------------------------------------------------------
    // Reads
    //
    // Reads come from the local mirror through the query cache. A sync
    // invalidates the cache keys these reads are stored under.
    // ------------------------------------------------------------------

    /// Catalog media, newest first. `owner` restricts to one uploader.
    pub async fn catalog(&self, owner: Option<&str>) -> Result<Vec<MediaRecord>> {
        let Some(scope) = self.resolve_scope(SyncDomain::Catalog, owner)? else {
            return Ok(Vec::new());
        };
        let media = &self.inner.media;
        let key = SyncDomain::Catalog.cache_key(&scope);
        self.inner
            .cache
            .get_or_compute(&key, async {
                if scope.is_empty() {
                    media.list_all().await
                } else {
                    media.list_by_owner(&scope).await
                }
            })
            .await
            .map_err(CoreError::from)
    }

    /// Playlists of `user`, or of the signed-in user.
    pub async fn playlists(&self, user: Option<&str>) -> Result<Vec<PlaylistRecord>> {
        let Some(scope) = self.resolve_scope(SyncDomain::Playlists, user)? else {
            return Ok(Vec::new());
        };
        let playlists = &self.inner.playlists;
        self.inner
            .cache
            .get_or_compute(
                &SyncDomain::Playlists.cache_key(&scope),
                playlists.list_by_owner(&scope),
            )
            .await
            .map_err(CoreError::from)
    }

    /// Likes of `user`, or of the signed-in user, most recent first.
    pub async fn likes(&self, user: Option<&str>) -> Result<Vec<LikeRecord>> {
        let Some(scope) = self.resolve_scope(SyncDomain::Likes, user)? else {
            return Ok(Vec::new());
        };
        let likes = &self.inner.likes;
        self.inner
            .cache
            .get_or_compute(
                &SyncDomain::Likes.cache_key(&scope),
                likes.list_for_user(&scope),
            )
            .await
            .map_err(CoreError::from)
    }

    /// Tracks of a ranked section (recommendations, trending, spotlight) in
    /// section order. Ids with no local record are skipped.
    ///
    /// # Errors
    /// `InvalidScope` if `domain` is not a derived domain.
    #[instrument(skip(self))]
    pub async fn section(&self, domain: SyncDomain, scope: Option<&str>) -> Result<Vec<MediaRecord>> {
        if domain.kind() != DomainKind::Derived {
            return Err(core_sync::SyncError::InvalidScope {
                domain: domain.to_string(),
                scope: scope.unwrap_or_default().to_string(),
                reason: "not a ranked section".to_string(),
            }
            .into());
        }
        let Some(scope) = self.resolve_scope(domain, scope)? else {
            return Ok(Vec::new());
        };
        let Some(section_key) = domain.section_key(&scope) else {
            return Ok(Vec::new());
        };

        let sections = &self.inner.sections;
        let media = &self.inner.media;
        self.inner
            .cache
            .get_or_compute(&domain.cache_key(&scope), async {
                match sections.get(&section_key).await? {
                    Some(entry) => media.find_by_ids_ordered(&entry.media_ids).await,
                    None => Ok(Vec::new()),
                }
            })
            .await
            .map_err(CoreError::from)
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    /// Build the shared queue and resolve its first track.
    pub async fn play(
        &self,
        tracks: Vec<MediaRecord>,
        start_id: Option<&str>,
        context: Option<String>,
    ) -> Option<PlayableRef> {
        let current = self.inner.queue.build_queue(tracks, start_id, context)?;
        Some(self.inner.resolver.resolve(&current).await)
    }

    /// Resolve whatever the shared queue currently points at.
    pub async fn resolve_current(&self) -> Option<PlayableRef> {
        let current = self.inner.queue.current_track()?;
        Some(self.inner.resolver.resolve(&current).await)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Drop user-visible state: the playback queue and the query cache.
    ///
    /// The mirror is kept; the next user's syncs replace their own slices.
    /// Returns the number of cache entries removed.
    pub async fn sign_out(&self) -> u64 {
        self.inner.queue.reset();
        let cleared = self.inner.cache.clear().await as u64;

        info!(cleared_cache_entries = cleared, "Signed out");
        self.inner
            .event_bus
            .emit(CoreEvent::Session(SessionEvent::SignedOut {
                cleared_cache_entries: cleared,
            }))
            .ok();
        cleared
    }

    /// Stop background work and refuse new syncs.
    pub async fn shutdown(&self) {
        if let Some(scheduler) = &self.inner.scheduler {
            scheduler.stop().await;
        }
        self.inner.coordinator.shutdown();
        info!("Core service shut down");
    }

    fn resolve_scope(&self, domain: SyncDomain, explicit: Option<&str>) -> Result<Option<String>> {
        let current_user = if domain.is_user_scoped() && explicit.is_none() {
            self.inner.config.identity.current_user_id()
        } else {
            None
        };
        Ok(domain.resolve_scope(explicit, current_user)?)
    }
}
