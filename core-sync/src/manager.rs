//! # Background Syncer Manager
//!
//! Runs background sync passes: artwork first, then either the library
//! version resync or the incremental library sync depending on the
//! persisted library version.
//!
//! ## Lifecycle
//!
//! - [`start`](BackgroundSyncerManager::start) spawns one pass unless a pass
//!   is running, a syncer is still active, or syncing was halted
//! - [`stop`](BackgroundSyncerManager::stop) asks every syncer to stop at its
//!   next checkpoint and returns at once
//! - [`stop_and_wait`](BackgroundSyncerManager::stop_and_wait) also waits
//!   for the pass to end
//!
//! A stage failure is written to the event log and the pass moves on. A
//! corrupted store halts syncing until [`clear_halt`](BackgroundSyncerManager::clear_halt).
//!
//! ## Events
//!
//! Each pass emits [`SyncEvent::PassStarted`], one `StageCompleted` or
//! `StageFailed` per stage run, and [`SyncEvent::PassCompleted`].

use crate::api::CatalogApi;
use crate::auto_download::AutoDownloadLibrarySyncer;
use crate::background::{
    ArtworkSyncer, BackgroundSyncer, LibraryBackgroundSyncer, SyncOutcome, VersionResyncer,
};
use crate::engine::{CatalogLibrarySyncer, LibrarySyncer};
use crate::error::{Result, SyncError};
use crate::event_logger::EventLogger;
use crate::migrator::{ArtworkFixupReport, PendingMigration, SchemaMigrator};
use bridge_traits::PlayableDownloader;
use core_async::sync::Semaphore;
use core_async::task::JoinHandle;
use core_library::db::open_library;
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent, SyncStage};
use core_runtime::logging::strip_path;
use core_runtime::{LibrarySettings, LibrarySyncVersion};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info, instrument, warn};

/// The three syncers one pass runs.
#[derive(Clone)]
pub struct SyncerSet {
    pub artwork: Arc<dyn BackgroundSyncer>,
    pub library: Arc<dyn BackgroundSyncer>,
    pub version_resync: Arc<dyn BackgroundSyncer>,
}

impl SyncerSet {
    fn all(&self) -> [&Arc<dyn BackgroundSyncer>; 3] {
        [&self.artwork, &self.library, &self.version_resync]
    }
}

/// Collaborators needed to sync against one catalog server.
pub struct CatalogSyncSetup {
    pub api: Arc<dyn CatalogApi>,
    pub pool: SqlitePool,
    pub settings: Arc<LibrarySettings>,
    pub downloader: Arc<dyn PlayableDownloader>,
    pub event_logger: Arc<EventLogger>,
    pub events: EventBus,
}

impl CatalogSyncSetup {
    /// Open the library store at `config.database_path` and load the
    /// library settings from `config.settings_store`.
    #[instrument(skip_all)]
    pub async fn open(
        api: Arc<dyn CatalogApi>,
        downloader: Arc<dyn PlayableDownloader>,
        config: &CoreConfig,
    ) -> Result<Self> {
        config.validate()?;
        let pool = open_library(&config.database_path).await?;
        let settings = Arc::new(LibrarySettings::load(config.settings_store.clone()).await?);
        let database = config.database_path.to_string_lossy();
        info!(
            database = strip_path(&database),
            version = ?settings.library_sync_version(),
            "Opened library store"
        );

        Ok(Self {
            api,
            event_logger: Arc::new(EventLogger::new(pool.clone())),
            pool,
            settings,
            downloader,
            events: EventBus::new(config.event_buffer_size),
        })
    }
}

/// How a stage ended, as far as the pass is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageFlow {
    Continue,
    Cancelled,
    Halted,
}

struct ManagerInner {
    start_guard: Semaphore,
    is_running: AtomicBool,
    is_halted: AtomicBool,
    syncers: SyncerSet,
    migrator: Arc<SchemaMigrator>,
    event_logger: Arc<EventLogger>,
    events: EventBus,
    pass: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Clone)]
pub struct BackgroundSyncerManager {
    inner: Arc<ManagerInner>,
}

impl BackgroundSyncerManager {
    pub fn new(
        syncers: SyncerSet,
        migrator: Arc<SchemaMigrator>,
        event_logger: Arc<EventLogger>,
        events: EventBus,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                start_guard: Semaphore::new(1),
                is_running: AtomicBool::new(false),
                is_halted: AtomicBool::new(false),
                syncers,
                migrator,
                event_logger,
                events,
                pass: Mutex::new(None),
            }),
        }
    }

    /// Wire the catalog syncers, auto-download and migrator for `setup`.
    pub fn for_catalog(setup: CatalogSyncSetup, config: &CoreConfig) -> Self {
        let CatalogSyncSetup {
            api,
            pool,
            settings,
            downloader,
            event_logger,
            events,
        } = setup;

        let engine: Arc<dyn LibrarySyncer> = Arc::new(CatalogLibrarySyncer::new(
            api.clone(),
            pool.clone(),
            settings.clone(),
        ));
        let auto_download = Arc::new(AutoDownloadLibrarySyncer::new(
            engine.clone(),
            settings.clone(),
            downloader,
            events.clone(),
        ));

        let syncers = SyncerSet {
            artwork: Arc::new(ArtworkSyncer::new(
                api.clone(),
                pool.clone(),
                config.artwork_batch_size,
            )),
            library: Arc::new(LibraryBackgroundSyncer::new(
                pool.clone(),
                engine,
                auto_download,
                event_logger.clone(),
            )),
            version_resync: Arc::new(VersionResyncer::new(
                api.clone(),
                pool.clone(),
                settings.clone(),
                config.library_page_size,
            )),
        };
        let migrator = Arc::new(SchemaMigrator::new(
            pool,
            settings,
            api.backend().artwork_url_parser(),
            events.clone(),
        ));

        Self::new(syncers, migrator, event_logger, events)
    }

    pub fn is_running(&self) -> bool {
        self.inner.is_running.load(Ordering::SeqCst)
    }

    /// Whether any syncer is still working, also after a stop request.
    pub fn is_active(&self) -> bool {
        self.inner.syncers.all().iter().any(|syncer| syncer.is_active())
    }

    /// Set after a corrupted store was detected; `start` refuses to run.
    pub fn is_halted(&self) -> bool {
        self.inner.is_halted.load(Ordering::SeqCst)
    }

    /// Allow passes again, e.g. after the library was rebuilt.
    pub fn clear_halt(&self) {
        self.inner.is_halted.store(false, Ordering::SeqCst);
    }

    pub fn migrator(&self) -> &Arc<SchemaMigrator> {
        &self.inner.migrator
    }

    pub async fn perform_blocking_library_updates_if_needed(
        &self,
    ) -> Result<Option<ArtworkFixupReport>> {
        self.inner
            .migrator
            .perform_blocking_library_updates_if_needed()
            .await
    }

    /// Spawn one background pass. Returns `false` when nothing was started.
    #[instrument(skip(self))]
    pub async fn start(&self) -> bool {
        let Ok(_permit) = self.inner.start_guard.acquire().await else {
            return false;
        };

        if self.is_halted() {
            warn!("Background sync halted, not starting");
            return false;
        }
        if self.is_running() || self.is_active() {
            return false;
        }

        self.inner.is_running.store(true, Ordering::SeqCst);
        self.inner
            .events
            .emit(CoreEvent::Sync(SyncEvent::PassStarted))
            .ok();
        info!("Background sync started");

        let inner = Arc::clone(&self.inner);
        let handle = core_async::spawn(async move { inner.run_pass().await });
        *self.inner.pass.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        true
    }

    /// Request every syncer to stop. Returns without waiting.
    pub fn stop(&self) {
        self.inner.is_running.store(false, Ordering::SeqCst);
        for syncer in self.inner.syncers.all() {
            syncer.stop();
        }
        self.inner
            .events
            .emit(CoreEvent::Sync(SyncEvent::Stopped))
            .ok();
        info!("Background sync stopped");
    }

    pub async fn stop_and_wait(&self) {
        self.stop();
        for syncer in self.inner.syncers.all() {
            syncer.stop_and_wait().await;
        }
        self.wait_for_pass().await;
    }

    /// Wait until the current pass, if any, has ended.
    pub async fn wait_for_pass(&self) {
        let handle = self
            .inner
            .pass
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Background sync pass panicked");
            }
        }
    }
}

impl ManagerInner {
    async fn run_pass(&self) {
        let mut flow = self.run_stage(self.syncers.artwork.as_ref()).await;

        if flow == StageFlow::Continue && self.is_running.load(Ordering::SeqCst) {
            flow = match self.migrator.pending() {
                PendingMigration::LegacyResync => self.run_legacy_resync().await,
                PendingMigration::VersionBump => {
                    match self.migrator.set_version(LibrarySyncVersion::NEWEST).await {
                        Ok(()) => self.run_stage(self.syncers.library.as_ref()).await,
                        Err(e) => self.stage_failed(SyncStage::VersionResync, e).await,
                    }
                }
                PendingMigration::UpToDate => self.run_stage(self.syncers.library.as_ref()).await,
            };
        }

        let cancelled = flow != StageFlow::Continue;
        self.events
            .emit(CoreEvent::Sync(SyncEvent::PassCompleted { cancelled }))
            .ok();
        info!(cancelled, "Background sync pass finished");
    }

    async fn run_legacy_resync(&self) -> StageFlow {
        let flow = self.run_stage(self.syncers.version_resync.as_ref()).await;
        if flow != StageFlow::Continue {
            return flow;
        }
        match self.migrator.finish_legacy_resync().await {
            Ok(_) => StageFlow::Continue,
            Err(e) => self.stage_failed(SyncStage::VersionResync, e).await,
        }
    }

    async fn run_stage(&self, syncer: &dyn BackgroundSyncer) -> StageFlow {
        let stage = syncer.stage();
        match syncer.sync_in_background().await {
            Ok(SyncOutcome::Completed) => {
                self.events
                    .emit(CoreEvent::Sync(SyncEvent::StageCompleted { stage }))
                    .ok();
                StageFlow::Continue
            }
            Ok(SyncOutcome::Skipped) => StageFlow::Continue,
            Ok(SyncOutcome::Cancelled) => StageFlow::Cancelled,
            Err(e) => self.stage_failed(stage, e).await,
        }
    }

    async fn stage_failed(&self, stage: SyncStage, err: SyncError) -> StageFlow {
        let fatal = err.is_fatal();
        self.event_logger.report(stage_topic(stage), &err, false).await;
        self.events
            .emit(CoreEvent::Sync(SyncEvent::StageFailed {
                stage,
                message: err.to_string(),
                fatal,
            }))
            .ok();

        if !fatal {
            return StageFlow::Continue;
        }

        error!(%stage, error = %err, "Library store corrupted, halting background sync");
        self.is_halted.store(true, Ordering::SeqCst);
        self.is_running.store(false, Ordering::SeqCst);
        for syncer in self.syncers.all() {
            syncer.stop();
        }
        StageFlow::Halted
    }
}

fn stage_topic(stage: SyncStage) -> &'static str {
    match stage {
        SyncStage::Artwork => "Artwork Sync",
        SyncStage::Library => "Library Sync",
        SyncStage::VersionResync => "Library Version Resync",
    }
}

impl std::fmt::Debug for BackgroundSyncerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundSyncerManager")
            .field("is_running", &self.is_running())
            .field("is_active", &self.is_active())
            .field("is_halted", &self.is_halted())
            .finish()
    }
}
