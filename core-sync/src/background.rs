//! # Background Syncers
//!
//! Long-running sync jobs driven by the background syncer manager:
//!
//! - [`ArtworkSyncer`] downloads images of artworks not checked yet
//! - [`LibraryBackgroundSyncer`] runs the incremental library sync
//! - [`VersionResyncer`] pulls the whole catalog page by page after a
//!   library layout change
//!
//! Every syncer is single-flight: a second `sync_in_background` while one is
//! running returns [`SyncOutcome::Skipped`]. Stopping is cooperative; the
//! syncer checks its token between steps and pages and returns without
//! committing the step in flight.

use crate::api::{ArtworkUrlParser, CatalogApi, PageRequest};
use crate::auto_download::AutoDownloadLibrarySyncer;
use crate::engine::LibrarySyncer;
use crate::error::Result;
use crate::event_logger::EventLogger;
use crate::mapping::CatalogMapper;
use async_trait::async_trait;
use core_async::sync::{watch, CancellationToken};
use core_library::{LibraryStorage, Podcast, RemoteStatus};
use core_runtime::events::SyncStage;
use core_runtime::LibrarySettings;
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, instrument, warn};

/// How a background run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed,
    Cancelled,
    /// Another run of the same syncer was still active.
    Skipped,
}

/// Activity flag and stop token shared by one syncer's runs.
#[derive(Debug)]
pub struct SyncerState {
    active: watch::Sender<bool>,
    token: Mutex<CancellationToken>,
}

impl Default for SyncerState {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncerState {
    pub fn new() -> Self {
        let (active, _) = watch::channel(false);
        Self {
            active,
            token: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    /// Mark the syncer active and hand out a fresh stop token, unless it
    /// already is active.
    fn begin(&self) -> Option<(ActiveGuard<'_>, CancellationToken)> {
        let started = self.active.send_if_modified(|active| {
            if *active {
                false
            } else {
                *active = true;
                true
            }
        });
        if !started {
            return None;
        }

        let token = CancellationToken::new();
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = token.clone();
        Some((ActiveGuard { state: self }, token))
    }

    /// Ask the current run to stop at its next checkpoint.
    pub fn stop(&self) {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    /// Resolve once no run is active.
    pub async fn wait_until_idle(&self) {
        let mut receiver = self.active.subscribe();
        receiver.wait_for(|active| !*active).await.ok();
    }
}

/// Clears the active flag when a run ends, including by panic.
struct ActiveGuard<'a> {
    state: &'a SyncerState,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.state.active.send_modify(|active| *active = false);
    }
}

#[async_trait]
pub trait BackgroundSyncer: Send + Sync {
    fn stage(&self) -> SyncStage;

    fn state(&self) -> &SyncerState;

    /// One full run. Implementations return `Ok(SyncOutcome::Cancelled)`
    /// when they observe `token` cancelled at a checkpoint.
    async fn run(&self, token: &CancellationToken) -> Result<SyncOutcome>;

    fn is_active(&self) -> bool {
        self.state().is_active()
    }

    fn stop(&self) {
        self.state().stop();
    }

    async fn stop_and_wait(&self) {
        self.stop();
        self.state().wait_until_idle().await;
    }

    async fn sync_in_background(&self) -> Result<SyncOutcome> {
        let Some((_guard, token)) = self.state().begin() else {
            debug!(stage = %self.stage(), "Syncer already active");
            return Ok(SyncOutcome::Skipped);
        };
        self.run(&token).await
    }
}

// =============================================================================
// Artwork
// =============================================================================

pub struct ArtworkSyncer {
    api: Arc<dyn CatalogApi>,
    pool: SqlitePool,
    batch_size: u32,
    state: SyncerState,
}

impl ArtworkSyncer {
    pub fn new(api: Arc<dyn CatalogApi>, pool: SqlitePool, batch_size: usize) -> Self {
        Self {
            api,
            pool,
            batch_size: u32::try_from(batch_size).unwrap_or(u32::MAX).max(1),
            state: SyncerState::new(),
        }
    }
}

#[async_trait]
impl BackgroundSyncer for ArtworkSyncer {
    fn stage(&self) -> SyncStage {
        SyncStage::Artwork
    }

    fn state(&self) -> &SyncerState {
        &self.state
    }

    #[instrument(skip_all)]
    async fn run(&self, token: &CancellationToken) -> Result<SyncOutcome> {
        let mut fetched = 0usize;
        loop {
            if token.is_cancelled() {
                info!(fetched, "Artwork sync cancelled");
                return Ok(SyncOutcome::Cancelled);
            }

            let batch = LibraryStorage::new(self.pool.clone())
                .get_artworks_that_are_not_checked(self.batch_size)
                .await;
            if batch.is_empty() {
                info!(fetched, "Artwork sync completed");
                return Ok(SyncOutcome::Completed);
            }

            let mut images = Vec::with_capacity(batch.len());
            for artwork in &batch {
                let image = match self.api.fetch_artwork(&artwork.url).await {
                    Ok(image) => image,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!(artwork = artwork.pk, error = %e, "Failed to fetch artwork");
                        None
                    }
                };
                images.push(image);
            }

            if token.is_cancelled() {
                info!(fetched, "Artwork sync cancelled");
                return Ok(SyncOutcome::Cancelled);
            }

            let mut library = LibraryStorage::new(self.pool.clone());
            for (artwork, image) in batch.iter().zip(images) {
                library.set_artwork_image(artwork, image).await?;
            }
            library.save_context().await?;
            fetched += batch.len();
            debug!(fetched, "Artwork batch stored");
        }
    }
}

// =============================================================================
// Incremental library sync
// =============================================================================

/// Steady-state sync: latest songs, playlists, podcasts with their latest
/// episodes, favorites. A failing step is reported and the next one runs.
pub struct LibraryBackgroundSyncer {
    pool: SqlitePool,
    syncer: Arc<dyn LibrarySyncer>,
    auto_download: Arc<AutoDownloadLibrarySyncer>,
    event_logger: Arc<EventLogger>,
    state: SyncerState,
}

impl LibraryBackgroundSyncer {
    pub fn new(
        pool: SqlitePool,
        syncer: Arc<dyn LibrarySyncer>,
        auto_download: Arc<AutoDownloadLibrarySyncer>,
        event_logger: Arc<EventLogger>,
    ) -> Self {
        Self {
            pool,
            syncer,
            auto_download,
            event_logger,
            state: SyncerState::new(),
        }
    }

    /// Log a failed step. Fatal errors end the run.
    async fn checked(&self, topic: &str, result: Result<()>) -> Result<()> {
        match result {
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                self.event_logger.report(topic, &e, false).await;
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    async fn sync_podcast_episodes(&self, token: &CancellationToken) -> Result<()> {
        let podcasts: Vec<Podcast> = LibraryStorage::new(self.pool.clone())
            .list::<Podcast>()
            .await
            .into_iter()
            .filter(|podcast| podcast.remote_status == RemoteStatus::Available)
            .collect();

        for podcast in podcasts {
            if token.is_cancelled() {
                return Ok(());
            }
            let result = self
                .auto_download
                .sync_latest_podcast_episodes(&podcast)
                .await
                .map(|_| ());
            self.checked("Podcast Episode Sync", result).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl BackgroundSyncer for LibraryBackgroundSyncer {
    fn stage(&self) -> SyncStage {
        SyncStage::Library
    }

    fn state(&self) -> &SyncerState {
        &self.state
    }

    #[instrument(skip_all)]
    async fn run(&self, token: &CancellationToken) -> Result<SyncOutcome> {
        info!("Incremental library sync started");

        let result = self
            .auto_download
            .sync_latest_library_elements()
            .await
            .map(|_| ());
        self.checked("Library Sync", result).await?;
        if token.is_cancelled() {
            return Ok(SyncOutcome::Cancelled);
        }

        let result = self.syncer.sync_down_playlists_without_songs().await;
        self.checked("Playlist Sync", result).await?;
        if token.is_cancelled() {
            return Ok(SyncOutcome::Cancelled);
        }

        let result = self.syncer.sync_down_podcasts_without_episodes().await;
        self.checked("Podcast Sync", result).await?;
        if token.is_cancelled() {
            return Ok(SyncOutcome::Cancelled);
        }
        self.sync_podcast_episodes(token).await?;
        if token.is_cancelled() {
            return Ok(SyncOutcome::Cancelled);
        }

        let result = self.syncer.sync_favorite_library_elements().await;
        self.checked("Favorite Sync", result).await?;

        info!("Incremental library sync completed");
        Ok(SyncOutcome::Completed)
    }
}

// =============================================================================
// Library version resync
// =============================================================================

/// Full catalog pull into one sync wave. The wave is marked done only when
/// every page was stored.
pub struct VersionResyncer {
    api: Arc<dyn CatalogApi>,
    pool: SqlitePool,
    parser: Arc<dyn ArtworkUrlParser>,
    settings: Arc<LibrarySettings>,
    page_size: usize,
    state: SyncerState,
}

impl VersionResyncer {
    pub fn new(
        api: Arc<dyn CatalogApi>,
        pool: SqlitePool,
        settings: Arc<LibrarySettings>,
        page_size: usize,
    ) -> Self {
        let parser = api.backend().artwork_url_parser();
        Self {
            api,
            pool,
            parser,
            settings,
            page_size: page_size.max(1),
            state: SyncerState::new(),
        }
    }

    fn context(&self) -> LibraryStorage {
        LibraryStorage::new(self.pool.clone())
    }
}

#[async_trait]
impl BackgroundSyncer for VersionResyncer {
    fn stage(&self) -> SyncStage {
        SyncStage::VersionResync
    }

    fn state(&self) -> &SyncerState {
        &self.state
    }

    #[instrument(skip_all, fields(version = %self.settings.library_sync_version()))]
    async fn run(&self, token: &CancellationToken) -> Result<SyncOutcome> {
        info!("Library version resync started");

        let mut library = self.context();
        let mut wave = library
            .create_sync_wave(self.settings.library_sync_version().raw())
            .await?;
        library.save_context().await?;
        drop(library);

        let genres = self.api.fetch_genres().await?;
        if token.is_cancelled() {
            return Ok(SyncOutcome::Cancelled);
        }
        let mut library = self.context();
        let mut mapper = CatalogMapper::new(&mut library, self.parser.as_ref());
        for genre in &genres {
            mapper.genre(genre).await?;
        }
        library.save_context().await?;
        drop(library);

        let mut page = PageRequest::first(self.page_size);
        loop {
            let artists = self.api.fetch_artists(page).await?;
            if token.is_cancelled() {
                return Ok(SyncOutcome::Cancelled);
            }
            let mut library = self.context();
            let mut mapper = CatalogMapper::new(&mut library, self.parser.as_ref());
            for artist in &artists {
                mapper.artist(artist).await?;
            }
            library.save_context().await?;
            debug!(offset = page.offset, count = artists.len(), "Artist page stored");
            if artists.len() < page.limit {
                break;
            }
            page = page.next();
        }

        let mut page = PageRequest::first(self.page_size);
        loop {
            let albums = self.api.fetch_albums(page).await?;
            if token.is_cancelled() {
                return Ok(SyncOutcome::Cancelled);
            }
            let mut library = self.context();
            let mut mapper = CatalogMapper::new(&mut library, self.parser.as_ref());
            for album in &albums {
                mapper.album(album).await?;
            }
            library.save_context().await?;
            debug!(offset = page.offset, count = albums.len(), "Album page stored");
            if albums.len() < page.limit {
                break;
            }
            page = page.next();
        }

        let mut page = PageRequest::first(self.page_size);
        loop {
            let songs = self.api.fetch_songs(page).await?;
            if token.is_cancelled() {
                return Ok(SyncOutcome::Cancelled);
            }
            let mut library = self.context();
            let mut mapper = CatalogMapper::new(&mut library, self.parser.as_ref());
            for song in &songs {
                mapper.song(song, Some(wave.pk)).await?;
            }
            library.save_context().await?;
            debug!(offset = page.offset, count = songs.len(), "Song page stored");
            if songs.len() < page.limit {
                break;
            }
            page = page.next();
        }

        let mut library = self.context();
        wave.is_done = true;
        library.update(&wave).await?;
        library.save_context().await?;

        info!(wave = wave.id, "Library version resync completed");
        Ok(SyncOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{RemoteAlbum, RemoteArtist, RemoteEpisode, RemoteGenre, RemotePodcast};
    use crate::engine::CatalogLibrarySyncer;
    use crate::test_support::{remote_song, settings, FakeCatalogApi};
    use bridge_traits::{DownloadRequest, PlayableDownloader};
    use core_async::time::{sleep, Duration};
    use core_library::db::create_test_pool;
    use core_library::{Artist, Artwork, ArtworkRemoteInfo, ImageStatus, LogEntryType, Song};
    use core_runtime::events::EventBus;

    struct NoopDownloader;

    #[async_trait]
    impl PlayableDownloader for NoopDownloader {
        async fn download_all(&self, _requests: Vec<DownloadRequest>) -> bridge_traits::error::Result<()> {
            Ok(())
        }
    }

    async fn artwork(pool: &SqlitePool, id: &str) -> Artwork {
        let mut library = LibraryStorage::new(pool.clone());
        let artwork = library
            .get_or_create_artwork(
                &ArtworkRemoteInfo::new(id, "album"),
                &format!("https://m.example/image.php?object_id={id}&object_type=album"),
            )
            .await
            .unwrap();
        library.save_context().await.unwrap();
        artwork
    }

    #[core_async::test]
    async fn test_artwork_sync_marks_every_artwork() {
        let pool = create_test_pool().await.unwrap();
        let with_image = artwork(&pool, "1").await;
        let without_image = artwork(&pool, "2").await;
        let broken = artwork(&pool, "3").await;

        let api = Arc::new(FakeCatalogApi::default());
        api.catalog()
            .artwork
            .insert(with_image.url.clone(), vec![0xff, 0xd8]);
        api.catalog().broken_artwork.insert(broken.url.clone());
        let syncer = ArtworkSyncer::new(api, pool.clone(), 2);

        let outcome = syncer.sync_in_background().await.unwrap();
        assert_eq!(outcome, SyncOutcome::Completed);
        assert!(!syncer.is_active());

        let mut library = LibraryStorage::new(pool);
        let status = |artwork: Option<Artwork>| artwork.unwrap().status;
        assert_eq!(status(library.get_by_pk(with_image.pk).await), ImageStatus::Checked);
        assert_eq!(status(library.get_by_pk(without_image.pk).await), ImageStatus::Missing);
        assert_eq!(status(library.get_by_pk(broken.pk).await), ImageStatus::Missing);
        assert_eq!(
            library.get_artwork_image(&with_image).await,
            Some(vec![0xff, 0xd8])
        );
    }

    #[core_async::test]
    async fn test_second_run_is_skipped_while_active() {
        let pool = create_test_pool().await.unwrap();
        artwork(&pool, "1").await;
        let api = Arc::new(FakeCatalogApi::default());
        api.set_latency(Duration::from_millis(200));
        let syncer = Arc::new(ArtworkSyncer::new(api, pool, 10));

        let running = {
            let syncer = syncer.clone();
            core_async::spawn(async move { syncer.sync_in_background().await })
        };
        sleep(Duration::from_millis(50)).await;
        assert!(syncer.is_active());
        assert_eq!(
            syncer.sync_in_background().await.unwrap(),
            SyncOutcome::Skipped
        );

        syncer.stop_and_wait().await;
        assert!(!syncer.is_active());
        assert_eq!(running.await.unwrap().unwrap(), SyncOutcome::Cancelled);
    }

    #[core_async::test]
    async fn test_incremental_sync_runs_every_step() {
        let pool = create_test_pool().await.unwrap();
        let api = Arc::new(FakeCatalogApi::default());
        api.catalog().latest_songs = vec![remote_song("s-1")];
        api.catalog().podcasts = vec![RemotePodcast {
            id: "p-1".to_string(),
            title: "Radiolab".to_string(),
            ..Default::default()
        }];
        api.catalog().episodes.insert(
            "p-1".to_string(),
            vec![RemoteEpisode {
                id: "e-1".to_string(),
                title: "Colors".to_string(),
                is_available: true,
                ..Default::default()
            }],
        );
        let settings = settings().await;
        let engine: Arc<dyn LibrarySyncer> =
            Arc::new(CatalogLibrarySyncer::new(api.clone(), pool.clone(), settings.clone()));
        let auto_download = Arc::new(AutoDownloadLibrarySyncer::new(
            engine.clone(),
            settings,
            Arc::new(NoopDownloader),
            EventBus::new(16),
        ));
        let logger = Arc::new(EventLogger::new(pool.clone()));
        let syncer = LibraryBackgroundSyncer::new(pool.clone(), engine, auto_download, logger);

        api.catalog().favorites.song_ids = vec!["s-1".to_string()];
        let outcome = syncer.sync_in_background().await.unwrap();
        assert_eq!(outcome, SyncOutcome::Completed);

        let mut library = LibraryStorage::new(pool);
        assert_eq!(library.count::<Song>().await, 1);
        assert!(library.get::<Song>("s-1").await.unwrap().is_favorite);
        let podcast: Podcast = library.get("p-1").await.unwrap();
        assert_eq!(library.podcast_episodes(&podcast).await.len(), 1);
        assert!(library.get_log_entries().await.is_empty());
    }

    #[core_async::test]
    async fn test_incremental_sync_logs_api_errors() {
        let pool = create_test_pool().await.unwrap();
        let api = Arc::new(FakeCatalogApi::default());
        api.fail_with(4742, "Access denied");
        let settings = settings().await;
        let engine: Arc<dyn LibrarySyncer> =
            Arc::new(CatalogLibrarySyncer::new(api.clone(), pool.clone(), settings.clone()));
        let auto_download = Arc::new(AutoDownloadLibrarySyncer::new(
            engine.clone(),
            settings,
            Arc::new(NoopDownloader),
            EventBus::new(16),
        ));
        let logger = Arc::new(EventLogger::new(pool.clone()));
        let syncer = LibraryBackgroundSyncer::new(pool.clone(), engine, auto_download, logger);

        let outcome = syncer.sync_in_background().await.unwrap();
        assert_eq!(outcome, SyncOutcome::Completed);

        let entries = LibraryStorage::new(pool).get_log_entries().await;
        assert_eq!(entries.len(), 4);
        assert!(entries
            .iter()
            .all(|entry| entry.entry_type == LogEntryType::ApiError && entry.status_code == 4742));
    }

    #[core_async::test]
    async fn test_version_resync_pages_into_one_done_wave() {
        let pool = create_test_pool().await.unwrap();
        let api = Arc::new(FakeCatalogApi::default());
        {
            let mut catalog = api.catalog();
            catalog.genres = vec![RemoteGenre {
                id: "g-1".to_string(),
                name: "Jazz".to_string(),
            }];
            catalog.artist_list = (0..5)
                .map(|i| RemoteArtist {
                    id: format!("ar-{i}"),
                    name: format!("Artist {i}"),
                    artwork_url: None,
                })
                .collect();
            catalog.album_list = vec![RemoteAlbum {
                id: "al-1".to_string(),
                name: "Kind of Blue".to_string(),
                artist_id: Some("ar-0".to_string()),
                ..Default::default()
            }];
            catalog.song_list = (0..3).map(|i| remote_song(&format!("s-{i}"))).collect();
        }
        let syncer = VersionResyncer::new(api.clone(), pool.clone(), settings().await, 2);

        let outcome = syncer.sync_in_background().await.unwrap();
        assert_eq!(outcome, SyncOutcome::Completed);
        assert_eq!(
            api.calls()
                .iter()
                .filter(|call| call.starts_with("fetch_artists"))
                .count(),
            3
        );

        let mut library = LibraryStorage::new(pool);
        let wave = library.get_latest_sync_wave().await.unwrap();
        assert!(wave.is_done);
        assert_eq!(library.songs_of_sync_wave(&wave).await.len(), 3);
        // Five catalog artists plus one stub per song artist.
        assert_eq!(library.count::<Artist>().await, 8);
    }

    #[core_async::test]
    async fn test_cancelled_resync_leaves_wave_open() {
        let pool = create_test_pool().await.unwrap();
        let api = Arc::new(FakeCatalogApi::default());
        api.catalog().artist_list = (0..4)
            .map(|i| RemoteArtist {
                id: format!("ar-{i}"),
                name: format!("Artist {i}"),
                artwork_url: None,
            })
            .collect();
        api.set_latency(Duration::from_millis(100));
        let syncer = Arc::new(VersionResyncer::new(api, pool.clone(), settings().await, 1));

        let running = {
            let syncer = syncer.clone();
            core_async::spawn(async move { syncer.sync_in_background().await })
        };
        sleep(Duration::from_millis(150)).await;
        syncer.stop_and_wait().await;

        assert_eq!(running.await.unwrap().unwrap(), SyncOutcome::Cancelled);
        let wave = LibraryStorage::new(pool).get_latest_sync_wave().await.unwrap();
        assert!(!wave.is_done);
    }
}
