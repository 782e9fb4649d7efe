//! # Auto-Download
//!
//! Decides which playables go to the host's download manager.
//!
//! - [`DownloadPlan`] collects the uncached playables of a container and
//!   tells the UI whether the batch is large enough to ask first
//! - [`AutoDownloadLibrarySyncer`] wraps the latest-elements syncs and queues
//!   whatever they added when the matching setting is on
//! - [`BackgroundFetchTriggeredSyncer`] runs the podcast part of that on an
//!   OS background-fetch wakeup and hands the new episodes back for
//!   notifications

use crate::engine::LibrarySyncer;
use crate::error::Result;
use bridge_traits::{DownloadKind, DownloadRequest, PlayableDownloader};
use core_library::{
    LibraryStorage, PlayableEntity, PlayableKind, Podcast, PodcastEpisode, RemoteStatus, Song,
};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use core_runtime::LibrarySettings;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, instrument};

fn download_request(playable: &impl PlayableEntity) -> DownloadRequest {
    let kind = match playable.kind() {
        PlayableKind::Song => DownloadKind::Song,
        PlayableKind::Episode => DownloadKind::PodcastEpisode,
    };
    DownloadRequest::new(kind, playable.remote_id(), playable.title())
}

/// Uncached playables about to be handed to the downloader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    requests: Vec<DownloadRequest>,
    confirmation_threshold: usize,
}

impl DownloadPlan {
    /// Plan downloads for every playable that has no cached file yet.
    pub fn for_playables<P: PlayableEntity>(playables: &[P], confirmation_threshold: usize) -> Self {
        let requests = playables
            .iter()
            .filter(|playable| !playable.is_cached())
            .map(download_request)
            .collect();
        Self {
            requests,
            confirmation_threshold,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Whether the UI should ask before enqueueing.
    pub fn requires_confirmation(&self) -> bool {
        self.pending_count() > self.confirmation_threshold
    }

    pub fn requests(&self) -> &[DownloadRequest] {
        &self.requests
    }

    /// Queue the plan. Returns the number of playables handed over.
    pub async fn enqueue(self, downloader: &dyn PlayableDownloader) -> Result<usize> {
        let count = self.requests.len();
        if count > 0 {
            downloader.download_all(self.requests).await?;
            debug!(count, "Queued playables for download");
        }
        Ok(count)
    }
}

pub struct AutoDownloadLibrarySyncer {
    syncer: Arc<dyn LibrarySyncer>,
    settings: Arc<LibrarySettings>,
    downloader: Arc<dyn PlayableDownloader>,
    events: EventBus,
}

impl AutoDownloadLibrarySyncer {
    pub fn new(
        syncer: Arc<dyn LibrarySyncer>,
        settings: Arc<LibrarySettings>,
        downloader: Arc<dyn PlayableDownloader>,
        events: EventBus,
    ) -> Self {
        Self {
            syncer,
            settings,
            downloader,
            events,
        }
    }

    /// Sync the latest songs, queueing the new ones when auto-download of
    /// latest songs is on.
    #[instrument(skip(self))]
    pub async fn sync_latest_library_elements(&self) -> Result<Vec<Song>> {
        let added = self.syncer.sync_latest_library_elements().await?;
        if self.settings.is_auto_download_latest_songs_active() {
            self.enqueue(&added).await?;
        }
        Ok(added)
    }

    /// Sync the latest episodes of `podcast`, queueing the new ones when
    /// auto-download of latest episodes is on.
    #[instrument(skip(self, podcast), fields(podcast_id = %podcast.id))]
    pub async fn sync_latest_podcast_episodes(&self, podcast: &Podcast) -> Result<Vec<PodcastEpisode>> {
        let added = self.syncer.sync_latest_podcast_episodes(podcast).await?;
        if self.settings.is_auto_download_latest_podcast_episodes_active() {
            self.enqueue(&added).await?;
        }
        Ok(added)
    }

    async fn enqueue<P: PlayableEntity>(&self, playables: &[P]) -> Result<()> {
        let plan = DownloadPlan::for_playables(playables, usize::MAX);
        let count = plan.enqueue(self.downloader.as_ref()).await?;
        if count > 0 {
            info!(count, "Auto-download queued new playables");
            self.events
                .emit(CoreEvent::Library(LibraryEvent::PlayablesQueued { count }))
                .ok();
        }
        Ok(())
    }
}

/// Podcast refresh run when the OS grants a background-fetch slot.
pub struct BackgroundFetchTriggeredSyncer {
    pool: SqlitePool,
    syncer: Arc<dyn LibrarySyncer>,
    auto_download: Arc<AutoDownloadLibrarySyncer>,
}

impl BackgroundFetchTriggeredSyncer {
    pub fn new(
        pool: SqlitePool,
        syncer: Arc<dyn LibrarySyncer>,
        auto_download: Arc<AutoDownloadLibrarySyncer>,
    ) -> Self {
        Self {
            pool,
            syncer,
            auto_download,
        }
    }

    /// Refresh podcasts, then each podcast's episodes in turn. Returns the
    /// new episodes per podcast; podcasts without new episodes are left out.
    #[instrument(skip(self))]
    pub async fn sync_and_collect_new_podcast_episodes(
        &self,
    ) -> Result<Vec<(Podcast, Vec<PodcastEpisode>)>> {
        info!("Performing podcast episode sync");
        self.syncer.sync_down_podcasts_without_episodes().await?;

        let podcasts: Vec<Podcast> = LibraryStorage::new(self.pool.clone())
            .list::<Podcast>()
            .await
            .into_iter()
            .filter(|podcast| podcast.remote_status == RemoteStatus::Available)
            .collect();

        let mut collected = Vec::new();
        for podcast in podcasts {
            let added = self.auto_download.sync_latest_podcast_episodes(&podcast).await?;
            for episode in &added {
                info!(podcast = %podcast.title, episode = %episode.title, "New podcast episode");
            }
            if !added.is_empty() {
                collected.push((podcast, added));
            }
        }
        Ok(collected)
    }
}
