//! # Playable Containers
//!
//! Albums, artists, genres, playlists, podcasts and ad-hoc song sets share
//! one read/refresh/cache surface, [`PlayableContainable`]. Shared behavior
//! lives in the trait's default methods; implementors provide the playables,
//! the info line and the server refresh.

use crate::api::FavoriteKind;
use crate::auto_download::{AutoDownloadLibrarySyncer, DownloadPlan};
use crate::engine::LibrarySyncer;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use core_library::{
    Album, Artist, Genre, LibraryStorage, Playable, PlayableEntity, Playlist, Podcast, Song,
};
use core_runtime::LibrarySettings;
use std::sync::Arc;
use tracing::debug;

const INFO_SEPARATOR: &str = " · ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailType {
    Short,
    Long,
}

/// Collaborators a container needs to refresh itself from the server.
#[derive(Clone)]
pub struct FetchContext {
    pub syncer: Arc<dyn LibrarySyncer>,
    pub auto_download: Arc<AutoDownloadLibrarySyncer>,
    pub settings: Arc<LibrarySettings>,
}

#[async_trait]
pub trait PlayableContainable: Send + Sync {
    fn name(&self) -> &str;

    fn subtitle(&self) -> Option<String> {
        None
    }

    /// Contained playables as currently stored.
    async fn playables(&self, library: &mut LibraryStorage) -> Vec<Playable>;

    fn info_details(&self, playables: &[Playable], detail: DetailType) -> Vec<String>;

    fn info(&self, playables: &[Playable], detail: DetailType) -> String {
        self.info_details(playables, detail).join(INFO_SEPARATOR)
    }

    /// Total duration in seconds.
    fn duration(&self, playables: &[Playable]) -> i64 {
        playables.iter().map(PlayableEntity::duration).sum()
    }

    fn is_favoritable(&self) -> bool {
        false
    }

    fn is_favorite(&self) -> bool {
        false
    }

    fn is_download_available(&self) -> bool {
        true
    }

    async fn fetch_from_server(&self, context: &FetchContext) -> Result<()>;

    /// Refresh from the server unless the app is offline.
    async fn fetch(&self, context: &FetchContext) -> Result<()> {
        if !context.settings.is_online_mode() {
            debug!(container = self.name(), "Offline, skipping server fetch");
            return Ok(());
        }
        self.fetch_from_server(context).await
    }

    async fn remote_toggle_favorite(&self, _syncer: &dyn LibrarySyncer) -> Result<()> {
        Ok(())
    }

    /// Plan downloading every contained playable not cached yet.
    async fn cache_playables(
        &self,
        library: &mut LibraryStorage,
        confirmation_threshold: usize,
    ) -> DownloadPlan {
        let playables = self.playables(library).await;
        DownloadPlan::for_playables(&playables, confirmation_threshold)
    }
}

/// `3:07` below an hour, `1:02:03` above.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let (hours, minutes, seconds) = (seconds / 3600, seconds % 3600 / 60, seconds % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

fn is_completely_cached(playables: &[Playable]) -> bool {
    !playables.is_empty() && playables.iter().all(PlayableEntity::is_cached)
}

fn count_label(count: usize, singular: &str) -> Option<String> {
    match count {
        0 => None,
        1 => Some(format!("1 {singular}")),
        n => Some(format!("{n} {singular}s")),
    }
}

/// Count, then cached marker and total duration for the long form.
fn playable_details(playables: &[Playable], singular: &str, detail: DetailType) -> Vec<String> {
    let mut details: Vec<String> = count_label(playables.len(), singular).into_iter().collect();
    if detail == DetailType::Long {
        if is_completely_cached(playables) {
            details.push("Cached".to_string());
        }
        let duration: i64 = playables.iter().map(PlayableEntity::duration).sum();
        if duration > 0 {
            details.push(format_duration(duration));
        }
    }
    details
}

fn into_playables<T: Into<Playable>>(items: Vec<T>) -> Vec<Playable> {
    items.into_iter().map(Into::into).collect()
}

#[async_trait]
impl PlayableContainable for Album {
    fn name(&self) -> &str {
        &self.name
    }

    async fn playables(&self, library: &mut LibraryStorage) -> Vec<Playable> {
        into_playables(library.songs_of_album(self).await)
    }

    fn info_details(&self, playables: &[Playable], detail: DetailType) -> Vec<String> {
        let mut details = Vec::new();
        if detail == DetailType::Long && self.year > 0 {
            details.push(format!("Year {}", self.year));
        }
        details.extend(playable_details(playables, "Song", detail));
        details
    }

    fn is_favoritable(&self) -> bool {
        true
    }

    fn is_favorite(&self) -> bool {
        self.is_favorite
    }

    async fn fetch_from_server(&self, context: &FetchContext) -> Result<()> {
        context.syncer.sync_album(self).await.map(|_| ())
    }

    async fn remote_toggle_favorite(&self, syncer: &dyn LibrarySyncer) -> Result<()> {
        syncer
            .set_favorite(FavoriteKind::Album, &self.id, !self.is_favorite)
            .await
    }
}

#[async_trait]
impl PlayableContainable for Artist {
    fn name(&self) -> &str {
        &self.name
    }

    async fn playables(&self, library: &mut LibraryStorage) -> Vec<Playable> {
        into_playables(library.songs_of_artist(self).await)
    }

    fn info_details(&self, playables: &[Playable], detail: DetailType) -> Vec<String> {
        playable_details(playables, "Song", detail)
    }

    fn is_favoritable(&self) -> bool {
        true
    }

    fn is_favorite(&self) -> bool {
        self.is_favorite
    }

    async fn fetch_from_server(&self, context: &FetchContext) -> Result<()> {
        context.syncer.sync_artist(self).await.map(|_| ())
    }

    async fn remote_toggle_favorite(&self, syncer: &dyn LibrarySyncer) -> Result<()> {
        syncer
            .set_favorite(FavoriteKind::Artist, &self.id, !self.is_favorite)
            .await
    }
}

#[async_trait]
impl PlayableContainable for Genre {
    fn name(&self) -> &str {
        &self.name
    }

    async fn playables(&self, library: &mut LibraryStorage) -> Vec<Playable> {
        into_playables(library.songs_of_genre(self).await)
    }

    fn info_details(&self, playables: &[Playable], detail: DetailType) -> Vec<String> {
        playable_details(playables, "Song", detail)
    }

    async fn fetch_from_server(&self, context: &FetchContext) -> Result<()> {
        context.syncer.sync_genre(self).await.map(|_| ())
    }
}

#[async_trait]
impl PlayableContainable for Playlist {
    fn name(&self) -> &str {
        &self.name
    }

    async fn playables(&self, library: &mut LibraryStorage) -> Vec<Playable> {
        library.playlist_playables(self).await
    }

    fn info_details(&self, playables: &[Playable], detail: DetailType) -> Vec<String> {
        playable_details(playables, "Song", detail)
    }

    fn is_download_available(&self) -> bool {
        !self.is_system()
    }

    async fn fetch_from_server(&self, context: &FetchContext) -> Result<()> {
        if self.id.is_empty() || self.is_system() {
            return Ok(());
        }
        context.syncer.sync_playlist(self).await.map(|_| ())
    }
}

#[async_trait]
impl PlayableContainable for Podcast {
    fn name(&self) -> &str {
        &self.title
    }

    async fn playables(&self, library: &mut LibraryStorage) -> Vec<Playable> {
        into_playables(library.podcast_episodes(self).await)
    }

    fn info_details(&self, playables: &[Playable], detail: DetailType) -> Vec<String> {
        playable_details(playables, "Episode", detail)
    }

    async fn fetch_from_server(&self, context: &FetchContext) -> Result<()> {
        context
            .auto_download
            .sync_latest_podcast_episodes(self)
            .await
            .map(|_| ())
    }

    async fn remote_toggle_favorite(&self, _syncer: &dyn LibrarySyncer) -> Result<()> {
        Err(SyncError::NotSupported(
            "podcasts cannot be marked as favorite".to_string(),
        ))
    }
}

/// Songs grouped for one screen, e.g. search results or the latest songs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SongSet {
    pub name: String,
    pub songs: Vec<Song>,
}

impl SongSet {
    pub fn new(name: impl Into<String>, songs: Vec<Song>) -> Self {
        Self {
            name: name.into(),
            songs,
        }
    }
}

#[async_trait]
impl PlayableContainable for SongSet {
    fn name(&self) -> &str {
        &self.name
    }

    async fn playables(&self, _library: &mut LibraryStorage) -> Vec<Playable> {
        into_playables(self.songs.clone())
    }

    fn info_details(&self, playables: &[Playable], detail: DetailType) -> Vec<String> {
        playable_details(playables, "Song", detail)
    }

    async fn fetch_from_server(&self, context: &FetchContext) -> Result<()> {
        for song in &self.songs {
            context.syncer.sync_song(song).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CatalogLibrarySyncer;
    use crate::test_support::{settings, FakeCatalogApi};
    use bridge_traits::{DownloadRequest, PlayableDownloader};
    use core_library::db::create_test_pool;
    use core_library::{EpisodeUserStatus, PodcastEpisode};
    use core_runtime::events::EventBus;
    use sqlx::SqlitePool;

    struct NoopDownloader;

    #[async_trait]
    impl PlayableDownloader for NoopDownloader {
        async fn download_all(&self, _requests: Vec<DownloadRequest>) -> bridge_traits::error::Result<()> {
            Ok(())
        }
    }

    async fn fetch_context(pool: &SqlitePool) -> (Arc<FakeCatalogApi>, FetchContext) {
        let api = Arc::new(FakeCatalogApi::default());
        let settings = settings().await;
        let syncer: Arc<dyn LibrarySyncer> =
            Arc::new(CatalogLibrarySyncer::new(api.clone(), pool.clone(), settings.clone()));
        let auto_download = Arc::new(AutoDownloadLibrarySyncer::new(
            syncer.clone(),
            settings.clone(),
            Arc::new(NoopDownloader),
            EventBus::new(16),
        ));
        let context = FetchContext {
            syncer,
            auto_download,
            settings,
        };
        (api, context)
    }

    async fn album_with_songs(library: &mut LibraryStorage, durations: &[i64]) -> (Album, Vec<Song>) {
        let mut album: Album = library.create().await.unwrap();
        album.id = "al-1".to_string();
        album.set_name("Blue Train");
        album.year = 1958;
        library.update(&album).await.unwrap();

        let mut songs = Vec::new();
        for (i, duration) in durations.iter().enumerate() {
            let mut song = library.create_song().await.unwrap();
            song.id = format!("s-{i}");
            song.set_title(format!("Track {i}"));
            song.duration = *duration;
            song.album_pk = Some(album.pk);
            library.update(&song).await.unwrap();
            songs.push(song);
        }
        (album, songs)
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(187), "3:07");
        assert_eq!(format_duration(3723), "1:02:03");
    }

    #[core_async::test]
    async fn test_podcast_info_counts_visible_episodes() {
        let pool = create_test_pool().await.unwrap();
        let mut library = LibraryStorage::new(pool);
        let mut podcast: Podcast = library.create().await.unwrap();
        podcast.id = "p-1".to_string();
        podcast.set_title("Radiolab");
        library.update(&podcast).await.unwrap();

        for (i, status) in [
            EpisodeUserStatus::Available,
            EpisodeUserStatus::Deleted,
            EpisodeUserStatus::Available,
        ]
        .into_iter()
        .enumerate()
        {
            let mut episode: PodcastEpisode = library.create_podcast_episode().await.unwrap();
            episode.id = format!("e-{i}");
            episode.podcast_pk = Some(podcast.pk);
            episode.duration = 150;
            episode.user_status = status;
            library.update(&episode).await.unwrap();
        }

        let playables = podcast.playables(&mut library).await;
        assert_eq!(playables.len(), 2);
        assert_eq!(podcast.info(&playables, DetailType::Short), "2 Episodes");
        assert_eq!(podcast.info(&playables, DetailType::Long), "2 Episodes · 5:00");
        assert_eq!(podcast.duration(&playables), 300);
        assert!(!podcast.is_favoritable());
    }

    #[core_async::test]
    async fn test_album_info_and_cache_plan() {
        let pool = create_test_pool().await.unwrap();
        let mut library = LibraryStorage::new(pool);
        let (album, songs) = album_with_songs(&mut library, &[120, 60]).await;
        library.set_song_file(&songs[0], vec![1, 2, 3]).await.unwrap();

        let playables = album.playables(&mut library).await;
        assert_eq!(
            album.info(&playables, DetailType::Long),
            "Year 1958 · 2 Songs · 3:00"
        );

        let plan = album.cache_playables(&mut library, 1).await;
        assert_eq!(plan.pending_count(), 1);
        assert_eq!(plan.requests()[0].remote_id, songs[1].id);
        assert!(!plan.requires_confirmation());

        library.set_song_file(&songs[1], vec![4]).await.unwrap();
        let playables = album.playables(&mut library).await;
        assert_eq!(album.info(&playables, DetailType::Short), "2 Songs");
        assert!(album
            .info(&playables, DetailType::Long)
            .contains("Cached"));
        assert!(album.cache_playables(&mut library, 1).await.is_empty());
    }

    #[core_async::test]
    async fn test_podcast_favorite_toggle_is_not_supported() {
        let pool = create_test_pool().await.unwrap();
        let (api, context) = fetch_context(&pool).await;
        let podcast = Podcast {
            id: "p-1".to_string(),
            ..Default::default()
        };

        let result = podcast.remote_toggle_favorite(context.syncer.as_ref()).await;
        assert!(matches!(result, Err(SyncError::NotSupported(_))));
        assert!(api.calls().is_empty());
    }

    #[core_async::test]
    async fn test_album_favorite_toggle_goes_to_server() {
        let pool = create_test_pool().await.unwrap();
        let mut library = LibraryStorage::new(pool.clone());
        let (album, _) = album_with_songs(&mut library, &[]).await;
        library.save_context().await.unwrap();
        drop(library);
        let (api, context) = fetch_context(&pool).await;

        album
            .remote_toggle_favorite(context.syncer.as_ref())
            .await
            .unwrap();

        assert_eq!(api.calls(), vec!["set_favorite:al-1:true"]);
        let album: Album = LibraryStorage::new(pool).get("al-1").await.unwrap();
        assert!(album.is_favorite);
    }

    #[core_async::test]
    async fn test_fetch_is_skipped_offline() {
        let pool = create_test_pool().await.unwrap();
        let (api, context) = fetch_context(&pool).await;
        context.settings.set_online_mode(false).await.unwrap();
        let genre = Genre {
            id: "g-1".to_string(),
            name: "Jazz".to_string(),
            ..Default::default()
        };

        genre.fetch(&context).await.unwrap();
        assert!(api.calls().is_empty());

        context.settings.set_online_mode(true).await.unwrap();
        genre.fetch(&context).await.unwrap();
        assert_eq!(api.calls(), vec!["fetch_genre_songs:Jazz"]);
    }
}
