//! Named constructors, bookkeeping rows and library statistics.

use super::LibraryStorage;
use crate::error::Result;
use crate::models::{
    Album, Artist, Artwork, Directory, Genre, LibraryInfo, LogEntry, LogEntryType, MusicFolder,
    Playlist, Podcast, PodcastEpisode, Song, StatisticCategory, SyncWave, UserStatisticCount,
    UserStatistics,
};
use core_async::time::now_secs;
use tracing::info;

impl LibraryStorage {
    pub async fn create_song(&mut self) -> Result<Song> {
        self.create().await
    }

    pub async fn create_podcast_episode(&mut self) -> Result<PodcastEpisode> {
        self.create().await
    }

    /// Start a new sync wave produced by the given library version.
    pub async fn create_sync_wave(&mut self, library_version: i64) -> Result<SyncWave> {
        let mut wave: SyncWave = self.create().await?;
        wave.created_at = now_secs();
        wave.library_version = library_version;
        self.update(&wave).await?;
        Ok(wave)
    }

    pub async fn create_log_entry(
        &mut self,
        topic: &str,
        status_code: i32,
        message: &str,
        entry_type: LogEntryType,
    ) -> Result<LogEntry> {
        let mut entry: LogEntry = self.create().await?;
        entry.topic = topic.to_string();
        entry.status_code = status_code;
        entry.message = message.to_string();
        entry.entry_type = entry_type;
        entry.created_at = now_secs();
        self.update(&entry).await?;
        Ok(entry)
    }

    pub async fn get_latest_sync_wave(&mut self) -> Option<SyncWave> {
        self.load_optional(sqlx::query_as::<_, SyncWave>(
            "SELECT * FROM sync_wave_view ORDER BY pk DESC LIMIT 1",
        ))
        .await
    }

    pub async fn get_sync_waves(&mut self) -> Vec<SyncWave> {
        self.list().await
    }

    /// Log entries, newest first.
    pub async fn get_log_entries(&mut self) -> Vec<LogEntry> {
        self.list().await
    }

    pub async fn get_genre_by_name(&mut self, name: &str) -> Option<Genre> {
        self.load_optional(
            sqlx::query_as::<_, Genre>("SELECT * FROM genres WHERE name = ? ORDER BY pk LIMIT 1")
                .bind(name),
        )
        .await
    }

    pub async fn get_music_folders(&mut self) -> Vec<MusicFolder> {
        self.list().await
    }

    pub async fn get_directory(&mut self, id: &str) -> Option<Directory> {
        self.get(id).await
    }

    pub async fn cached_song_count(&mut self) -> i64 {
        self.scalar(
            "SongFile",
            sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM song_view WHERE is_cached"),
        )
        .await
        .unwrap_or(0)
    }

    /// Statistics of `app_version`, created on first use. A created row is
    /// pending until the context is saved.
    pub async fn get_user_statistics(&mut self, app_version: &str) -> Result<UserStatistics> {
        let existing = self
            .load_optional(
                sqlx::query_as::<_, UserStatistics>(
                    "SELECT * FROM user_statistics WHERE app_version = ? ORDER BY pk LIMIT 1",
                )
                .bind(app_version),
            )
            .await;
        if let Some(statistics) = existing {
            return Ok(statistics);
        }

        info!(app_version, "Creating user statistics");
        let mut statistics: UserStatistics = self.create().await?;
        statistics.app_version = app_version.to_string();
        statistics.created_at = now_secs();
        self.update(&statistics).await?;
        Ok(statistics)
    }

    pub async fn get_all_user_statistics(&mut self) -> Vec<UserStatistics> {
        self.list().await
    }

    /// Count one use of `name` and return the new total.
    pub async fn record_user_statistic(
        &mut self,
        statistics: &UserStatistics,
        category: StatisticCategory,
        name: &str,
    ) -> Result<i64> {
        let conn = self.conn().await?;
        let (uses,): (i64,) = sqlx::query_as(
            "INSERT INTO user_statistic_counts (statistics_pk, category, name, uses)
             VALUES (?, ?, ?, 1)
             ON CONFLICT (statistics_pk, category, name) DO UPDATE SET uses = uses + 1
             RETURNING uses",
        )
        .bind(statistics.pk)
        .bind(category)
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;

        Ok(uses)
    }

    pub async fn user_statistic_counts(&mut self, statistics: &UserStatistics) -> Vec<UserStatisticCount> {
        self.load_rows(
            "UserStatistics",
            sqlx::query_as::<_, UserStatisticCount>(
                "SELECT category, name, uses FROM user_statistic_counts
                 WHERE statistics_pk = ?
                 ORDER BY category, name",
            )
            .bind(statistics.pk),
        )
        .await
    }

    pub async fn get_info(&mut self) -> LibraryInfo {
        LibraryInfo {
            artist_count: self.count::<Artist>().await,
            album_count: self.count::<Album>().await,
            song_count: self.count::<Song>().await,
            genre_count: self.count::<Genre>().await,
            playlist_count: self.count::<Playlist>().await,
            podcast_count: self.count::<Podcast>().await,
            podcast_episode_count: self.count::<PodcastEpisode>().await,
            cached_song_count: self.cached_song_count().await,
            sync_wave_count: self.count::<SyncWave>().await,
            artwork_count: self.count::<Artwork>().await,
            music_folder_count: self.count::<MusicFolder>().await,
            directory_count: self.count::<Directory>().await,
            cached_bytes: self.cached_bytes().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::models::{Genre, LogEntryType, Playlist, StatisticCategory};
    use crate::storage::test_support::storage;

    #[core_async::test]
    async fn test_sync_wave_ids_continue_from_latest() {
        let (_pool, mut library) = storage().await;
        for _ in 0..3 {
            library.create_sync_wave(3).await.unwrap();
        }
        let ids: Vec<i64> = library.get_sync_waves().await.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);

        let wave = library.create_sync_wave(3).await.unwrap();
        assert_eq!(wave.id, 3);
        assert!(!wave.is_done);
        assert_eq!(wave.library_version, 3);

        let latest = library.get_latest_sync_wave().await.unwrap();
        assert_eq!(latest.id, 3);
        assert_eq!(latest.pk, wave.pk);
    }

    #[core_async::test]
    async fn test_log_entries_newest_first() {
        let (_pool, mut library) = storage().await;
        library
            .create_log_entry("Song Sync", 4, "first", LogEntryType::Error)
            .await
            .unwrap();
        library
            .create_log_entry("API Error", 5, "second", LogEntryType::ApiError)
            .await
            .unwrap();

        let entries = library.get_log_entries().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "second");
        assert_eq!(entries[0].entry_type, LogEntryType::ApiError);
        assert_eq!(entries[1].topic, "Song Sync");
    }

    #[core_async::test]
    async fn test_genre_by_name() {
        let (_pool, mut library) = storage().await;
        let mut genre: Genre = library.create().await.unwrap();
        genre.set_name("Jazz");
        library.update(&genre).await.unwrap();

        assert_eq!(library.get_genre_by_name("Jazz").await.unwrap().pk, genre.pk);
        assert!(library.get_genre_by_name("Rock").await.is_none());
    }

    #[core_async::test]
    async fn test_info_counts() {
        let (_pool, mut library) = storage().await;
        let song = library.create_song().await.unwrap();
        library.create_song().await.unwrap();
        library.create_podcast_episode().await.unwrap();
        library.set_song_file(&song, vec![0; 10]).await.unwrap();

        let info = library.get_info().await;
        assert_eq!(info.song_count, 2);
        assert_eq!(info.podcast_episode_count, 1);
        assert_eq!(info.cached_song_count, 1);
        assert_eq!(info.cached_bytes, 10);
        assert_eq!(info.artist_count, 0);
    }

    #[core_async::test]
    async fn test_info_playlist_count_skips_player_queues() {
        let (_pool, mut library) = storage().await;
        library.get_player_data().await.unwrap();
        library.save_context().await.unwrap();
        assert_eq!(library.get_info().await.playlist_count, 0);

        let mut playlist: Playlist = library.create().await.unwrap();
        playlist.id = "pl-1".to_string();
        library.update(&playlist).await.unwrap();
        assert_eq!(library.get_info().await.playlist_count, 1);
    }

    #[core_async::test]
    async fn test_user_statistics_per_app_version() {
        let (_pool, mut library) = storage().await;
        let first = library.get_user_statistics("1.4.0").await.unwrap();
        assert_eq!(first.app_version, "1.4.0");
        assert!(first.created_at > 0);

        let again = library.get_user_statistics("1.4.0").await.unwrap();
        assert_eq!(again.pk, first.pk);
        let next = library.get_user_statistics("1.5.0").await.unwrap();
        assert_ne!(next.pk, first.pk);

        let versions: Vec<String> = library
            .get_all_user_statistics()
            .await
            .into_iter()
            .map(|s| s.app_version)
            .collect();
        assert_eq!(versions.len(), 2);
        assert!(versions.contains(&"1.4.0".to_string()));
        assert!(versions.contains(&"1.5.0".to_string()));
    }

    #[core_async::test]
    async fn test_record_user_statistic_counts_uses() {
        let (_pool, mut library) = storage().await;
        let statistics = library.get_user_statistics("1.4.0").await.unwrap();
        let other = library.get_user_statistics("1.5.0").await.unwrap();

        let visited = StatisticCategory::Visited;
        assert_eq!(library.record_user_statistic(&statistics, visited, "podcasts").await.unwrap(), 1);
        assert_eq!(library.record_user_statistic(&statistics, visited, "podcasts").await.unwrap(), 2);
        library
            .record_user_statistic(&statistics, StatisticCategory::Action, "airplay")
            .await
            .unwrap();
        library.record_user_statistic(&other, visited, "podcasts").await.unwrap();

        let counts = library.user_statistic_counts(&statistics).await;
        let rendered: Vec<(StatisticCategory, &str, i64)> = counts
            .iter()
            .map(|c| (c.category, c.name.as_str(), c.uses))
            .collect();
        assert_eq!(
            rendered,
            vec![
                (StatisticCategory::Action, "airplay", 1),
                (StatisticCategory::Visited, "podcasts", 2),
            ]
        );
        assert_eq!(library.user_statistic_counts(&other).await[0].uses, 1);
    }
}
