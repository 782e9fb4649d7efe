//! Cached playable files.
//!
//! A playable is cached exactly when a `song_files` row references it. The
//! `delete_cache_of_*` operations only ever remove those rows, so running
//! them on uncached entities changes nothing.

use super::LibraryStorage;
use crate::error::Result;
use crate::models::{Album, Artist, Genre, Playlist, Podcast, SongFile};
use crate::PlayableEntity;
use tracing::debug;

impl LibraryStorage {
    pub async fn get_song_file(&mut self, playable: &impl PlayableEntity) -> Option<SongFile> {
        self.load_rows(
            "SongFile",
            sqlx::query_as::<_, SongFile>("SELECT * FROM song_files WHERE playable_pk = ?")
                .bind(playable.playable_pk()),
        )
        .await
        .into_iter()
        .next()
    }

    /// Store the downloaded payload, replacing a previous one.
    pub async fn set_song_file(&mut self, playable: &impl PlayableEntity, data: Vec<u8>) -> Result<()> {
        let size = i64::try_from(data.len()).unwrap_or(i64::MAX);
        let conn = self.conn().await?;
        sqlx::query(
            "INSERT INTO song_files (playable_pk, data, size, created_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(playable_pk) DO UPDATE SET
                 data = excluded.data, size = excluded.size, created_at = excluded.created_at",
        )
        .bind(playable.playable_pk())
        .bind(data)
        .bind(size)
        .bind(core_async::time::now_secs())
        .execute(&mut *conn)
        .await?;

        debug!(playable = playable.playable_pk(), size, "Stored cached file");
        Ok(())
    }

    pub async fn delete_cache_of_song(&mut self, playable: &impl PlayableEntity) -> Result<u64> {
        self.delete_song_files(
            "DELETE FROM song_files WHERE playable_pk = ?",
            playable.playable_pk(),
        )
        .await
    }

    pub async fn delete_cache_of_playlist(&mut self, playlist: &Playlist) -> Result<u64> {
        self.delete_song_files(
            "DELETE FROM song_files WHERE playable_pk IN
                 (SELECT playable_pk FROM playlist_items WHERE playlist_pk = ?)",
            playlist.pk,
        )
        .await
    }

    pub async fn delete_cache_of_genre(&mut self, genre: &Genre) -> Result<u64> {
        self.delete_song_files(
            "DELETE FROM song_files WHERE playable_pk IN
                 (SELECT pk FROM playables WHERE genre_pk = ?)",
            genre.pk,
        )
        .await
    }

    pub async fn delete_cache_of_artist(&mut self, artist: &Artist) -> Result<u64> {
        self.delete_song_files(
            "DELETE FROM song_files WHERE playable_pk IN
                 (SELECT pk FROM playables WHERE artist_pk = ?)",
            artist.pk,
        )
        .await
    }

    pub async fn delete_cache_of_album(&mut self, album: &Album) -> Result<u64> {
        self.delete_song_files(
            "DELETE FROM song_files WHERE playable_pk IN
                 (SELECT pk FROM playables WHERE album_pk = ?)",
            album.pk,
        )
        .await
    }

    pub async fn delete_cache_of_podcast(&mut self, podcast: &Podcast) -> Result<u64> {
        self.delete_song_files(
            "DELETE FROM song_files WHERE playable_pk IN
                 (SELECT pk FROM playables WHERE podcast_pk = ?)",
            podcast.pk,
        )
        .await
    }

    pub async fn delete_complete_song_cache(&mut self) -> Result<u64> {
        let conn = self.conn().await?;
        let deleted = sqlx::query("DELETE FROM song_files")
            .execute(&mut *conn)
            .await?
            .rows_affected();

        debug!(deleted, "Deleted complete song cache");
        Ok(deleted)
    }

    /// Total size of all cached files in bytes.
    pub async fn cached_bytes(&mut self) -> i64 {
        self.scalar(
            "SongFile",
            sqlx::query_as::<_, (i64,)>("SELECT COALESCE(SUM(size), 0) FROM song_files"),
        )
        .await
        .unwrap_or(0)
    }

    async fn delete_song_files(&mut self, sql: &str, owner_pk: i64) -> Result<u64> {
        let conn = self.conn().await?;
        let deleted = sqlx::query(sql)
            .bind(owner_pk)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        Ok(deleted)
    }
}
