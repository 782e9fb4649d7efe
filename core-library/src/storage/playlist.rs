//! Playlist items and the player queue.
//!
//! Item positions are dense per playlist. Appends take the next position and
//! the `playlist_items_close_gap` trigger shifts later items down on every
//! delete, including deletes cascaded from a removed playable.

use super::LibraryStorage;
use crate::error::Result;
use crate::models::{
    Playable, PlayerData, PlayerQueue, Playlist, PlaylistItem, PlaylistSearchCategory,
    NORMAL_PLAYLIST_ID, SHUFFLED_PLAYLIST_ID, SMART_PLAYLIST_PREFIX, SYSTEM_PLAYLIST_PREFIX,
};
use rand::seq::SliceRandom;
use tracing::{debug, info};

impl LibraryStorage {
    pub async fn playlist_items(&mut self, playlist: &Playlist) -> Vec<PlaylistItem> {
        self.load_rows(
            "PlaylistItem",
            sqlx::query_as::<_, PlaylistItem>(
                "SELECT * FROM playlist_items WHERE playlist_pk = ? ORDER BY position, pk",
            )
            .bind(playlist.pk),
        )
        .await
    }

    /// Songs and episodes of the playlist in item order.
    pub async fn playlist_playables(&mut self, playlist: &Playlist) -> Vec<Playable> {
        let playables = self
            .load_rows(
                "Playlist",
                sqlx::query_as::<_, Playable>(
                    "SELECT p.* FROM playlist_items i
                     JOIN playable_view p ON p.pk = i.playable_pk
                     WHERE i.playlist_pk = ?
                     ORDER BY i.position, i.pk",
                )
                .bind(playlist.pk),
            )
            .await;

        for playable in &playables {
            match playable {
                Playable::Song(song) => self.remember(song),
                Playable::Episode(episode) => self.remember(episode),
            }
        }
        playables
    }

    pub async fn playlist_length(&mut self, playlist: &Playlist) -> i64 {
        self.scalar(
            "Playlist",
            sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM playlist_items WHERE playlist_pk = ?")
                .bind(playlist.pk),
        )
        .await
        .unwrap_or(0)
    }

    /// Append playables (by row key) after the last item.
    pub async fn append_to_playlist(&mut self, playlist: &Playlist, playable_pks: &[i64]) -> Result<()> {
        let conn = self.conn().await?;
        let (mut position,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM playlist_items WHERE playlist_pk = ?")
                .bind(playlist.pk)
                .fetch_one(&mut *conn)
                .await?;

        for playable_pk in playable_pks {
            sqlx::query(
                "INSERT INTO playlist_items (playlist_pk, playable_pk, position) VALUES (?, ?, ?)",
            )
            .bind(playlist.pk)
            .bind(playable_pk)
            .bind(position)
            .execute(&mut *conn)
            .await?;
            position += 1;
        }

        Ok(())
    }

    /// Remove the item at `position`. Returns false when there is none.
    pub async fn remove_from_playlist(&mut self, playlist: &Playlist, position: i64) -> Result<bool> {
        let conn = self.conn().await?;
        let result = sqlx::query(
            "DELETE FROM playlist_items WHERE pk =
                 (SELECT pk FROM playlist_items WHERE playlist_pk = ? AND position = ? LIMIT 1)",
        )
        .bind(playlist.pk)
        .bind(position)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn clear_playlist(&mut self, playlist: &Playlist) -> Result<u64> {
        let conn = self.conn().await?;
        let result = sqlx::query("DELETE FROM playlist_items WHERE playlist_pk = ?")
            .bind(playlist.pk)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }

    /// Randomly reorder the items, keeping positions dense.
    pub async fn shuffle_playlist(&mut self, playlist: &Playlist) -> Result<()> {
        let mut items = self.playlist_items(playlist).await;
        items.shuffle(&mut rand::thread_rng());

        let conn = self.conn().await?;
        for (position, item) in items.iter().enumerate() {
            sqlx::query("UPDATE playlist_items SET position = ? WHERE pk = ?")
                .bind(position as i64)
                .bind(item.pk)
                .execute(&mut *conn)
                .await?;
        }

        debug!(playlist = playlist.pk, items = items.len(), "Shuffled playlist");
        Ok(())
    }

    /// Delete the playlist together with its items.
    pub async fn delete_playlist(&mut self, playlist: &Playlist) -> Result<()> {
        self.clear_playlist(playlist).await?;
        self.delete(playlist).await
    }

    /// Playlists shown to the user. The player queue playlists are never
    /// listed.
    pub async fn get_playlists_by(&mut self, category: PlaylistSearchCategory) -> Vec<Playlist> {
        let query = match category {
            PlaylistSearchCategory::All => {
                sqlx::query_as::<_, Playlist>("SELECT * FROM playlist_view ORDER BY name, id")
            }
            PlaylistSearchCategory::UserOnly => sqlx::query_as::<_, Playlist>(
                "SELECT * FROM playlist_view WHERE instr(id, ?) != 1 ORDER BY name, id",
            )
            .bind(SMART_PLAYLIST_PREFIX),
            PlaylistSearchCategory::SmartOnly => sqlx::query_as::<_, Playlist>(
                "SELECT * FROM playlist_view WHERE instr(id, ?) = 1 ORDER BY name, id",
            )
            .bind(SMART_PLAYLIST_PREFIX),
        };

        self.load_all(query).await
    }

    /// Load the player data, repairing it on the way.
    ///
    /// Extra rows are deleted, missing queue playlists are created, and the
    /// shuffled queue is rebuilt from the normal one whenever their lengths
    /// differ.
    pub async fn get_player_data(&mut self) -> Result<PlayerQueue> {
        let mut rows = self.list::<PlayerData>().await.into_iter();
        let mut data = match rows.next() {
            Some(data) => data,
            None => {
                info!("Creating player data");
                self.create::<PlayerData>().await?
            }
        };
        for extra in rows {
            self.delete(&extra).await?;
        }

        let normal_playlist = self
            .ensure_system_playlist(data.normal_playlist_pk, NORMAL_PLAYLIST_ID, "Player queue")
            .await?;
        let shuffled_playlist = self
            .ensure_system_playlist(data.shuffled_playlist_pk, SHUFFLED_PLAYLIST_ID, "Shuffled queue")
            .await?;

        if data.normal_playlist_pk != Some(normal_playlist.pk)
            || data.shuffled_playlist_pk != Some(shuffled_playlist.pk)
        {
            data.normal_playlist_pk = Some(normal_playlist.pk);
            data.shuffled_playlist_pk = Some(shuffled_playlist.pk);
            self.update(&data).await?;
        }

        let normal_len = self.playlist_length(&normal_playlist).await;
        let shuffled_len = self.playlist_length(&shuffled_playlist).await;
        if normal_len != shuffled_len {
            info!(normal_len, shuffled_len, "Rebuilding shuffled player queue");
            let playable_pks: Vec<i64> = self
                .playlist_items(&normal_playlist)
                .await
                .into_iter()
                .map(|item| item.playable_pk)
                .collect();
            self.clear_playlist(&shuffled_playlist).await?;
            self.append_to_playlist(&shuffled_playlist, &playable_pks).await?;
            self.shuffle_playlist(&shuffled_playlist).await?;
        }

        Ok(PlayerQueue {
            data,
            normal_playlist,
            shuffled_playlist,
        })
    }

    async fn ensure_system_playlist(&mut self, pk: Option<i64>, id: &str, name: &str) -> Result<Playlist> {
        if let Some(pk) = pk {
            let by_pk = sqlx::query_as::<_, Playlist>(
                "SELECT * FROM playlists WHERE pk = ? AND instr(id, ?) = 1",
            )
            .bind(pk)
            .bind(SYSTEM_PLAYLIST_PREFIX);
            if let Some(playlist) = self.load_optional(by_pk).await {
                return Ok(playlist);
            }
        }
        let by_id = sqlx::query_as::<_, Playlist>(
            "SELECT * FROM playlists WHERE id = ? ORDER BY pk LIMIT 1",
        )
        .bind(id);
        if let Some(playlist) = self.load_optional(by_id).await {
            return Ok(playlist);
        }

        let mut playlist: Playlist = self.create().await?;
        playlist.id = id.to_string();
        playlist.set_name(name);
        self.update(&playlist).await?;
        Ok(playlist)
    }
}
