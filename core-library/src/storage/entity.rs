//! Table metadata for entities handled by the generic accessor operations.

use crate::models::{
    Album, Artist, Artwork, Directory, Genre, LogEntry, MusicFolder, PlayerData, Playlist,
    Podcast, PodcastEpisode, Song, SyncWave, UserStatistics,
};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::FromRow;

/// An entity stored as one row of a single table.
pub trait StoredEntity: for<'r> FromRow<'r, SqliteRow> + Serialize + Send + Unpin {
    /// Topic used when logging failures for this kind
    const KIND: &'static str;
    /// Table written by `update` and `delete`
    const TABLE: &'static str;
    /// Relation read by every query, may add computed columns
    const VIEW: &'static str;
    const ORDER_BY: &'static str;
    /// Statement inserting a row with default values
    const INSERT_DEFAULT: &'static str;

    fn pk(&self) -> i64;
}

/// An entity carrying a remote id assigned by the server.
pub trait RemoteEntity: StoredEntity {
    fn id(&self) -> &str;
}

macro_rules! stored_entity {
    ($ty:ty, kind: $kind:expr, table: $table:expr, view: $view:expr, order_by: $order:expr, insert: $insert:expr) => {
        impl StoredEntity for $ty {
            const KIND: &'static str = $kind;
            const TABLE: &'static str = $table;
            const VIEW: &'static str = $view;
            const ORDER_BY: &'static str = $order;
            const INSERT_DEFAULT: &'static str = $insert;

            fn pk(&self) -> i64 {
                self.pk
            }
        }
    };
}

macro_rules! remote_entity {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl RemoteEntity for $ty {
                fn id(&self) -> &str {
                    &self.id
                }
            }
        )+
    };
}

stored_entity!(Artist, kind: "Artist", table: "artists", view: "artists",
    order_by: "name, id", insert: "INSERT INTO artists DEFAULT VALUES");
stored_entity!(Album, kind: "Album", table: "albums", view: "albums",
    order_by: "name, id", insert: "INSERT INTO albums DEFAULT VALUES");
stored_entity!(Genre, kind: "Genre", table: "genres", view: "genres",
    order_by: "name, id", insert: "INSERT INTO genres DEFAULT VALUES");
stored_entity!(MusicFolder, kind: "MusicFolder", table: "music_folders", view: "music_folders",
    order_by: "name, id", insert: "INSERT INTO music_folders DEFAULT VALUES");
stored_entity!(Directory, kind: "Directory", table: "directories", view: "directories",
    order_by: "name, id", insert: "INSERT INTO directories DEFAULT VALUES");
stored_entity!(Podcast, kind: "Podcast", table: "podcasts", view: "podcasts",
    order_by: "title, id", insert: "INSERT INTO podcasts DEFAULT VALUES");
stored_entity!(Song, kind: "Song", table: "playables", view: "song_view",
    order_by: "title, id", insert: "INSERT INTO playables (kind) VALUES ('song')");
stored_entity!(PodcastEpisode, kind: "PodcastEpisode", table: "playables", view: "episode_view",
    order_by: "title, id", insert: "INSERT INTO playables (kind) VALUES ('episode')");
stored_entity!(Playlist, kind: "Playlist", table: "playlists", view: "playlist_view",
    order_by: "name, id", insert: "INSERT INTO playlists DEFAULT VALUES");
stored_entity!(Artwork, kind: "Artwork", table: "artworks", view: "artwork_view",
    order_by: "pk", insert: "INSERT INTO artworks DEFAULT VALUES");
stored_entity!(SyncWave, kind: "SyncWave", table: "sync_waves", view: "sync_wave_view",
    order_by: "pk", insert: "INSERT INTO sync_waves DEFAULT VALUES");
stored_entity!(LogEntry, kind: "LogEntry", table: "log_entries", view: "log_entries",
    order_by: "created_at DESC, pk DESC", insert: "INSERT INTO log_entries DEFAULT VALUES");
stored_entity!(PlayerData, kind: "PlayerData", table: "player_data", view: "player_data",
    order_by: "pk", insert: "INSERT INTO player_data DEFAULT VALUES");
stored_entity!(UserStatistics, kind: "UserStatistics", table: "user_statistics", view: "user_statistics",
    order_by: "created_at, pk", insert: "INSERT INTO user_statistics DEFAULT VALUES");

remote_entity!(Artist, Album, Genre, MusicFolder, Directory, Podcast, Song, PodcastEpisode, Playlist);
