//! Domain models for the library store
//!
//! Every model is a view of one row. `pk` is the store's row key and is never
//! written back; `id` is the remote id assigned by the media server. Relations
//! are plain row-key columns (`*_pk`), resolved through [`crate::LibraryStorage`].

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use std::fmt;

// =============================================================================
// Enums
// =============================================================================

/// Whether the remote server still lists an entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RemoteStatus {
    #[default]
    Available,
    Deleted,
}

/// Lazy artwork download state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ImageStatus {
    #[default]
    NotChecked,
    Checked,
    Missing,
}

/// User-facing state of a podcast episode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum EpisodeUserStatus {
    Syncing,
    #[default]
    Available,
    Deleted,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum LogEntryType {
    Info,
    #[default]
    Error,
    ApiError,
}

/// Discriminator of the shared `playables` table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PlayableKind {
    #[default]
    Song,
    Episode,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    Single,
}

impl fmt::Display for PlayableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayableKind::Song => write!(f, "song"),
            PlayableKind::Episode => write!(f, "episode"),
        }
    }
}

/// Index section of a display name: uppercase first letter, `#` when the name
/// starts with anything else, `?` when it is empty.
pub fn section_initial(name: &str) -> String {
    match name.trim().chars().next() {
        None => "?".to_string(),
        Some(c) if c.is_alphabetic() => c.to_uppercase().collect(),
        Some(_) => "#".to_string(),
    }
}

// =============================================================================
// Catalog entities
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromRow)]
pub struct Artist {
    #[serde(skip_serializing, default)]
    pub pk: i64,
    pub id: String,
    pub name: String,
    pub alphabetic_section_initial: String,
    pub artwork_pk: Option<i64>,
    pub remote_status: RemoteStatus,
    pub is_favorite: bool,
}

impl Artist {
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.alphabetic_section_initial = section_initial(&self.name);
    }

    pub fn is_orphaned(&self) -> bool {
        self.id.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromRow)]
pub struct Album {
    #[serde(skip_serializing, default)]
    pub pk: i64,
    pub id: String,
    pub name: String,
    pub alphabetic_section_initial: String,
    pub artwork_pk: Option<i64>,
    pub remote_status: RemoteStatus,
    pub is_favorite: bool,
    pub year: i32,
    /// Song count reported by the server, used to detect incomplete syncs
    pub remote_song_count: i64,
    pub artist_pk: Option<i64>,
    pub genre_pk: Option<i64>,
}

impl Album {
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.alphabetic_section_initial = section_initial(&self.name);
    }

    pub fn is_orphaned(&self) -> bool {
        self.id.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromRow)]
pub struct Genre {
    #[serde(skip_serializing, default)]
    pub pk: i64,
    pub id: String,
    pub name: String,
    pub alphabetic_section_initial: String,
    pub artwork_pk: Option<i64>,
    pub remote_status: RemoteStatus,
}

impl Genre {
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.alphabetic_section_initial = section_initial(&self.name);
    }

    pub fn is_orphaned(&self) -> bool {
        self.id.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromRow)]
pub struct MusicFolder {
    #[serde(skip_serializing, default)]
    pub pk: i64,
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromRow)]
pub struct Directory {
    #[serde(skip_serializing, default)]
    pub pk: i64,
    pub id: String,
    pub name: String,
    pub alphabetic_section_initial: String,
    pub artwork_pk: Option<i64>,
    pub music_folder_pk: Option<i64>,
    pub parent_pk: Option<i64>,
}

impl Directory {
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.alphabetic_section_initial = section_initial(&self.name);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromRow)]
pub struct Podcast {
    #[serde(skip_serializing, default)]
    pub pk: i64,
    pub id: String,
    pub title: String,
    pub alphabetic_section_initial: String,
    pub depiction: String,
    pub artwork_pk: Option<i64>,
    pub remote_status: RemoteStatus,
}

impl Podcast {
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.alphabetic_section_initial = section_initial(&self.title);
    }
}

// =============================================================================
// Playables
// =============================================================================

/// Common read surface of songs and podcast episodes.
pub trait PlayableEntity {
    fn playable_pk(&self) -> i64;
    fn remote_id(&self) -> &str;
    fn title(&self) -> &str;
    /// Duration in seconds
    fn duration(&self) -> i64;
    fn is_cached(&self) -> bool;
    fn kind(&self) -> PlayableKind;
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromRow)]
pub struct Song {
    #[serde(skip_serializing, default)]
    pub pk: i64,
    pub id: String,
    pub title: String,
    pub alphabetic_section_initial: String,
    pub artwork_pk: Option<i64>,
    pub remote_status: RemoteStatus,
    pub is_favorite: bool,
    pub duration: i64,
    pub remote_duration: i64,
    pub track: i32,
    pub disk: Option<String>,
    pub year: i32,
    pub content_type: Option<String>,
    pub bitrate: i64,
    pub size: i64,
    pub album_pk: Option<i64>,
    pub artist_pk: Option<i64>,
    pub genre_pk: Option<i64>,
    pub directory_pk: Option<i64>,
    pub sync_wave_pk: Option<i64>,
    /// Computed from the presence of a song file row
    #[serde(skip_serializing, default)]
    pub is_cached: bool,
}

impl Song {
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.alphabetic_section_initial = section_initial(&self.title);
    }
}

impl PlayableEntity for Song {
    fn playable_pk(&self) -> i64 {
        self.pk
    }

    fn remote_id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn duration(&self) -> i64 {
        self.duration
    }

    fn is_cached(&self) -> bool {
        self.is_cached
    }

    fn kind(&self) -> PlayableKind {
        PlayableKind::Song
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromRow)]
pub struct PodcastEpisode {
    #[serde(skip_serializing, default)]
    pub pk: i64,
    pub id: String,
    pub title: String,
    pub alphabetic_section_initial: String,
    pub artwork_pk: Option<i64>,
    pub remote_status: RemoteStatus,
    pub duration: i64,
    pub remote_duration: i64,
    pub content_type: Option<String>,
    pub bitrate: i64,
    pub size: i64,
    pub podcast_pk: Option<i64>,
    /// Unix seconds
    pub publish_date: i64,
    pub description: String,
    pub user_status: EpisodeUserStatus,
    #[serde(skip_serializing, default)]
    pub is_cached: bool,
}

impl PodcastEpisode {
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.alphabetic_section_initial = section_initial(&self.title);
    }

    /// Episodes are only playable once the server has finished fetching them.
    pub fn is_available_to_user(&self) -> bool {
        self.user_status == EpisodeUserStatus::Available
            && self.remote_status == RemoteStatus::Available
    }
}

impl PlayableEntity for PodcastEpisode {
    fn playable_pk(&self) -> i64 {
        self.pk
    }

    fn remote_id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn duration(&self) -> i64 {
        self.duration
    }

    fn is_cached(&self) -> bool {
        self.is_cached
    }

    fn kind(&self) -> PlayableKind {
        PlayableKind::Episode
    }
}

/// A row of `playable_view`, decoded by its `kind` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Playable {
    Song(Song),
    Episode(PodcastEpisode),
}

impl Playable {
    fn inner(&self) -> &dyn PlayableEntity {
        match self {
            Playable::Song(song) => song,
            Playable::Episode(episode) => episode,
        }
    }
}

impl PlayableEntity for Playable {
    fn playable_pk(&self) -> i64 {
        self.inner().playable_pk()
    }

    fn remote_id(&self) -> &str {
        self.inner().remote_id()
    }

    fn title(&self) -> &str {
        self.inner().title()
    }

    fn duration(&self) -> i64 {
        self.inner().duration()
    }

    fn is_cached(&self) -> bool {
        self.inner().is_cached()
    }

    fn kind(&self) -> PlayableKind {
        self.inner().kind()
    }
}

impl<'r> FromRow<'r, SqliteRow> for Playable {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        let kind: PlayableKind = row.try_get("kind")?;
        match kind {
            PlayableKind::Song => Ok(Playable::Song(Song::from_row(row)?)),
            PlayableKind::Episode => Ok(Playable::Episode(PodcastEpisode::from_row(row)?)),
        }
    }
}

impl From<Song> for Playable {
    fn from(song: Song) -> Self {
        Playable::Song(song)
    }
}

impl From<PodcastEpisode> for Playable {
    fn from(episode: PodcastEpisode) -> Self {
        Playable::Episode(episode)
    }
}

/// Cached file payload of a playable.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SongFile {
    pub pk: i64,
    pub playable_pk: i64,
    pub data: Vec<u8>,
    pub size: i64,
    pub created_at: i64,
}

// =============================================================================
// Playlists and player
// =============================================================================

/// Id prefix of the player queue playlists.
pub const SYSTEM_PLAYLIST_PREFIX: &str = "__player_";
pub const NORMAL_PLAYLIST_ID: &str = "__player_normal";
pub const SHUFFLED_PLAYLIST_ID: &str = "__player_shuffled";
/// Id prefix of server-generated playlists.
pub const SMART_PLAYLIST_PREFIX: &str = "smart_";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromRow)]
pub struct Playlist {
    #[serde(skip_serializing, default)]
    pub pk: i64,
    pub id: String,
    pub name: String,
    pub alphabetic_section_initial: String,
    pub artwork_pk: Option<i64>,
    pub remote_status: RemoteStatus,
    pub remote_song_count: i64,
    /// Unix seconds of the last server-side change
    pub changed_at: i64,
}

impl Playlist {
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.alphabetic_section_initial = section_initial(&self.name);
    }

    pub fn is_system(&self) -> bool {
        self.id.starts_with(SYSTEM_PLAYLIST_PREFIX)
    }

    pub fn is_smart(&self) -> bool {
        self.id.starts_with(SMART_PLAYLIST_PREFIX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct PlaylistItem {
    pub pk: i64,
    pub playlist_pk: i64,
    pub playable_pk: i64,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromRow)]
pub struct PlayerData {
    #[serde(skip_serializing, default)]
    pub pk: i64,
    pub normal_playlist_pk: Option<i64>,
    pub shuffled_playlist_pk: Option<i64>,
    pub current_index: i64,
    pub is_shuffle: bool,
    pub repeat_mode: RepeatMode,
}

/// Player data together with both queue playlists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerQueue {
    pub data: PlayerData,
    pub normal_playlist: Playlist,
    pub shuffled_playlist: Playlist,
}

impl PlayerQueue {
    pub fn active_playlist(&self) -> &Playlist {
        if self.data.is_shuffle {
            &self.shuffled_playlist
        } else {
            &self.normal_playlist
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaylistSearchCategory {
    #[default]
    All,
    UserOnly,
    SmartOnly,
}

// =============================================================================
// Artwork
// =============================================================================

/// Remote identity of an artwork.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ArtworkRemoteInfo {
    pub id: String,
    pub remote_type: String,
}

impl ArtworkRemoteInfo {
    pub fn new(id: impl Into<String>, remote_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            remote_type: remote_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromRow)]
pub struct Artwork {
    #[serde(skip_serializing, default)]
    pub pk: i64,
    pub remote_type: String,
    pub remote_id: String,
    pub url: String,
    pub status: ImageStatus,
}

impl Artwork {
    pub fn remote_info(&self) -> ArtworkRemoteInfo {
        ArtworkRemoteInfo::new(self.remote_id.clone(), self.remote_type.clone())
    }

    pub fn set_remote_info(&mut self, info: &ArtworkRemoteInfo) {
        self.remote_id = info.id.clone();
        self.remote_type = info.remote_type.clone();
    }
}

// =============================================================================
// Bookkeeping
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromRow)]
pub struct SyncWave {
    #[serde(skip_serializing, default)]
    pub pk: i64,
    /// Zero-based wave number, derived from the row key
    #[serde(skip_serializing, default)]
    pub id: i64,
    pub is_done: bool,
    pub created_at: i64,
    /// Raw library sync version that produced this wave
    pub library_version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromRow)]
pub struct LogEntry {
    #[serde(skip_serializing, default)]
    pub pk: i64,
    pub topic: String,
    pub status_code: i32,
    pub message: String,
    pub entry_type: LogEntryType,
    pub created_at: i64,
}

/// Usage counters collected for one app version.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromRow)]
pub struct UserStatistics {
    #[serde(skip_serializing, default)]
    pub pk: i64,
    pub app_version: String,
    pub created_at: i64,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum StatisticCategory {
    /// A screen the user opened
    #[default]
    Visited,
    /// A feature the user triggered
    Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserStatisticCount {
    pub category: StatisticCategory,
    pub name: String,
    pub uses: i64,
}

/// Aggregate counts shown on the library settings screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LibraryInfo {
    pub artist_count: i64,
    pub album_count: i64,
    pub song_count: i64,
    pub genre_count: i64,
    pub playlist_count: i64,
    pub podcast_count: i64,
    pub podcast_episode_count: i64,
    pub cached_song_count: i64,
    pub sync_wave_count: i64,
    pub artwork_count: i64,
    pub music_folder_count: i64,
    pub directory_count: i64,
    pub cached_bytes: i64,
}
