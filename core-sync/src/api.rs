//! # Remote Catalog Interface
//!
//! The HTTP clients for Ampache and Subsonic servers live outside this crate.
//! They implement [`CatalogApi`] and hand back plain payload structs, which
//! the sync engine maps onto the library store.

use crate::error::Result;
use async_trait::async_trait;
use core_library::ArtworkRemoteInfo;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Server API flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    Ampache,
    Subsonic,
}

impl BackendKind {
    pub fn artwork_url_parser(self) -> Arc<dyn ArtworkUrlParser> {
        match self {
            BackendKind::Ampache => Arc::new(AmpacheArtworkUrlParser),
            BackendKind::Subsonic => Arc::new(SubsonicArtworkUrlParser),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Ampache => write!(f, "Ampache"),
            BackendKind::Subsonic => write!(f, "Subsonic"),
        }
    }
}

/// Error envelope returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    pub status_code: i32,
    pub message: String,
}

impl ResponseError {
    pub fn new(status_code: i32, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API Error {}: {}", self.status_code, self.message)
    }
}

impl std::error::Error for ResponseError {}

// =============================================================================
// Artwork URL parsing
// =============================================================================

/// Derives the remote identity of an artwork from its URL.
pub trait ArtworkUrlParser: Send + Sync {
    /// `None` when the URL does not identify an artwork.
    fn extract_artwork_info(&self, url: &str) -> Option<ArtworkRemoteInfo>;
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// `image.php?object_id=<id>&object_type=<type>`
#[derive(Debug, Default, Clone, Copy)]
pub struct AmpacheArtworkUrlParser;

impl ArtworkUrlParser for AmpacheArtworkUrlParser {
    fn extract_artwork_info(&self, url: &str) -> Option<ArtworkRemoteInfo> {
        let url = Url::parse(url).ok()?;
        let id = query_value(&url, "object_id")?;
        let kind = query_value(&url, "object_type")?;
        Some(ArtworkRemoteInfo::new(id, kind))
    }
}

/// `getCoverArt.view?id=<id>`; cover art ids carry no type.
#[derive(Debug, Default, Clone, Copy)]
pub struct SubsonicArtworkUrlParser;

impl ArtworkUrlParser for SubsonicArtworkUrlParser {
    fn extract_artwork_info(&self, url: &str) -> Option<ArtworkRemoteInfo> {
        let url = Url::parse(url).ok()?;
        let id = query_value(&url, "id")?;
        Some(ArtworkRemoteInfo::new(id, ""))
    }
}

// =============================================================================
// Payloads
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteGenre {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteArtist {
    pub id: String,
    pub name: String,
    pub artwork_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteAlbum {
    pub id: String,
    pub name: String,
    pub artist_id: Option<String>,
    pub artist_name: Option<String>,
    pub genre: Option<RemoteGenre>,
    pub year: i32,
    pub song_count: i64,
    pub artwork_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteSong {
    pub id: String,
    pub title: String,
    pub artist_id: Option<String>,
    pub artist_name: Option<String>,
    pub album_id: Option<String>,
    pub album_name: Option<String>,
    pub genre: Option<RemoteGenre>,
    pub directory_id: Option<String>,
    pub track: i32,
    pub disk: Option<String>,
    pub year: i32,
    /// Seconds
    pub duration: i64,
    pub content_type: Option<String>,
    pub bitrate: i64,
    /// Bytes
    pub size: i64,
    pub artwork_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemotePlaylist {
    pub id: String,
    pub name: String,
    pub song_count: i64,
    /// Unix seconds
    pub changed_at: i64,
    pub artwork_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemotePodcast {
    pub id: String,
    pub title: String,
    pub description: String,
    pub artwork_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteEpisode {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Unix seconds
    pub publish_date: i64,
    pub duration: i64,
    pub content_type: Option<String>,
    pub bitrate: i64,
    pub size: i64,
    /// False while the server is still downloading the episode
    pub is_available: bool,
    pub artwork_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteMusicFolder {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteDirectory {
    pub id: String,
    pub name: String,
    pub artwork_url: Option<String>,
}

/// Children of one directory.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteDirectoryContent {
    pub directories: Vec<RemoteDirectory>,
    pub songs: Vec<RemoteSong>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoteFavorites {
    pub artist_ids: Vec<String>,
    pub album_ids: Vec<String>,
    pub song_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FavoriteKind {
    Artist,
    Album,
    Song,
}

/// Offset/limit window of a paged listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self { offset: 0, limit }
    }

    pub fn next(self) -> Self {
        Self {
            offset: self.offset + self.limit,
            limit: self.limit,
        }
    }
}

// =============================================================================
// Transport
// =============================================================================

/// Remote media server catalog.
///
/// Every method performs network I/O and must never be called while a
/// library context holds a pending transaction.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    fn backend(&self) -> BackendKind;

    async fn fetch_genres(&self) -> Result<Vec<RemoteGenre>>;
    async fn fetch_artists(&self, page: PageRequest) -> Result<Vec<RemoteArtist>>;
    async fn fetch_albums(&self, page: PageRequest) -> Result<Vec<RemoteAlbum>>;
    async fn fetch_songs(&self, page: PageRequest) -> Result<Vec<RemoteSong>>;

    async fn fetch_artist(&self, artist_id: &str) -> Result<(RemoteArtist, Vec<RemoteAlbum>)>;
    async fn fetch_album(&self, album_id: &str) -> Result<(RemoteAlbum, Vec<RemoteSong>)>;
    async fn fetch_genre_songs(&self, genre: &RemoteGenre) -> Result<Vec<RemoteSong>>;
    async fn fetch_song(&self, song_id: &str) -> Result<RemoteSong>;
    /// Songs most recently added on the server
    async fn fetch_latest_songs(&self) -> Result<Vec<RemoteSong>>;
    async fn search_songs(&self, text: &str) -> Result<Vec<RemoteSong>>;

    async fn fetch_playlists(&self) -> Result<Vec<RemotePlaylist>>;
    async fn fetch_playlist_songs(&self, playlist_id: &str) -> Result<Vec<RemoteSong>>;
    async fn delete_playlist(&self, playlist_id: &str) -> Result<()>;

    async fn fetch_podcasts(&self) -> Result<Vec<RemotePodcast>>;
    async fn fetch_podcast_episodes(&self, podcast_id: &str) -> Result<Vec<RemoteEpisode>>;

    async fn fetch_favorites(&self) -> Result<RemoteFavorites>;
    async fn set_favorite(&self, kind: FavoriteKind, id: &str, favorite: bool) -> Result<()>;

    async fn fetch_music_folders(&self) -> Result<Vec<RemoteMusicFolder>>;
    async fn fetch_music_folder_directories(&self, folder_id: &str) -> Result<Vec<RemoteDirectory>>;
    async fn fetch_directory(&self, directory_id: &str) -> Result<RemoteDirectoryContent>;

    /// Image bytes behind an artwork URL, `None` when the server has none.
    async fn fetch_artwork(&self, url: &str) -> Result<Option<Vec<u8>>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ampache_artwork_url() {
        let parser = AmpacheArtworkUrlParser;
        let info = parser
            .extract_artwork_info(
                "https://music.example.org/image.php?object_id=345&object_type=album&auth=abc&name=art.jpg",
            )
            .unwrap();
        assert_eq!(info, ArtworkRemoteInfo::new("345", "album"));

        assert!(parser
            .extract_artwork_info("https://music.example.org/image.php?object_type=album")
            .is_none());
        assert!(parser.extract_artwork_info("not a url").is_none());
    }

    #[test]
    fn test_subsonic_artwork_url() {
        let parser = SubsonicArtworkUrlParser;
        let info = parser
            .extract_artwork_info(
                "https://music.example.org/rest/getCoverArt.view?id=al-77&u=bob&t=abc&s=xyz&v=1.16.1&c=app",
            )
            .unwrap();
        assert_eq!(info, ArtworkRemoteInfo::new("al-77", ""));

        assert!(parser
            .extract_artwork_info("https://music.example.org/rest/getCoverArt.view?id=")
            .is_none());
    }

    #[test]
    fn test_backend_selects_parser() {
        let parser = BackendKind::Ampache.artwork_url_parser();
        assert!(parser
            .extract_artwork_info("https://a.example/image.php?object_id=1&object_type=artist")
            .is_some());
        assert_eq!(BackendKind::Subsonic.to_string(), "Subsonic");
    }

    #[test]
    fn test_page_request_advances() {
        let page = PageRequest::first(50).next().next();
        assert_eq!(page, PageRequest { offset: 100, limit: 50 });
    }
}
