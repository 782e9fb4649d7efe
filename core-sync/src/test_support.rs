//! Shared fixtures for unit tests.

use crate::api::{
    BackendKind, CatalogApi, FavoriteKind, PageRequest, RemoteAlbum, RemoteArtist,
    RemoteDirectory, RemoteDirectoryContent, RemoteEpisode, RemoteFavorites, RemoteGenre,
    RemoteMusicFolder, RemotePlaylist, RemotePodcast, RemoteSong, ResponseError,
};
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use bridge_desktop::SqliteSettingsStore;
use core_async::time::{sleep, Duration};
use core_library::db::create_test_pool;
use core_library::LibraryStorage;
use core_runtime::LibrarySettings;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

pub async fn library() -> (SqlitePool, LibraryStorage) {
    let pool = create_test_pool().await.unwrap();
    let storage = LibraryStorage::new(pool.clone());
    (pool, storage)
}

pub async fn settings() -> Arc<LibrarySettings> {
    let store = SqliteSettingsStore::in_memory().await.unwrap();
    Arc::new(LibrarySettings::load(Arc::new(store)).await.unwrap())
}

pub fn remote_song(id: &str) -> RemoteSong {
    RemoteSong {
        id: id.to_string(),
        title: format!("Song {id}"),
        artist_id: Some(format!("ar-{id}")),
        artist_name: Some(format!("Artist {id}")),
        duration: 200,
        size: 4_000_000,
        ..Default::default()
    }
}

/// Server state served by [`FakeCatalogApi`].
#[derive(Default)]
pub struct FakeCatalog {
    pub genres: Vec<RemoteGenre>,
    pub artist_list: Vec<RemoteArtist>,
    pub album_list: Vec<RemoteAlbum>,
    pub song_list: Vec<RemoteSong>,
    pub artists: HashMap<String, (RemoteArtist, Vec<RemoteAlbum>)>,
    pub albums: HashMap<String, (RemoteAlbum, Vec<RemoteSong>)>,
    pub genre_songs: HashMap<String, Vec<RemoteSong>>,
    pub latest_songs: Vec<RemoteSong>,
    pub playlists: Vec<RemotePlaylist>,
    pub playlist_songs: HashMap<String, Vec<RemoteSong>>,
    pub podcasts: Vec<RemotePodcast>,
    pub episodes: HashMap<String, Vec<RemoteEpisode>>,
    pub favorites: RemoteFavorites,
    pub music_folders: Vec<RemoteMusicFolder>,
    pub folder_directories: HashMap<String, Vec<RemoteDirectory>>,
    pub directories: HashMap<String, RemoteDirectoryContent>,
    pub artwork: HashMap<String, Vec<u8>>,
    /// Artwork URLs whose download fails
    pub broken_artwork: HashSet<String>,
}

/// In-memory catalog recording every call it serves.
pub struct FakeCatalogApi {
    backend: BackendKind,
    catalog: Mutex<FakeCatalog>,
    calls: Mutex<Vec<String>>,
    failure: Mutex<Option<ResponseError>>,
    latency: Mutex<Duration>,
}

impl Default for FakeCatalogApi {
    fn default() -> Self {
        Self::new(BackendKind::Ampache)
    }
}

impl FakeCatalogApi {
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            catalog: Mutex::new(FakeCatalog::default()),
            calls: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            latency: Mutex::new(Duration::ZERO),
        }
    }

    pub fn catalog(&self) -> MutexGuard<'_, FakeCatalog> {
        self.catalog.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Fail every following call with an API error.
    pub fn fail_with(&self, status_code: i32, message: &str) {
        *self.failure.lock().unwrap() = Some(ResponseError::new(status_code, message));
    }

    /// Delay every following call.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    async fn serve(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            sleep(latency).await;
        }
        match self.failure.lock().unwrap().clone() {
            Some(error) => Err(SyncError::Api(error)),
            None => Ok(()),
        }
    }
}

fn page<T: Clone>(items: &[T], page: PageRequest) -> Vec<T> {
    items.iter().skip(page.offset).take(page.limit).cloned().collect()
}

fn not_found(entity_type: &str, id: &str) -> SyncError {
    SyncError::NotFound {
        entity_type: entity_type.to_string(),
        id: id.to_string(),
    }
}

#[async_trait]
impl CatalogApi for FakeCatalogApi {
    fn backend(&self) -> BackendKind {
        self.backend
    }

    async fn fetch_genres(&self) -> Result<Vec<RemoteGenre>> {
        self.serve("fetch_genres".to_string()).await?;
        Ok(self.catalog().genres.clone())
    }

    async fn fetch_artists(&self, request: PageRequest) -> Result<Vec<RemoteArtist>> {
        self.serve(format!("fetch_artists:{}", request.offset)).await?;
        Ok(page(&self.catalog().artist_list, request))
    }

    async fn fetch_albums(&self, request: PageRequest) -> Result<Vec<RemoteAlbum>> {
        self.serve(format!("fetch_albums:{}", request.offset)).await?;
        Ok(page(&self.catalog().album_list, request))
    }

    async fn fetch_songs(&self, request: PageRequest) -> Result<Vec<RemoteSong>> {
        self.serve(format!("fetch_songs:{}", request.offset)).await?;
        Ok(page(&self.catalog().song_list, request))
    }

    async fn fetch_artist(&self, artist_id: &str) -> Result<(RemoteArtist, Vec<RemoteAlbum>)> {
        self.serve(format!("fetch_artist:{artist_id}")).await?;
        self.catalog()
            .artists
            .get(artist_id)
            .cloned()
            .ok_or_else(|| not_found("Artist", artist_id))
    }

    async fn fetch_album(&self, album_id: &str) -> Result<(RemoteAlbum, Vec<RemoteSong>)> {
        self.serve(format!("fetch_album:{album_id}")).await?;
        self.catalog()
            .albums
            .get(album_id)
            .cloned()
            .ok_or_else(|| not_found("Album", album_id))
    }

    async fn fetch_genre_songs(&self, genre: &RemoteGenre) -> Result<Vec<RemoteSong>> {
        self.serve(format!("fetch_genre_songs:{}", genre.name)).await?;
        Ok(self
            .catalog()
            .genre_songs
            .get(&genre.name)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_song(&self, song_id: &str) -> Result<RemoteSong> {
        self.serve(format!("fetch_song:{song_id}")).await?;
        let catalog = self.catalog();
        catalog
            .song_list
            .iter()
            .chain(&catalog.latest_songs)
            .find(|song| song.id == song_id)
            .cloned()
            .ok_or_else(|| not_found("Song", song_id))
    }

    async fn fetch_latest_songs(&self) -> Result<Vec<RemoteSong>> {
        self.serve("fetch_latest_songs".to_string()).await?;
        Ok(self.catalog().latest_songs.clone())
    }

    async fn search_songs(&self, text: &str) -> Result<Vec<RemoteSong>> {
        self.serve(format!("search_songs:{text}")).await?;
        let catalog = self.catalog();
        Ok(catalog
            .song_list
            .iter()
            .chain(&catalog.latest_songs)
            .filter(|song| song.title.contains(text))
            .cloned()
            .collect())
    }

    async fn fetch_playlists(&self) -> Result<Vec<RemotePlaylist>> {
        self.serve("fetch_playlists".to_string()).await?;
        Ok(self.catalog().playlists.clone())
    }

    async fn fetch_playlist_songs(&self, playlist_id: &str) -> Result<Vec<RemoteSong>> {
        self.serve(format!("fetch_playlist_songs:{playlist_id}")).await?;
        Ok(self
            .catalog()
            .playlist_songs
            .get(playlist_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_playlist(&self, playlist_id: &str) -> Result<()> {
        self.serve(format!("delete_playlist:{playlist_id}")).await
    }

    async fn fetch_podcasts(&self) -> Result<Vec<RemotePodcast>> {
        self.serve("fetch_podcasts".to_string()).await?;
        Ok(self.catalog().podcasts.clone())
    }

    async fn fetch_podcast_episodes(&self, podcast_id: &str) -> Result<Vec<RemoteEpisode>> {
        self.serve(format!("fetch_podcast_episodes:{podcast_id}")).await?;
        Ok(self
            .catalog()
            .episodes
            .get(podcast_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_favorites(&self) -> Result<RemoteFavorites> {
        self.serve("fetch_favorites".to_string()).await?;
        Ok(self.catalog().favorites.clone())
    }

    async fn set_favorite(&self, _kind: FavoriteKind, id: &str, favorite: bool) -> Result<()> {
        self.serve(format!("set_favorite:{id}:{favorite}")).await
    }

    async fn fetch_music_folders(&self) -> Result<Vec<RemoteMusicFolder>> {
        self.serve("fetch_music_folders".to_string()).await?;
        Ok(self.catalog().music_folders.clone())
    }

    async fn fetch_music_folder_directories(&self, folder_id: &str) -> Result<Vec<RemoteDirectory>> {
        self.serve(format!("fetch_music_folder_directories:{folder_id}")).await?;
        Ok(self
            .catalog()
            .folder_directories
            .get(folder_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_directory(&self, directory_id: &str) -> Result<RemoteDirectoryContent> {
        self.serve(format!("fetch_directory:{directory_id}")).await?;
        Ok(self
            .catalog()
            .directories
            .get(directory_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_artwork(&self, url: &str) -> Result<Option<Vec<u8>>> {
        self.serve(format!("fetch_artwork:{url}")).await?;
        let catalog = self.catalog();
        if catalog.broken_artwork.contains(url) {
            return Err(SyncError::Transport(format!("connection reset: {url}")));
        }
        Ok(catalog.artwork.get(url).cloned())
    }
}
