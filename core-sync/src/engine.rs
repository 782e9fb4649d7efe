//! # Remote Sync Engine
//!
//! Pulls catalog elements from the media server and reconciles them into the
//! library store.
//!
//! ## Workflow
//!
//! Every operation follows the same three steps:
//! 1. Fetch everything it needs from the server, with no context open
//! 2. Open a fresh [`LibraryStorage`] context and map the payloads
//! 3. Commit with `save_context`
//!
//! A remote or parse failure in step 1 returns before the store is touched.
//! A failure in step 2 drops the context, rolling back everything it wrote.

use crate::api::{
    ArtworkUrlParser, CatalogApi, FavoriteKind, RemoteDirectory, RemoteGenre, RemoteSong,
};
use crate::error::{Result, SyncError};
use crate::mapping::CatalogMapper;
use async_trait::async_trait;
use core_library::{
    Album, Artist, Directory, Genre, LibraryStorage, MusicFolder, Playlist,
    PlaylistSearchCategory, Podcast, PodcastEpisode, RemoteStatus, Song,
};
use core_runtime::LibrarySettings;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Catalog operations the rest of the engine and the UI call on demand.
#[async_trait]
pub trait LibrarySyncer: Send + Sync {
    /// Playlist metadata only. Local playlists that vanished remotely are
    /// deleted; playlists never uploaded are kept.
    async fn sync_down_playlists_without_songs(&self) -> Result<()>;

    /// Podcast metadata only. Podcasts that vanished remotely are marked
    /// deleted.
    async fn sync_down_podcasts_without_episodes(&self) -> Result<()>;

    async fn sync_favorite_library_elements(&self) -> Result<()>;

    async fn search_songs(&self, text: &str) -> Result<Vec<Song>>;

    async fn sync_upload_playlist_deletion(&self, playlist_id: &str) -> Result<()>;

    async fn sync_song(&self, song: &Song) -> Result<Song>;

    /// Playlist metadata together with its songs.
    async fn sync_playlist(&self, playlist: &Playlist) -> Result<Playlist>;

    async fn sync_album(&self, album: &Album) -> Result<Album>;

    async fn sync_artist(&self, artist: &Artist) -> Result<Artist>;

    async fn sync_genre(&self, genre: &Genre) -> Result<Genre>;

    /// Pull the songs most recently added on the server into a new sync
    /// wave. Returns the songs that were not in the library before.
    async fn sync_latest_library_elements(&self) -> Result<Vec<Song>>;

    /// Returns the episodes that were not in the library before.
    async fn sync_latest_podcast_episodes(&self, podcast: &Podcast)
        -> Result<Vec<PodcastEpisode>>;

    async fn set_favorite(&self, kind: FavoriteKind, id: &str, favorite: bool) -> Result<()>;

    /// Music folders together with their top-level directories.
    async fn sync_music_folders(&self) -> Result<Vec<MusicFolder>>;

    /// Direct children of a directory.
    async fn sync_directory(&self, directory: &Directory) -> Result<Directory>;
}

/// [`LibrarySyncer`] backed by a [`CatalogApi`].
pub struct CatalogLibrarySyncer {
    api: Arc<dyn CatalogApi>,
    pool: SqlitePool,
    parser: Arc<dyn ArtworkUrlParser>,
    settings: Arc<LibrarySettings>,
}

impl CatalogLibrarySyncer {
    /// The artwork URL parser is chosen from the API's backend.
    pub fn new(api: Arc<dyn CatalogApi>, pool: SqlitePool, settings: Arc<LibrarySettings>) -> Self {
        let parser = api.backend().artwork_url_parser();
        Self {
            api,
            pool,
            parser,
            settings,
        }
    }

    pub fn api(&self) -> &Arc<dyn CatalogApi> {
        &self.api
    }

    pub fn parser(&self) -> &Arc<dyn ArtworkUrlParser> {
        &self.parser
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn context(&self) -> LibraryStorage {
        LibraryStorage::new(self.pool.clone())
    }

    async fn map_songs(&self, remote: &[RemoteSong]) -> Result<Vec<Song>> {
        let mut library = self.context();
        let mut mapper = CatalogMapper::new(&mut library, self.parser.as_ref());
        let mut songs = Vec::with_capacity(remote.len());
        for song in remote {
            songs.push(mapper.song(song, None).await?.0);
        }
        library.save_context().await?;
        Ok(songs)
    }
}

fn require_remote_id(entity_type: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(SyncError::NotFound {
            entity_type: entity_type.to_string(),
            id: String::new(),
        });
    }
    Ok(())
}

#[async_trait]
impl LibrarySyncer for CatalogLibrarySyncer {
    #[instrument(skip(self))]
    async fn sync_down_playlists_without_songs(&self) -> Result<()> {
        let remote = self.api.fetch_playlists().await?;

        let mut library = self.context();
        let mut mapper = CatalogMapper::new(&mut library, self.parser.as_ref());
        for playlist in &remote {
            mapper.playlist(playlist).await?;
        }

        let remote_ids: HashSet<&str> = remote.iter().map(|p| p.id.as_str()).collect();
        let mut deleted = 0;
        for playlist in library.get_playlists_by(PlaylistSearchCategory::All).await {
            if !playlist.id.is_empty() && !remote_ids.contains(playlist.id.as_str()) {
                library.delete_playlist(&playlist).await?;
                deleted += 1;
            }
        }
        library.save_context().await?;

        info!(synced = remote.len(), deleted, "Playlists synced");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn sync_down_podcasts_without_episodes(&self) -> Result<()> {
        let remote = self.api.fetch_podcasts().await?;

        let mut library = self.context();
        let mut mapper = CatalogMapper::new(&mut library, self.parser.as_ref());
        for podcast in &remote {
            mapper.podcast(podcast).await?;
        }

        let remote_ids: HashSet<&str> = remote.iter().map(|p| p.id.as_str()).collect();
        for mut podcast in library.list::<Podcast>().await {
            if !remote_ids.contains(podcast.id.as_str())
                && podcast.remote_status != RemoteStatus::Deleted
            {
                podcast.remote_status = RemoteStatus::Deleted;
                library.update(&podcast).await?;
            }
        }
        library.save_context().await?;

        info!(synced = remote.len(), "Podcasts synced");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn sync_favorite_library_elements(&self) -> Result<()> {
        let favorites = self.api.fetch_favorites().await?;
        let artist_ids: HashSet<&str> = favorites.artist_ids.iter().map(String::as_str).collect();
        let album_ids: HashSet<&str> = favorites.album_ids.iter().map(String::as_str).collect();
        let song_ids: HashSet<&str> = favorites.song_ids.iter().map(String::as_str).collect();

        let mut library = self.context();
        for mut artist in library.list::<Artist>().await {
            let favorite = artist_ids.contains(artist.id.as_str());
            if artist.is_favorite != favorite {
                artist.is_favorite = favorite;
                library.update(&artist).await?;
            }
        }
        for mut album in library.list::<Album>().await {
            let favorite = album_ids.contains(album.id.as_str());
            if album.is_favorite != favorite {
                album.is_favorite = favorite;
                library.update(&album).await?;
            }
        }
        for mut song in library.list::<Song>().await {
            let favorite = song_ids.contains(song.id.as_str());
            if song.is_favorite != favorite {
                song.is_favorite = favorite;
                library.update(&song).await?;
            }
        }
        library.save_context().await?;

        info!(
            artists = artist_ids.len(),
            albums = album_ids.len(),
            songs = song_ids.len(),
            "Favorites synced"
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn search_songs(&self, text: &str) -> Result<Vec<Song>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let remote = self.api.search_songs(text).await?;
        self.map_songs(&remote).await
    }

    #[instrument(skip(self))]
    async fn sync_upload_playlist_deletion(&self, playlist_id: &str) -> Result<()> {
        require_remote_id("Playlist", playlist_id)?;
        self.api.delete_playlist(playlist_id).await
    }

    #[instrument(skip(self, song), fields(song_id = %song.id))]
    async fn sync_song(&self, song: &Song) -> Result<Song> {
        require_remote_id("Song", &song.id)?;
        let remote = self.api.fetch_song(&song.id).await?;
        let mut songs = self.map_songs(std::slice::from_ref(&remote)).await?;
        songs.pop().ok_or_else(|| SyncError::NotFound {
            entity_type: "Song".to_string(),
            id: song.id.clone(),
        })
    }

    #[instrument(skip(self, playlist), fields(playlist_id = %playlist.id))]
    async fn sync_playlist(&self, playlist: &Playlist) -> Result<Playlist> {
        require_remote_id("Playlist", &playlist.id)?;
        let remote = self.api.fetch_playlist_songs(&playlist.id).await?;

        let mut library = self.context();
        let mut mapper = CatalogMapper::new(&mut library, self.parser.as_ref());
        let mut playable_pks = Vec::with_capacity(remote.len());
        for song in &remote {
            playable_pks.push(mapper.song(song, None).await?.0.pk);
        }

        let mut playlist: Playlist =
            library
                .get_by_pk(playlist.pk)
                .await
                .ok_or_else(|| SyncError::NotFound {
                    entity_type: "Playlist".to_string(),
                    id: playlist.id.clone(),
                })?;
        library.clear_playlist(&playlist).await?;
        library.append_to_playlist(&playlist, &playable_pks).await?;
        playlist.remote_song_count = playable_pks.len() as i64;
        library.update(&playlist).await?;
        library.save_context().await?;

        debug!(songs = playable_pks.len(), "Playlist synced");
        Ok(playlist)
    }

    #[instrument(skip(self, album), fields(album_id = %album.id))]
    async fn sync_album(&self, album: &Album) -> Result<Album> {
        require_remote_id("Album", &album.id)?;
        let (remote_album, remote_songs) = self.api.fetch_album(&album.id).await?;

        let mut library = self.context();
        let mut mapper = CatalogMapper::new(&mut library, self.parser.as_ref());
        let album = mapper.album(&remote_album).await?;
        for song in &remote_songs {
            mapper.song(song, None).await?;
        }

        let remote_ids: HashSet<&str> = remote_songs.iter().map(|s| s.id.as_str()).collect();
        for mut song in library.songs_of_album(&album).await {
            if !remote_ids.contains(song.id.as_str()) && song.remote_status != RemoteStatus::Deleted {
                song.remote_status = RemoteStatus::Deleted;
                library.update(&song).await?;
            }
        }
        library.save_context().await?;

        debug!(songs = remote_songs.len(), "Album synced");
        Ok(album)
    }

    #[instrument(skip(self, artist), fields(artist_id = %artist.id))]
    async fn sync_artist(&self, artist: &Artist) -> Result<Artist> {
        require_remote_id("Artist", &artist.id)?;
        let (remote_artist, remote_albums) = self.api.fetch_artist(&artist.id).await?;

        let mut library = self.context();
        let mut mapper = CatalogMapper::new(&mut library, self.parser.as_ref());
        let artist = mapper.artist(&remote_artist).await?;
        for album in &remote_albums {
            mapper.album(album).await?;
        }
        library.save_context().await?;

        debug!(albums = remote_albums.len(), "Artist synced");
        Ok(artist)
    }

    #[instrument(skip(self, genre), fields(genre = %genre.name))]
    async fn sync_genre(&self, genre: &Genre) -> Result<Genre> {
        let remote_genre = RemoteGenre {
            id: genre.id.clone(),
            name: genre.name.clone(),
        };
        let remote_songs = self.api.fetch_genre_songs(&remote_genre).await?;

        let mut library = self.context();
        let mut mapper = CatalogMapper::new(&mut library, self.parser.as_ref());
        let genre = mapper.genre(&remote_genre).await?;
        for song in &remote_songs {
            mapper.song(song, None).await?;
        }
        library.save_context().await?;

        debug!(songs = remote_songs.len(), "Genre synced");
        Ok(genre)
    }

    #[instrument(skip(self))]
    async fn sync_latest_library_elements(&self) -> Result<Vec<Song>> {
        let remote = self.api.fetch_latest_songs().await?;

        let mut library = self.context();
        let mut wave = library
            .create_sync_wave(self.settings.library_sync_version().raw())
            .await?;
        let mut mapper = CatalogMapper::new(&mut library, self.parser.as_ref());
        let mut added = Vec::new();
        for song in &remote {
            let (song, created) = mapper.song(song, Some(wave.pk)).await?;
            if created {
                added.push(song);
            }
        }
        wave.is_done = true;
        library.update(&wave).await?;
        library.save_context().await?;

        info!(
            wave = wave.id,
            fetched = remote.len(),
            added = added.len(),
            "Latest library elements synced"
        );
        Ok(added)
    }

    #[instrument(skip(self, podcast), fields(podcast_id = %podcast.id))]
    async fn sync_latest_podcast_episodes(
        &self,
        podcast: &Podcast,
    ) -> Result<Vec<PodcastEpisode>> {
        require_remote_id("Podcast", &podcast.id)?;
        let remote = self.api.fetch_podcast_episodes(&podcast.id).await?;

        let mut library = self.context();
        let mut mapper = CatalogMapper::new(&mut library, self.parser.as_ref());
        let mut added = Vec::new();
        for episode in &remote {
            let (episode, created) = mapper.episode(podcast, episode).await?;
            if created {
                added.push(episode);
            }
        }

        let remote_ids: HashSet<&str> = remote.iter().map(|e| e.id.as_str()).collect();
        for mut episode in library.podcast_episodes(podcast).await {
            if !remote_ids.contains(episode.id.as_str())
                && episode.remote_status != RemoteStatus::Deleted
            {
                episode.remote_status = RemoteStatus::Deleted;
                library.update(&episode).await?;
            }
        }
        library.save_context().await?;

        debug!(fetched = remote.len(), added = added.len(), "Podcast episodes synced");
        Ok(added)
    }

    #[instrument(skip(self))]
    async fn set_favorite(&self, kind: FavoriteKind, id: &str, favorite: bool) -> Result<()> {
        self.api.set_favorite(kind, id, favorite).await?;

        let mut library = self.context();
        match kind {
            FavoriteKind::Artist => {
                if let Some(mut artist) = library.get::<Artist>(id).await {
                    artist.is_favorite = favorite;
                    library.update(&artist).await?;
                }
            }
            FavoriteKind::Album => {
                if let Some(mut album) = library.get::<Album>(id).await {
                    album.is_favorite = favorite;
                    library.update(&album).await?;
                }
            }
            FavoriteKind::Song => {
                if let Some(mut song) = library.get::<Song>(id).await {
                    song.is_favorite = favorite;
                    library.update(&song).await?;
                }
            }
        }
        library.save_context().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn sync_music_folders(&self) -> Result<Vec<MusicFolder>> {
        let remote_folders = self.api.fetch_music_folders().await?;
        let mut remote_directories: Vec<Vec<RemoteDirectory>> =
            Vec::with_capacity(remote_folders.len());
        for folder in &remote_folders {
            remote_directories.push(self.api.fetch_music_folder_directories(&folder.id).await?);
        }

        let mut library = self.context();
        let mut mapper = CatalogMapper::new(&mut library, self.parser.as_ref());
        let mut folders = Vec::with_capacity(remote_folders.len());
        for (folder, directories) in remote_folders.iter().zip(&remote_directories) {
            let folder = mapper.music_folder(folder).await?;
            for directory in directories {
                mapper.directory(directory, Some(folder.pk), None).await?;
            }
            folders.push(folder);
        }
        library.save_context().await?;

        info!(folders = folders.len(), "Music folders synced");
        Ok(folders)
    }

    #[instrument(skip(self, directory), fields(directory_id = %directory.id))]
    async fn sync_directory(&self, directory: &Directory) -> Result<Directory> {
        require_remote_id("Directory", &directory.id)?;
        let content = self.api.fetch_directory(&directory.id).await?;

        let mut library = self.context();
        let parent: Directory =
            library
                .get_by_pk(directory.pk)
                .await
                .ok_or_else(|| SyncError::NotFound {
                    entity_type: "Directory".to_string(),
                    id: directory.id.clone(),
                })?;
        let mut mapper = CatalogMapper::new(&mut library, self.parser.as_ref());
        for child in &content.directories {
            mapper
                .directory(child, parent.music_folder_pk, Some(parent.pk))
                .await?;
        }
        for song in &content.songs {
            let mut song = song.clone();
            song.directory_id = Some(parent.id.clone());
            mapper.song(&song, None).await?;
        }
        library.save_context().await?;

        debug!(
            directories = content.directories.len(),
            songs = content.songs.len(),
            "Directory synced"
        );
        Ok(parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{RemoteAlbum, RemoteEpisode, RemoteFavorites, RemotePlaylist, RemotePodcast};
    use crate::test_support::{remote_song, settings, FakeCatalogApi};
    use core_library::db::create_test_pool;
    use core_library::EpisodeUserStatus;

    async fn syncer(api: Arc<FakeCatalogApi>) -> (SqlitePool, CatalogLibrarySyncer) {
        let pool = create_test_pool().await.unwrap();
        let syncer = CatalogLibrarySyncer::new(api, pool.clone(), settings().await);
        (pool, syncer)
    }

    #[core_async::test]
    async fn test_latest_library_elements_returns_only_new_songs() {
        let api = Arc::new(FakeCatalogApi::default());
        api.catalog().latest_songs = vec![remote_song("s-1"), remote_song("s-2")];
        let (pool, syncer) = syncer(api.clone()).await;

        let added = syncer.sync_latest_library_elements().await.unwrap();
        assert_eq!(added.len(), 2);

        api.catalog().latest_songs.push(remote_song("s-3"));
        let added = syncer.sync_latest_library_elements().await.unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].id, "s-3");

        let mut library = LibraryStorage::new(pool);
        let waves = library.get_sync_waves().await;
        assert_eq!(waves.len(), 2);
        assert!(waves.iter().all(|wave| wave.is_done));
        let latest = library.get_latest_sync_wave().await.unwrap();
        let wave_songs = library.songs_of_sync_wave(&latest).await;
        assert_eq!(wave_songs.len(), 1);
    }

    #[core_async::test]
    async fn test_remote_failure_leaves_store_untouched() {
        let api = Arc::new(FakeCatalogApi::default());
        api.catalog().latest_songs = vec![remote_song("s-1")];
        api.fail_with(401, "Session expired");
        let (pool, syncer) = syncer(api).await;

        let err = syncer.sync_latest_library_elements().await.unwrap_err();
        assert!(matches!(err, SyncError::Api(ref e) if e.status_code == 401));

        let mut library = LibraryStorage::new(pool);
        assert!(library.get_sync_waves().await.is_empty());
        assert_eq!(library.count::<Song>().await, 0);
    }

    #[core_async::test]
    async fn test_playlists_removed_remotely_are_deleted() {
        let api = Arc::new(FakeCatalogApi::default());
        api.catalog().playlists = vec![
            RemotePlaylist {
                id: "pl-1".to_string(),
                name: "Road trip".to_string(),
                ..Default::default()
            },
            RemotePlaylist {
                id: "pl-2".to_string(),
                name: "Focus".to_string(),
                ..Default::default()
            },
        ];
        let (pool, syncer) = syncer(api.clone()).await;
        syncer.sync_down_playlists_without_songs().await.unwrap();

        {
            let mut library = LibraryStorage::new(pool.clone());
            let mut local: Playlist = library.create().await.unwrap();
            local.set_name("Not uploaded yet");
            library.update(&local).await.unwrap();
            library.save_context().await.unwrap();
        }

        api.catalog().playlists.remove(0);
        syncer.sync_down_playlists_without_songs().await.unwrap();

        let mut library = LibraryStorage::new(pool);
        let names: Vec<String> = library
            .get_playlists_by(PlaylistSearchCategory::All)
            .await
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Focus", "Not uploaded yet"]);
    }

    #[core_async::test]
    async fn test_sync_playlist_replaces_items() {
        let api = Arc::new(FakeCatalogApi::default());
        api.catalog().playlists = vec![RemotePlaylist {
            id: "pl-1".to_string(),
            name: "Mix".to_string(),
            ..Default::default()
        }];
        api.catalog()
            .playlist_songs
            .insert("pl-1".to_string(), vec![remote_song("s-1"), remote_song("s-2")]);
        let (pool, syncer) = syncer(api.clone()).await;
        syncer.sync_down_playlists_without_songs().await.unwrap();

        let playlist: Playlist = LibraryStorage::new(pool.clone()).get("pl-1").await.unwrap();
        syncer.sync_playlist(&playlist).await.unwrap();

        api.catalog()
            .playlist_songs
            .insert("pl-1".to_string(), vec![remote_song("s-2")]);
        let playlist = syncer.sync_playlist(&playlist).await.unwrap();
        assert_eq!(playlist.remote_song_count, 1);

        let mut library = LibraryStorage::new(pool);
        let playables = library.playlist_playables(&playlist).await;
        assert_eq!(playables.len(), 1);
        assert_eq!(core_library::PlayableEntity::remote_id(&playables[0]), "s-2");
    }

    #[core_async::test]
    async fn test_album_songs_missing_remotely_are_marked_deleted() {
        let api = Arc::new(FakeCatalogApi::default());
        let remote_album = RemoteAlbum {
            id: "al-1".to_string(),
            name: "Dummy".to_string(),
            song_count: 2,
            ..Default::default()
        };
        let album_song = |id: &str| RemoteSong {
            album_id: Some("al-1".to_string()),
            ..remote_song(id)
        };
        api.catalog().albums.insert(
            "al-1".to_string(),
            (remote_album.clone(), vec![album_song("s-1"), album_song("s-2")]),
        );
        let (pool, syncer) = syncer(api.clone()).await;

        let album = Album {
            id: "al-1".to_string(),
            ..Default::default()
        };
        syncer.sync_album(&album).await.unwrap();

        api.catalog()
            .albums
            .insert("al-1".to_string(), (remote_album, vec![album_song("s-1")]));
        syncer.sync_album(&album).await.unwrap();

        let mut library = LibraryStorage::new(pool);
        let gone: Song = library.get("s-2").await.unwrap();
        assert_eq!(gone.remote_status, RemoteStatus::Deleted);
        let kept: Song = library.get("s-1").await.unwrap();
        assert_eq!(kept.remote_status, RemoteStatus::Available);
    }

    #[core_async::test]
    async fn test_latest_podcast_episodes_returns_new_ones() {
        let api = Arc::new(FakeCatalogApi::default());
        api.catalog().podcasts = vec![RemotePodcast {
            id: "p-1".to_string(),
            title: "Radiolab".to_string(),
            ..Default::default()
        }];
        let episode = |id: &str, publish_date: i64| RemoteEpisode {
            id: id.to_string(),
            title: format!("Episode {id}"),
            publish_date,
            is_available: true,
            ..Default::default()
        };
        api.catalog()
            .episodes
            .insert("p-1".to_string(), vec![episode("e-1", 10), episode("e-2", 20)]);
        let (pool, syncer) = syncer(api.clone()).await;
        syncer.sync_down_podcasts_without_episodes().await.unwrap();
        let podcast: Podcast = LibraryStorage::new(pool.clone()).get("p-1").await.unwrap();

        let added = syncer.sync_latest_podcast_episodes(&podcast).await.unwrap();
        assert_eq!(added.len(), 2);
        assert!(added.iter().all(|e| e.user_status == EpisodeUserStatus::Available));

        api.catalog()
            .episodes
            .insert("p-1".to_string(), vec![episode("e-2", 20), episode("e-3", 30)]);
        let added = syncer.sync_latest_podcast_episodes(&podcast).await.unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].id, "e-3");

        let mut library = LibraryStorage::new(pool);
        let first: PodcastEpisode = library.get("e-1").await.unwrap();
        assert_eq!(first.remote_status, RemoteStatus::Deleted);
    }

    #[core_async::test]
    async fn test_podcasts_removed_remotely_are_marked_deleted() {
        let api = Arc::new(FakeCatalogApi::default());
        api.catalog().podcasts = vec![RemotePodcast {
            id: "p-1".to_string(),
            title: "Radiolab".to_string(),
            ..Default::default()
        }];
        let (pool, syncer) = syncer(api.clone()).await;
        syncer.sync_down_podcasts_without_episodes().await.unwrap();

        api.catalog().podcasts.clear();
        syncer.sync_down_podcasts_without_episodes().await.unwrap();

        let podcast: Podcast = LibraryStorage::new(pool).get("p-1").await.unwrap();
        assert_eq!(podcast.remote_status, RemoteStatus::Deleted);
    }

    #[core_async::test]
    async fn test_favorites_are_mirrored() {
        let api = Arc::new(FakeCatalogApi::default());
        api.catalog().latest_songs = vec![remote_song("s-1"), remote_song("s-2")];
        api.catalog().favorites = RemoteFavorites {
            song_ids: vec!["s-2".to_string()],
            artist_ids: vec!["ar-s-1".to_string()],
            ..Default::default()
        };
        let (pool, syncer) = syncer(api.clone()).await;
        syncer.sync_latest_library_elements().await.unwrap();

        syncer.sync_favorite_library_elements().await.unwrap();

        let mut library = LibraryStorage::new(pool);
        assert!(!library.get::<Song>("s-1").await.unwrap().is_favorite);
        assert!(library.get::<Song>("s-2").await.unwrap().is_favorite);
        assert!(library.get::<Artist>("ar-s-1").await.unwrap().is_favorite);
    }

    #[core_async::test]
    async fn test_set_favorite_updates_remote_then_local() {
        let api = Arc::new(FakeCatalogApi::default());
        api.catalog().latest_songs = vec![remote_song("s-1")];
        let (pool, syncer) = syncer(api.clone()).await;
        syncer.sync_latest_library_elements().await.unwrap();

        syncer
            .set_favorite(FavoriteKind::Song, "s-1", true)
            .await
            .unwrap();

        assert!(api.calls().contains(&"set_favorite:s-1:true".to_string()));
        let song: Song = LibraryStorage::new(pool).get("s-1").await.unwrap();
        assert!(song.is_favorite);
    }

    #[core_async::test]
    async fn test_empty_search_skips_server() {
        let api = Arc::new(FakeCatalogApi::default());
        let (_pool, syncer) = syncer(api.clone()).await;

        assert!(syncer.search_songs("   ").await.unwrap().is_empty());
        assert!(api.calls().is_empty());
    }

    #[core_async::test]
    async fn test_playlist_deletion_requires_remote_id() {
        let api = Arc::new(FakeCatalogApi::default());
        let (_pool, syncer) = syncer(api.clone()).await;

        let result = syncer.sync_upload_playlist_deletion("").await;
        assert!(matches!(result, Err(SyncError::NotFound { .. })));

        syncer.sync_upload_playlist_deletion("pl-7").await.unwrap();
        assert_eq!(api.calls(), vec!["delete_playlist:pl-7".to_string()]);
    }

    #[core_async::test]
    async fn test_music_folders_and_directories() {
        let api = Arc::new(FakeCatalogApi::default());
        {
            let mut catalog = api.catalog();
            catalog.music_folders = vec![crate::api::RemoteMusicFolder {
                id: "mf-1".to_string(),
                name: "Music".to_string(),
            }];
            catalog.folder_directories.insert(
                "mf-1".to_string(),
                vec![RemoteDirectory {
                    id: "d-1".to_string(),
                    name: "Jazz".to_string(),
                    artwork_url: None,
                }],
            );
            catalog.directories.insert(
                "d-1".to_string(),
                crate::api::RemoteDirectoryContent {
                    directories: vec![RemoteDirectory {
                        id: "d-2".to_string(),
                        name: "Coltrane".to_string(),
                        artwork_url: None,
                    }],
                    songs: vec![remote_song("s-1")],
                },
            );
        }
        let (pool, syncer) = syncer(api).await;

        let folders = syncer.sync_music_folders().await.unwrap();
        assert_eq!(folders.len(), 1);

        let jazz = LibraryStorage::new(pool.clone()).get_directory("d-1").await.unwrap();
        syncer.sync_directory(&jazz).await.unwrap();

        let mut library = LibraryStorage::new(pool);
        let children = library.subdirectories(&jazz).await;
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].music_folder_pk, Some(folders[0].pk));
        assert_eq!(library.songs_of_directory(&jazz).await.len(), 1);
    }
}
