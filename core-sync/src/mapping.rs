//! Mapping of remote payloads onto library entities.
//!
//! Every upsert looks the entity up by its remote id first and only creates
//! a row when none exists. Relations named by the payload (artist, album,
//! genre, directory) are resolved the same way; a missing artist or album is
//! created as a stub carrying just its id and name, to be completed by a
//! later sync of that element.

use crate::api::{
    ArtworkUrlParser, RemoteAlbum, RemoteArtist, RemoteDirectory, RemoteEpisode, RemoteGenre,
    RemoteMusicFolder, RemotePlaylist, RemotePodcast, RemoteSong,
};
use crate::error::Result;
use core_library::{
    Album, Artist, Directory, EpisodeUserStatus, Genre, LibraryStorage, MusicFolder, Playlist,
    Podcast, PodcastEpisode, RemoteStatus, Song,
};
use tracing::debug;

pub(crate) struct CatalogMapper<'a> {
    library: &'a mut LibraryStorage,
    parser: &'a dyn ArtworkUrlParser,
}

impl<'a> CatalogMapper<'a> {
    pub(crate) fn new(library: &'a mut LibraryStorage, parser: &'a dyn ArtworkUrlParser) -> Self {
        Self { library, parser }
    }

    /// Row key of the artwork behind `url`, created on first sight.
    pub(crate) async fn artwork_pk(&mut self, url: Option<&str>) -> Result<Option<i64>> {
        let Some(url) = url.filter(|url| !url.is_empty()) else {
            return Ok(None);
        };
        let Some(info) = self.parser.extract_artwork_info(url) else {
            debug!(url, "Artwork URL carries no remote identity");
            return Ok(None);
        };

        let artwork = self.library.get_or_create_artwork(&info, url).await?;
        Ok(Some(artwork.pk))
    }

    /// Genres of older servers have no id and are matched by name.
    pub(crate) async fn genre(&mut self, remote: &RemoteGenre) -> Result<Genre> {
        let mut existing = None;
        if !remote.id.is_empty() {
            existing = self.library.get::<Genre>(&remote.id).await;
        }
        if existing.is_none() {
            existing = self.library.get_genre_by_name(&remote.name).await;
        }

        let mut genre = match existing {
            Some(genre) => genre,
            None => self.library.create::<Genre>().await?,
        };
        if !remote.id.is_empty() {
            genre.id = remote.id.clone();
        }
        genre.set_name(&remote.name);
        genre.remote_status = RemoteStatus::Available;
        self.library.update(&genre).await?;
        Ok(genre)
    }

    pub(crate) async fn artist(&mut self, remote: &RemoteArtist) -> Result<Artist> {
        let mut artist = match self.library.get::<Artist>(&remote.id).await {
            Some(artist) => artist,
            None => self.library.create::<Artist>().await?,
        };
        artist.id = remote.id.clone();
        artist.set_name(&remote.name);
        artist.remote_status = RemoteStatus::Available;
        if let Some(artwork_pk) = self.artwork_pk(remote.artwork_url.as_deref()).await? {
            artist.artwork_pk = Some(artwork_pk);
        }
        self.library.update(&artist).await?;
        Ok(artist)
    }

    async fn artist_ref(&mut self, id: Option<&str>, name: Option<&str>) -> Result<Option<i64>> {
        let Some(id) = id.filter(|id| !id.is_empty()) else {
            return Ok(None);
        };
        if let Some(artist) = self.library.get::<Artist>(id).await {
            return Ok(Some(artist.pk));
        }

        let mut artist = self.library.create::<Artist>().await?;
        artist.id = id.to_string();
        artist.set_name(name.unwrap_or_default());
        self.library.update(&artist).await?;
        Ok(Some(artist.pk))
    }

    pub(crate) async fn album(&mut self, remote: &RemoteAlbum) -> Result<Album> {
        let artist_pk = self
            .artist_ref(remote.artist_id.as_deref(), remote.artist_name.as_deref())
            .await?;
        let genre_pk = match &remote.genre {
            Some(genre) => Some(self.genre(genre).await?.pk),
            None => None,
        };

        let mut album = match self.library.get::<Album>(&remote.id).await {
            Some(album) => album,
            None => self.library.create::<Album>().await?,
        };
        album.id = remote.id.clone();
        album.set_name(&remote.name);
        album.remote_status = RemoteStatus::Available;
        album.year = remote.year;
        album.remote_song_count = remote.song_count;
        album.artist_pk = artist_pk.or(album.artist_pk);
        album.genre_pk = genre_pk.or(album.genre_pk);
        if let Some(artwork_pk) = self.artwork_pk(remote.artwork_url.as_deref()).await? {
            album.artwork_pk = Some(artwork_pk);
        }
        self.library.update(&album).await?;
        Ok(album)
    }

    async fn album_ref(
        &mut self,
        id: Option<&str>,
        name: Option<&str>,
        artist_pk: Option<i64>,
    ) -> Result<Option<i64>> {
        let Some(id) = id.filter(|id| !id.is_empty()) else {
            return Ok(None);
        };
        if let Some(album) = self.library.get::<Album>(id).await {
            return Ok(Some(album.pk));
        }

        let mut album = self.library.create::<Album>().await?;
        album.id = id.to_string();
        album.set_name(name.unwrap_or_default());
        album.artist_pk = artist_pk;
        self.library.update(&album).await?;
        Ok(Some(album.pk))
    }

    /// Upsert a song. The flag is true when the song was not in the library
    /// before; new songs are attributed to `sync_wave_pk`.
    pub(crate) async fn song(
        &mut self,
        remote: &RemoteSong,
        sync_wave_pk: Option<i64>,
    ) -> Result<(Song, bool)> {
        let artist_pk = self
            .artist_ref(remote.artist_id.as_deref(), remote.artist_name.as_deref())
            .await?;
        let album_pk = self
            .album_ref(
                remote.album_id.as_deref(),
                remote.album_name.as_deref(),
                artist_pk,
            )
            .await?;
        let genre_pk = match &remote.genre {
            Some(genre) => Some(self.genre(genre).await?.pk),
            None => None,
        };
        let directory_pk = match remote.directory_id.as_deref() {
            Some(id) => self.library.get_directory(id).await.map(|d| d.pk),
            None => None,
        };

        let (mut song, created) = match self.library.get::<Song>(&remote.id).await {
            Some(song) => (song, false),
            None => (self.library.create_song().await?, true),
        };
        song.id = remote.id.clone();
        song.set_title(&remote.title);
        song.remote_status = RemoteStatus::Available;
        song.artist_pk = artist_pk.or(song.artist_pk);
        song.album_pk = album_pk.or(song.album_pk);
        song.genre_pk = genre_pk.or(song.genre_pk);
        song.directory_pk = directory_pk.or(song.directory_pk);
        song.track = remote.track;
        song.disk = remote.disk.clone();
        song.year = remote.year;
        song.remote_duration = remote.duration;
        if song.duration == 0 {
            song.duration = remote.duration;
        }
        song.content_type = remote.content_type.clone();
        song.bitrate = remote.bitrate;
        song.size = remote.size;
        if created {
            song.sync_wave_pk = sync_wave_pk;
        }
        if let Some(artwork_pk) = self.artwork_pk(remote.artwork_url.as_deref()).await? {
            song.artwork_pk = Some(artwork_pk);
        }
        self.library.update(&song).await?;
        Ok((song, created))
    }

    pub(crate) async fn playlist(&mut self, remote: &RemotePlaylist) -> Result<Playlist> {
        let mut playlist = match self.library.get::<Playlist>(&remote.id).await {
            Some(playlist) => playlist,
            None => self.library.create::<Playlist>().await?,
        };
        playlist.id = remote.id.clone();
        playlist.set_name(&remote.name);
        playlist.remote_status = RemoteStatus::Available;
        playlist.remote_song_count = remote.song_count;
        playlist.changed_at = remote.changed_at;
        if let Some(artwork_pk) = self.artwork_pk(remote.artwork_url.as_deref()).await? {
            playlist.artwork_pk = Some(artwork_pk);
        }
        self.library.update(&playlist).await?;
        Ok(playlist)
    }

    pub(crate) async fn podcast(&mut self, remote: &RemotePodcast) -> Result<Podcast> {
        let mut podcast = match self.library.get::<Podcast>(&remote.id).await {
            Some(podcast) => podcast,
            None => self.library.create::<Podcast>().await?,
        };
        podcast.id = remote.id.clone();
        podcast.set_title(&remote.title);
        podcast.depiction = remote.description.clone();
        podcast.remote_status = RemoteStatus::Available;
        if let Some(artwork_pk) = self.artwork_pk(remote.artwork_url.as_deref()).await? {
            podcast.artwork_pk = Some(artwork_pk);
        }
        self.library.update(&podcast).await?;
        Ok(podcast)
    }

    /// Upsert an episode of `podcast`. An episode the user deleted stays
    /// deleted.
    pub(crate) async fn episode(
        &mut self,
        podcast: &Podcast,
        remote: &RemoteEpisode,
    ) -> Result<(PodcastEpisode, bool)> {
        let (mut episode, created) = match self.library.get::<PodcastEpisode>(&remote.id).await {
            Some(episode) => (episode, false),
            None => (self.library.create_podcast_episode().await?, true),
        };
        episode.id = remote.id.clone();
        episode.set_title(&remote.title);
        episode.podcast_pk = Some(podcast.pk);
        episode.remote_status = RemoteStatus::Available;
        episode.description = remote.description.clone();
        episode.publish_date = remote.publish_date;
        episode.remote_duration = remote.duration;
        if episode.duration == 0 {
            episode.duration = remote.duration;
        }
        episode.content_type = remote.content_type.clone();
        episode.bitrate = remote.bitrate;
        episode.size = remote.size;
        if episode.user_status != EpisodeUserStatus::Deleted {
            episode.user_status = if remote.is_available {
                EpisodeUserStatus::Available
            } else {
                EpisodeUserStatus::Syncing
            };
        }
        if let Some(artwork_pk) = self.artwork_pk(remote.artwork_url.as_deref()).await? {
            episode.artwork_pk = Some(artwork_pk);
        }
        self.library.update(&episode).await?;
        Ok((episode, created))
    }

    pub(crate) async fn music_folder(&mut self, remote: &RemoteMusicFolder) -> Result<MusicFolder> {
        let mut folder = match self.library.get::<MusicFolder>(&remote.id).await {
            Some(folder) => folder,
            None => self.library.create::<MusicFolder>().await?,
        };
        folder.id = remote.id.clone();
        folder.name = remote.name.clone();
        self.library.update(&folder).await?;
        Ok(folder)
    }

    pub(crate) async fn directory(
        &mut self,
        remote: &RemoteDirectory,
        music_folder_pk: Option<i64>,
        parent_pk: Option<i64>,
    ) -> Result<Directory> {
        let mut directory = match self.library.get::<Directory>(&remote.id).await {
            Some(directory) => directory,
            None => self.library.create::<Directory>().await?,
        };
        directory.id = remote.id.clone();
        directory.set_name(&remote.name);
        directory.music_folder_pk = music_folder_pk.or(directory.music_folder_pk);
        directory.parent_pk = parent_pk.or(directory.parent_pk);
        if let Some(artwork_pk) = self.artwork_pk(remote.artwork_url.as_deref()).await? {
            directory.artwork_pk = Some(artwork_pk);
        }
        self.library.update(&directory).await?;
        Ok(directory)
    }
}
