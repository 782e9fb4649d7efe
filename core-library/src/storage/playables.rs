//! Relations between playables and their containers.

use super::LibraryStorage;
use crate::models::{
    Album, Artist, Directory, Genre, MusicFolder, Podcast, PodcastEpisode, Song, SyncWave,
};

impl LibraryStorage {
    /// Visible episodes of a podcast, oldest first. Episodes the user
    /// deleted are hidden.
    pub async fn podcast_episodes(&mut self, podcast: &Podcast) -> Vec<PodcastEpisode> {
        self.load_all(
            sqlx::query_as::<_, PodcastEpisode>(
                "SELECT * FROM episode_view
                 WHERE podcast_pk = ? AND user_status != 'deleted'
                 ORDER BY publish_date ASC, pk",
            )
            .bind(podcast.pk),
        )
        .await
    }

    pub async fn songs_of_album(&mut self, album: &Album) -> Vec<Song> {
        self.load_all(
            sqlx::query_as::<_, Song>(
                "SELECT * FROM song_view WHERE album_pk = ? ORDER BY disk, track, title, id",
            )
            .bind(album.pk),
        )
        .await
    }

    pub async fn songs_of_artist(&mut self, artist: &Artist) -> Vec<Song> {
        self.load_all(
            sqlx::query_as::<_, Song>("SELECT * FROM song_view WHERE artist_pk = ? ORDER BY title, id")
                .bind(artist.pk),
        )
        .await
    }

    pub async fn songs_of_genre(&mut self, genre: &Genre) -> Vec<Song> {
        self.load_all(
            sqlx::query_as::<_, Song>("SELECT * FROM song_view WHERE genre_pk = ? ORDER BY title, id")
                .bind(genre.pk),
        )
        .await
    }

    pub async fn songs_of_directory(&mut self, directory: &Directory) -> Vec<Song> {
        self.load_all(
            sqlx::query_as::<_, Song>(
                "SELECT * FROM song_view WHERE directory_pk = ? ORDER BY track, title, id",
            )
            .bind(directory.pk),
        )
        .await
    }

    /// Songs first stored by the given sync wave.
    pub async fn songs_of_sync_wave(&mut self, wave: &SyncWave) -> Vec<Song> {
        self.load_all(
            sqlx::query_as::<_, Song>("SELECT * FROM song_view WHERE sync_wave_pk = ? ORDER BY pk")
                .bind(wave.pk),
        )
        .await
    }

    pub async fn albums_of_artist(&mut self, artist: &Artist) -> Vec<Album> {
        self.load_all(
            sqlx::query_as::<_, Album>("SELECT * FROM albums WHERE artist_pk = ? ORDER BY year, name, id")
                .bind(artist.pk),
        )
        .await
    }

    pub async fn subdirectories(&mut self, directory: &Directory) -> Vec<Directory> {
        self.load_all(
            sqlx::query_as::<_, Directory>(
                "SELECT * FROM directories WHERE parent_pk = ? ORDER BY name, id",
            )
            .bind(directory.pk),
        )
        .await
    }

    /// Top-level directories of a music folder.
    pub async fn directories_of_music_folder(&mut self, folder: &MusicFolder) -> Vec<Directory> {
        self.load_all(
            sqlx::query_as::<_, Directory>(
                "SELECT * FROM directories WHERE music_folder_pk = ? AND parent_pk IS NULL
                 ORDER BY name, id",
            )
            .bind(folder.pk),
        )
        .await
    }

    /// A song is orphaned when it has no remote id, no album, or its album
    /// is orphaned itself.
    pub async fn is_song_orphaned(&mut self, song: &Song) -> bool {
        if song.id.is_empty() {
            return true;
        }
        let Some(album_pk) = song.album_pk else {
            return true;
        };
        match self.get_by_pk::<Album>(album_pk).await {
            Some(album) => album.is_orphaned(),
            None => true,
        }
    }
}
