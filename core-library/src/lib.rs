//! # Library Store Module
//!
//! Owns the persisted mirror of the remote media library and the accessor
//! used to read and write it.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite database schema and migrations
//! - Domain models for catalog entities, playlists, cached files and
//!   bookkeeping rows
//! - `LibraryStorage`, one transactional context per task with
//!   property-level merge on update

pub mod db;
pub mod error;
pub mod models;
pub mod storage;

pub use error::{LibraryError, Result};
pub use models::{
    section_initial, Album, Artist, Artwork, ArtworkRemoteInfo, Directory, EpisodeUserStatus,
    Genre, ImageStatus, LibraryInfo, LogEntry, LogEntryType, MusicFolder, Playable,
    PlayableEntity, PlayableKind, PlayerData, PlayerQueue, Playlist, PlaylistItem,
    PlaylistSearchCategory, Podcast, PodcastEpisode, RemoteStatus, RepeatMode, Song, SongFile,
    StatisticCategory, SyncWave, UserStatisticCount, UserStatistics,
};
pub use storage::{LibraryStorage, RemoteEntity, StoredEntity};
