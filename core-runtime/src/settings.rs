//! # Library Settings
//!
//! Process-wide, persisted flags that steer the sync engine.
//!
//! [`LibrarySettings`] is loaded once from the host's
//! [`SettingsStore`](bridge_traits::storage::SettingsStore) at startup and then
//! read synchronously from any task. Mutations write through to the store
//! before the in-memory value changes, so a failed write leaves both sides
//! untouched.
//!
//! The library sync version is only ever advanced by the schema version
//! migrator; the remaining flags belong to the settings UI.

use crate::error::Result;
use bridge_traits::storage::SettingsStore;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub const LIBRARY_SYNC_VERSION_KEY: &str = "library_sync_version";
pub const ONLINE_MODE_KEY: &str = "online_mode";
pub const AUTO_DOWNLOAD_LATEST_SONGS_KEY: &str = "auto_download_latest_songs";
pub const AUTO_DOWNLOAD_LATEST_PODCAST_EPISODES_KEY: &str =
    "auto_download_latest_podcast_episodes";

/// On-disk library layout version.
///
/// Each bump marks a structural change that requires a one-time fixup or a
/// resync before steady-state incremental sync can resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LibrarySyncVersion {
    V6 = 0,
    /// Genres added
    V7 = 1,
    /// Directories added
    V8 = 2,
    /// Artwork remote ids added
    V9 = 3,
}

impl LibrarySyncVersion {
    pub const NEWEST: LibrarySyncVersion = LibrarySyncVersion::V9;
    pub const DEFAULT: LibrarySyncVersion = LibrarySyncVersion::V6;

    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            0 => Some(Self::V6),
            1 => Some(Self::V7),
            2 => Some(Self::V8),
            3 => Some(Self::V9),
            _ => None,
        }
    }

    pub fn raw(self) -> i64 {
        self as i64
    }

    pub fn is_newest(self) -> bool {
        self == Self::NEWEST
    }
}

impl Default for LibrarySyncVersion {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for LibrarySyncVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::V6 => "v6",
            Self::V7 => "v7",
            Self::V8 => "v8",
            Self::V9 => "v9",
        };
        f.write_str(label)
    }
}

/// Persisted engine settings shared by every task.
pub struct LibrarySettings {
    store: Arc<dyn SettingsStore>,
    library_sync_version: AtomicU8,
    online_mode: AtomicBool,
    auto_download_latest_songs: AtomicBool,
    auto_download_latest_podcast_episodes: AtomicBool,
}

impl LibrarySettings {
    /// Load every setting from `store`, falling back to defaults for keys
    /// that were never written.
    pub async fn load(store: Arc<dyn SettingsStore>) -> Result<Self> {
        let version = match store.get_i64(LIBRARY_SYNC_VERSION_KEY).await? {
            Some(raw) => LibrarySyncVersion::from_raw(raw).unwrap_or_else(|| {
                warn!(raw, "Unknown library sync version, falling back to default");
                LibrarySyncVersion::DEFAULT
            }),
            None => LibrarySyncVersion::DEFAULT,
        };
        let online_mode = store.get_bool(ONLINE_MODE_KEY).await?.unwrap_or(true);
        let latest_songs = store
            .get_bool(AUTO_DOWNLOAD_LATEST_SONGS_KEY)
            .await?
            .unwrap_or(false);
        let latest_episodes = store
            .get_bool(AUTO_DOWNLOAD_LATEST_PODCAST_EPISODES_KEY)
            .await?
            .unwrap_or(false);

        info!(
            library_sync_version = %version,
            online_mode,
            "Loaded library settings"
        );

        Ok(Self {
            store,
            library_sync_version: AtomicU8::new(version as u8),
            online_mode: AtomicBool::new(online_mode),
            auto_download_latest_songs: AtomicBool::new(latest_songs),
            auto_download_latest_podcast_episodes: AtomicBool::new(latest_episodes),
        })
    }

    pub fn library_sync_version(&self) -> LibrarySyncVersion {
        let raw = self.library_sync_version.load(Ordering::SeqCst);
        LibrarySyncVersion::from_raw(raw as i64).unwrap_or_default()
    }

    pub async fn set_library_sync_version(&self, version: LibrarySyncVersion) -> Result<()> {
        self.store
            .set_i64(LIBRARY_SYNC_VERSION_KEY, version.raw())
            .await?;
        self.library_sync_version
            .store(version as u8, Ordering::SeqCst);
        info!(library_sync_version = %version, "Library sync version updated");
        Ok(())
    }

    pub fn is_online_mode(&self) -> bool {
        self.online_mode.load(Ordering::SeqCst)
    }

    pub async fn set_online_mode(&self, online: bool) -> Result<()> {
        self.store.set_bool(ONLINE_MODE_KEY, online).await?;
        self.online_mode.store(online, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_auto_download_latest_songs_active(&self) -> bool {
        self.auto_download_latest_songs.load(Ordering::SeqCst)
    }

    pub async fn set_auto_download_latest_songs(&self, active: bool) -> Result<()> {
        self.store
            .set_bool(AUTO_DOWNLOAD_LATEST_SONGS_KEY, active)
            .await?;
        self.auto_download_latest_songs
            .store(active, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_auto_download_latest_podcast_episodes_active(&self) -> bool {
        self.auto_download_latest_podcast_episodes
            .load(Ordering::SeqCst)
    }

    pub async fn set_auto_download_latest_podcast_episodes(&self, active: bool) -> Result<()> {
        self.store
            .set_bool(AUTO_DOWNLOAD_LATEST_PODCAST_EPISODES_KEY, active)
            .await?;
        self.auto_download_latest_podcast_episodes
            .store(active, Ordering::SeqCst);
        Ok(())
    }
}

impl fmt::Debug for LibrarySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibrarySettings")
            .field("library_sync_version", &self.library_sync_version())
            .field("online_mode", &self.is_online_mode())
            .field(
                "auto_download_latest_songs",
                &self.is_auto_download_latest_songs_active(),
            )
            .field(
                "auto_download_latest_podcast_episodes",
                &self.is_auto_download_latest_podcast_episodes_active(),
            )
            .finish()
    }
}
