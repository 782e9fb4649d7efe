//! # Schema Version Migrator
//!
//! Brings a library written by an older layout up to
//! [`LibrarySyncVersion::NEWEST`]. The artwork id fixup runs blocking before
//! any background sync; a library at v6 additionally needs a full resync,
//! which the background manager runs and reports back through
//! [`SchemaMigrator::finish_legacy_resync`].
//!
//! Every step is idempotent and the version bump is always the last write.

use crate::api::ArtworkUrlParser;
use crate::error::Result;
use core_library::{Artwork, LibraryStorage};
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use core_runtime::{LibrarySettings, LibrarySyncVersion};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Work left after the blocking updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingMigration {
    UpToDate,
    /// The whole catalog must be pulled again before bumping the version.
    LegacyResync,
    /// Only the version marker is behind.
    VersionBump,
}

/// Outcome of one artwork id fixup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArtworkFixupReport {
    /// Artworks whose remote identity changed after re-deriving it
    pub rederived: u64,
    /// Artworks removed, unparseable or merged
    pub deleted: u64,
    /// Owner references moved onto a surviving artwork
    pub merged: u64,
}

pub struct SchemaMigrator {
    pool: SqlitePool,
    settings: Arc<LibrarySettings>,
    parser: Arc<dyn ArtworkUrlParser>,
    events: EventBus,
}

impl SchemaMigrator {
    pub fn new(
        pool: SqlitePool,
        settings: Arc<LibrarySettings>,
        parser: Arc<dyn ArtworkUrlParser>,
        events: EventBus,
    ) -> Self {
        Self {
            pool,
            settings,
            parser,
            events,
        }
    }

    pub fn version(&self) -> LibrarySyncVersion {
        self.settings.library_sync_version()
    }

    pub fn pending(&self) -> PendingMigration {
        match self.version() {
            version if version <= LibrarySyncVersion::V6 => PendingMigration::LegacyResync,
            version if version < LibrarySyncVersion::NEWEST => PendingMigration::VersionBump,
            _ => PendingMigration::UpToDate,
        }
    }

    /// Run the updates that must finish before the library is used.
    /// Returns the fixup report when one ran.
    #[instrument(skip(self), fields(version = %self.version()))]
    pub async fn perform_blocking_library_updates_if_needed(
        &self,
    ) -> Result<Option<ArtworkFixupReport>> {
        if self.version() >= LibrarySyncVersion::NEWEST {
            debug!("Library layout is current");
            return Ok(None);
        }

        info!("Performing blocking library update: artwork ids");
        self.update_artwork_id_structure().await.map(Some)
    }

    /// Re-derive every artwork identity from its URL, then merge artworks
    /// sharing one identity onto the oldest row.
    pub async fn update_artwork_id_structure(&self) -> Result<ArtworkFixupReport> {
        let mut report = ArtworkFixupReport::default();

        let mut library = LibraryStorage::new(self.pool.clone());
        for mut artwork in library.list::<Artwork>().await {
            match self.parser.extract_artwork_info(&artwork.url) {
                Some(info) if info == artwork.remote_info() => {}
                Some(info) => {
                    artwork.set_remote_info(&info);
                    library.update(&artwork).await?;
                    report.rederived += 1;
                }
                None => {
                    debug!(artwork = artwork.pk, url = %artwork.url, "Dropping unparseable artwork");
                    library.delete(&artwork).await?;
                    report.deleted += 1;
                }
            }
        }
        library.save_context().await?;

        let mut library = LibraryStorage::new(self.pool.clone());
        for (survivor, duplicates) in library.get_duplicate_artworks().await {
            for duplicate in duplicates {
                report.merged += library.reassign_artwork_owners(&duplicate, &survivor).await?;
                library.delete(&duplicate).await?;
                report.deleted += 1;
            }
        }
        library.save_context().await?;

        info!(
            rederived = report.rederived,
            deleted = report.deleted,
            merged = report.merged,
            "Artwork id fixup completed"
        );
        self.events
            .emit(CoreEvent::Library(LibraryEvent::ArtworkFixupCompleted {
                deleted: report.deleted,
                merged: report.merged,
            }))
            .ok();
        Ok(report)
    }

    /// Bump to the newest version once the resync wave is done. Returns
    /// whether the version changed.
    pub async fn finish_legacy_resync(&self) -> Result<bool> {
        let wave = LibraryStorage::new(self.pool.clone())
            .get_latest_sync_wave()
            .await;
        match wave {
            Some(wave) if wave.is_done => {
                self.set_version(LibrarySyncVersion::NEWEST).await?;
                Ok(true)
            }
            _ => {
                debug!("Legacy resync not finished yet");
                Ok(false)
            }
        }
    }

    pub async fn set_version(&self, to: LibrarySyncVersion) -> Result<()> {
        let from = self.version();
        if from == to {
            return Ok(());
        }

        self.settings.set_library_sync_version(to).await?;
        info!(%from, %to, "Library sync version changed");
        self.events
            .emit(CoreEvent::Library(LibraryEvent::SyncVersionChanged {
                from: from.raw(),
                to: to.raw(),
            }))
            .ok();
        Ok(())
    }
}

impl std::fmt::Debug for SchemaMigrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaMigrator")
            .field("version", &self.version())
            .finish()
    }
}
