//! # Library Sync
//!
//! Keeps the offline library in step with an Ampache or Subsonic server.
//!
//! ## Overview
//!
//! - **Catalog API** (`api`, `ampache`): transport seam, payloads, artwork
//!   URL parsing and Ampache error envelopes
//! - **Sync Engine** (`engine`): on-demand catalog operations mapped into the
//!   library store
//! - **Background Syncers** (`background`): artwork download, incremental
//!   library sync and full version resync
//! - **Migrator** (`migrator`): library layout upgrades and the artwork id
//!   fixup
//! - **Manager** (`manager`): single-flight background passes
//! - **Auto-Download** (`auto_download`, `containable`): download plans for
//!   new and contained playables
//! - **Event Logger** (`event_logger`): persisted log entries and alert
//!   popups

pub mod ampache;
pub mod api;
pub mod auto_download;
pub mod background;
pub mod containable;
pub mod engine;
pub mod error;
pub mod event_logger;
pub mod manager;
pub mod migrator;

mod mapping;

#[cfg(test)]
mod test_support;

pub use api::{
    AmpacheArtworkUrlParser, ArtworkUrlParser, BackendKind, CatalogApi, FavoriteKind,
    PageRequest, ResponseError, SubsonicArtworkUrlParser,
};
pub use auto_download::{AutoDownloadLibrarySyncer, BackgroundFetchTriggeredSyncer, DownloadPlan};
pub use background::{
    ArtworkSyncer, BackgroundSyncer, LibraryBackgroundSyncer, SyncOutcome, SyncerState,
    VersionResyncer,
};
pub use containable::{DetailType, FetchContext, PlayableContainable, SongSet};
pub use engine::{CatalogLibrarySyncer, LibrarySyncer};
pub use error::{Result, SyncError};
pub use event_logger::{EventLogger, LogStatusCode};
pub use manager::{BackgroundSyncerManager, CatalogSyncSetup, SyncerSet};
pub use migrator::{ArtworkFixupReport, PendingMigration, SchemaMigrator};
