//! # Core Configuration Module
//!
//! Configuration for the library sync engine.
//!
//! ## Overview
//!
//! A builder produces a [`CoreConfig`] holding the injected capabilities and
//! the engine's tuning knobs. Validation is fail-fast: a missing capability
//! or an out-of-range value is reported with an actionable message before any
//! engine component is constructed.
//!
//! ## Required Dependencies
//!
//! - `SettingsStore`: persists the library sync version and user toggles
//!
//! When the `desktop-shims` feature is enabled, a SQLite-backed
//! `SettingsStore` next to the library database is injected automatically if
//! none was provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/library.db")
//!     .settings_store(Arc::new(MySettingsStore))
//!     .download_warning_threshold(500)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Missing database path
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing database path");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::SettingsStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Playable count above which a bulk download asks the user first.
pub const DEFAULT_DOWNLOAD_WARNING_THRESHOLD: usize = 200;

/// Number of unchecked artworks fetched per artwork sync step.
pub const DEFAULT_ARTWORK_BATCH_SIZE: usize = 10;

/// Number of catalog elements requested per page during library sync.
pub const DEFAULT_LIBRARY_PAGE_SIZE: usize = 500;

/// Core configuration for the library sync engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite library database
    pub database_path: PathBuf,

    /// Key/value store for persisted settings (required)
    pub settings_store: Arc<dyn SettingsStore>,

    /// Bulk downloads above this many playables require confirmation
    pub download_warning_threshold: usize,

    /// Unchecked artworks processed per artwork sync step
    pub artwork_batch_size: usize,

    /// Catalog page size used by the incremental library sync
    pub library_page_size: usize,

    /// Per-subscriber buffer of the event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("settings_store", &"SettingsStore { ... }")
            .field(
                "download_warning_threshold",
                &self.download_warning_threshold,
            )
            .field("artwork_batch_size", &self.artwork_batch_size)
            .field("library_page_size", &self.library_page_size)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path is not empty
    /// - Batch and page sizes are non-zero and bounded
    /// - Event buffer can hold at least one event
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.artwork_batch_size == 0 {
            return Err(Error::Config(
                "Artwork batch size must be greater than 0".to_string(),
            ));
        }

        if self.library_page_size == 0 || self.library_page_size > 10_000 {
            return Err(Error::Config(
                "Library page size must be between 1 and 10,000".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn settings_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "SettingsStore".to_string(),
        message: "SettingsStore implementation is required to persist the library sync version. \
                 Desktop: ensure the 'desktop-shims' feature is enabled to use the default SqliteSettingsStore. \
                 Mobile: inject platform-native settings (UserDefaults/DataStore)."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_settings_store(database_path: &Path) -> Result<Arc<dyn SettingsStore>> {
    use bridge_desktop::SqliteSettingsStore;
    use core_async::runtime::{Handle, Runtime};
    use std::thread;

    let candidate = database_path
        .parent()
        .map(|parent| parent.join("settings.db"))
        .unwrap_or_else(|| PathBuf::from("settings.db"));

    let init_store = |path: PathBuf| -> Result<_> {
        let runtime = Runtime::new().map_err(|e| {
            Error::Internal(format!(
                "Failed to create runtime for default settings store: {}",
                e
            ))
        })?;

        runtime
            .block_on(SqliteSettingsStore::new(path))
            .map_err(|e| {
                Error::Internal(format!("Failed to initialize default SettingsStore: {}", e))
            })
    };

    // A runtime cannot be blocked on from inside another one.
    let store = match Handle::try_current() {
        Ok(_) => {
            let path = candidate.clone();
            thread::spawn(move || init_store(path))
                .join()
                .map_err(|_| {
                    Error::Internal(
                        "Worker thread panicked while creating default SettingsStore".to_string(),
                    )
                })??
        }
        Err(_) => init_store(candidate)?,
    };

    let store: Arc<dyn SettingsStore> = Arc::new(store);
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_settings_store(_database_path: &Path) -> Result<Arc<dyn SettingsStore>> {
    Err(settings_store_missing_error())
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    download_warning_threshold: Option<usize>,
    artwork_batch_size: Option<usize>,
    library_page_size: Option<usize>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the library database path.
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .database_path("/path/to/library.db");
    /// ```
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the settings store implementation (required unless the
    /// `desktop-shims` feature provides one).
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Default: 200
    pub fn download_warning_threshold(mut self, threshold: usize) -> Self {
        self.download_warning_threshold = Some(threshold);
        self
    }

    /// Default: 10
    pub fn artwork_batch_size(mut self, size: usize) -> Self {
        self.artwork_batch_size = Some(size);
        self
    }

    /// Default: 500
    pub fn library_page_size(mut self, size: usize) -> Self {
        self.library_page_size = Some(size);
        self
    }

    /// Default: 100
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error if the database path or the settings store is
    /// missing, or if any value fails [`CoreConfig::validate`].
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let settings_store = match self.settings_store {
            Some(store) => store,
            None => provide_default_settings_store(&database_path)?,
        };

        let config = CoreConfig {
            database_path,
            settings_store,
            download_warning_threshold: self
                .download_warning_threshold
                .unwrap_or(DEFAULT_DOWNLOAD_WARNING_THRESHOLD),
            artwork_batch_size: self
                .artwork_batch_size
                .unwrap_or(DEFAULT_ARTWORK_BATCH_SIZE),
            library_page_size: self.library_page_size.unwrap_or(DEFAULT_LIBRARY_PAGE_SIZE),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
