//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `SettingsStore` using a SQLite-backed key-value table
//!
//! Downloads and alerts stay host-provided: a desktop shell wires its own
//! transfer queue and UI into `PlayableDownloader` and `AlertDisplayer`.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::SqliteSettingsStore;
//! use bridge_traits::SettingsStore;
//!
//! #[core_async::main]
//! async fn main() {
//!     let settings = SqliteSettingsStore::new("/tmp/libsync/settings.db".into())
//!         .await
//!         .unwrap();
//!     settings.set_bool("online_mode", true).await.unwrap();
//! }
//! ```

mod settings;

pub use settings::SqliteSettingsStore;
