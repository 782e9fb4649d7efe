//! # Host Bridge Traits
//!
//! Capabilities the library sync engine needs from its host application.
//!
//! ## Overview
//!
//! The engine owns catalog reconciliation and the local store, but it never
//! transfers files, renders alerts or decides where preferences live. Those
//! concerns are expressed here as traits and injected by each host.
//!
//! ## Traits
//!
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences (library sync version, online mode, auto-download toggles)
//! - [`PlayableDownloader`](download::PlayableDownloader) - Fire-and-forget download enqueueing
//! - [`AlertDisplayer`](alert::AlertDisplayer) - Optional popup surface for logged failures
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ SettingsStore |
//! | Mobile   | host app            | 📋 Injected |
//!
//! ## Error Handling
//!
//! All bridge traits report failures through [`BridgeError`](error::BridgeError).
//! Implementations should convert platform errors and include the key or
//! object the failure relates to.
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync` so a single implementation can be shared
//! by the background syncer manager and on-demand sync calls.

pub mod alert;
pub mod download;
pub mod error;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use alert::{Alert, AlertDisplayer, AlertSeverity};
pub use download::{DownloadKind, DownloadRequest, PlayableDownloader};
pub use storage::SettingsStore;
pub use time::{LogLevel, LogRecord, LoggerSink};
