//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the library sync engine:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Persisted library settings (sync version, online mode, auto-download)
//! - Event bus system
//!
//! ## Overview
//!
//! Every other engine crate depends on this one for its logging conventions,
//! its configuration object and the broadcast channel used to tell UI
//! collaborators that a sync pass finished.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod settings;

pub use error::{Error, Result};
pub use settings::{LibrarySettings, LibrarySyncVersion};
