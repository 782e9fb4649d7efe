//! Workspace facade crate.
//!
//! Re-exports the library sync engine and its runtime so host applications can
//! depend on `libsync-workspace` and enable the documented features instead of
//! wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_runtime as runtime;
#[cfg(feature = "desktop-shims")]
pub use core_sync as sync;
