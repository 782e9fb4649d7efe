//! Async runtime facade for the library sync engine.
//!
//! Every other crate in the workspace depends on this crate instead of naming
//! Tokio directly. Syncers, the background manager and the storage layer only
//! see the re-exported primitives below, which keeps the executor choice in a
//! single place.
//!
//! # Modules
//!
//! - `task`: spawning background sync passes
//! - `time`: sleeps, timeouts and wall-clock helpers
//! - `sync`: mutexes, semaphores, watch channels and cancellation tokens
//!
//! # Examples
//!
//! ```rust
//! use core_async::task;
//! use core_async::time::{sleep, Duration};
//!
//! async fn example() {
//!     let handle = task::spawn(async {
//!         sleep(Duration::from_millis(10)).await;
//!         42
//!     });
//!     assert_eq!(handle.await.unwrap(), 42);
//! }
//! ```

// Entry-point/test macros so downstream crates never need direct Tokio
// dependencies.
pub use core_async_macros::{main, test};

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
