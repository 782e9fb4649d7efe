//! Synchronization primitives.
//!
//! The background syncer manager guards `start()` with a binary [`Semaphore`],
//! sub-syncers publish their activity over [`watch`] channels and observe stop
//! requests through a [`CancellationToken`].
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::Semaphore;
//!
//! async fn example() {
//!     let guard = Semaphore::new(1);
//!     let _permit = guard.acquire().await.unwrap();
//!     // single entrant section
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, AcquireError, Mutex, MutexGuard, Notify, OwnedSemaphorePermit,
    RwLock, RwLockReadGuard, RwLockWriteGuard, Semaphore, SemaphorePermit,
};

pub use tokio_util::sync::CancellationToken;
