//! # Event Bus System
//!
//! Broadcast channel used by the sync engine to tell UI collaborators that
//! something in the library changed.
//!
//! ## Overview
//!
//! - **Event Types**: `CoreEvent` wrapping `SyncEvent` and `LibraryEvent`
//! - **EventBus**: cloneable publisher backed by a broadcast channel
//! - **EventStream**: receiver wrapper with optional filtering
//!
//! ```text
//! ┌────────────────┐    emit     ┌──────────┐   subscribe   ┌────────────┐
//! │ Syncer Manager ├────────────>│          ├──────────────>│ UI refresh │
//! └────────────────┘             │ EventBus │               └────────────┘
//! ┌────────────────┐    emit     │          │   subscribe   ┌────────────┐
//! │ Auto-Download  ├────────────>│          ├──────────────>│ Notifier   │
//! └────────────────┘             └──────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SyncEvent, SyncStage};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Sync(SyncEvent::StageCompleted {
//!         stage: SyncStage::Artwork,
//!     }))
//!     .ok();
//! assert!(subscriber.try_recv().is_ok());
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it can keep
//!   receiving.
//! - **`RecvError::Closed`**: every sender was dropped; treat as shutdown.
//!
//! Emitting with no subscribers returns an error which publishers ignore.

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published through the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Sync(SyncEvent),
    Library(LibraryEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::StageFailed { fatal: true, .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::StageFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::PassCompleted { .. }) => EventSeverity::Info,
            CoreEvent::Library(LibraryEvent::SyncVersionChanged { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Sync Events
// ============================================================================

/// A stage of one background sync pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    Artwork,
    Library,
    VersionResync,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncStage::Artwork => "artwork",
            SyncStage::Library => "library",
            SyncStage::VersionResync => "version_resync",
        };
        f.write_str(label)
    }
}

/// Events emitted by the background syncer manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// A background pass was spawned.
    PassStarted,
    /// One stage of the pass finished without error.
    StageCompleted { stage: SyncStage },
    /// One stage failed. Later stages still run unless `fatal` is set.
    StageFailed {
        stage: SyncStage,
        message: String,
        fatal: bool,
    },
    /// The pass finished; `cancelled` is set when a stop request cut it short.
    PassCompleted { cancelled: bool },
    /// The manager was stopped.
    Stopped,
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::PassStarted => "Sync pass started",
            SyncEvent::StageCompleted { .. } => "Sync stage completed",
            SyncEvent::StageFailed { .. } => "Sync stage failed",
            SyncEvent::PassCompleted { .. } => "Sync pass completed",
            SyncEvent::Stopped => "Syncing stopped",
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Events describing structural changes to the local library.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// The artwork id fixup finished.
    ArtworkFixupCompleted { deleted: u64, merged: u64 },
    /// The persisted library sync version changed.
    SyncVersionChanged { from: i64, to: i64 },
    /// Playables were handed to the downloader.
    PlayablesQueued { count: usize },
    /// Every row of the library was deleted.
    StorageCleaned,
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::ArtworkFixupCompleted { .. } => "Artwork fixup completed",
            LibraryEvent::SyncVersionChanged { .. } => "Library sync version changed",
            LibraryEvent::PlayablesQueued { .. } => "Playables queued for download",
            LibraryEvent::StorageCleaned => "Library storage cleaned",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central publisher. Clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive a matching event without waiting.
    ///
    /// Returns `None` if no matching event is currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    fn matches(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[core_async::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(CoreEvent::Sync(SyncEvent::PassStarted)).is_err());
    }

    #[core_async::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let event = CoreEvent::Library(LibraryEvent::PlayablesQueued { count: 3 });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[core_async::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Library(_)));

        bus.emit(CoreEvent::Sync(SyncEvent::PassStarted)).ok();
        let wanted = CoreEvent::Library(LibraryEvent::StorageCleaned);
        bus.emit(wanted.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), wanted);
        assert!(stream.try_recv().is_none());
    }

    #[core_async::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for count in 0..5 {
            bus.emit(CoreEvent::Library(LibraryEvent::PlayablesQueued { count }))
                .ok();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let fatal = CoreEvent::Sync(SyncEvent::StageFailed {
            stage: SyncStage::Library,
            message: "database disk image is malformed".to_string(),
            fatal: true,
        });
        assert_eq!(fatal.severity(), EventSeverity::Error);

        let recoverable = CoreEvent::Sync(SyncEvent::StageFailed {
            stage: SyncStage::Artwork,
            message: "timeout".to_string(),
            fatal: false,
        });
        assert_eq!(recoverable.severity(), EventSeverity::Warning);

        let done = CoreEvent::Sync(SyncEvent::PassCompleted { cancelled: false });
        assert_eq!(done.severity(), EventSeverity::Info);
        assert_eq!(done.description(), "Sync pass completed");

        let queued = CoreEvent::Library(LibraryEvent::PlayablesQueued { count: 1 });
        assert_eq!(queued.severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Library(LibraryEvent::SyncVersionChanged { from: 0, to: 3 });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("SyncVersionChanged"));

        let deserialized: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, event);
    }

    #[core_async::test]
    async fn test_concurrent_publishers() {
        let bus = EventBus::new(100);
        let mut sub = bus.subscribe();

        let bus1 = bus.clone();
        let bus2 = bus.clone();
        let handle1 = core_async::spawn(async move {
            for _ in 0..10 {
                bus1.emit(CoreEvent::Sync(SyncEvent::PassStarted)).ok();
            }
        });
        let handle2 = core_async::spawn(async move {
            for count in 0..10 {
                bus2.emit(CoreEvent::Library(LibraryEvent::PlayablesQueued { count }))
                    .ok();
            }
        });
        handle1.await.ok();
        handle2.await.ok();

        let mut count = 0;
        while sub.try_recv().is_ok() {
            count += 1;
        }
        assert_eq!(count, 20);
    }
}
