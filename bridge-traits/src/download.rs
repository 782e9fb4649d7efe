//! Download manager capability.
//!
//! The engine decides *what* to cache; the host's download manager performs
//! the transfer and later hands the bytes back through the library store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Kind of playable a download refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DownloadKind {
    Song,
    PodcastEpisode,
}

/// A single playable to fetch into the local cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Remote id of the playable
    pub remote_id: String,
    pub kind: DownloadKind,
    /// Display title, used by hosts for progress UI
    pub title: String,
}

impl DownloadRequest {
    pub fn new(kind: DownloadKind, remote_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            remote_id: remote_id.into(),
            kind,
            title: title.into(),
        }
    }
}

/// Fire-and-forget download enqueueing.
///
/// Implementations must return once the requests are queued; transfer
/// progress and failures are the download manager's own concern.
#[async_trait]
pub trait PlayableDownloader: Send + Sync {
    /// Enqueue a batch of playables.
    async fn download_all(&self, requests: Vec<DownloadRequest>) -> Result<()>;

    /// Enqueue one playable.
    async fn download(&self, request: DownloadRequest) -> Result<()> {
        self.download_all(vec![request]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_async::sync::Mutex;

    #[derive(Default)]
    struct RecordingDownloader {
        queued: Mutex<Vec<DownloadRequest>>,
    }

    #[async_trait]
    impl PlayableDownloader for RecordingDownloader {
        async fn download_all(&self, requests: Vec<DownloadRequest>) -> Result<()> {
            self.queued.lock().await.extend(requests);
            Ok(())
        }
    }

    #[core_async::test]
    async fn test_single_download_goes_through_batch() {
        let downloader = RecordingDownloader::default();
        downloader
            .download(DownloadRequest::new(DownloadKind::Song, "s-1", "Intro"))
            .await
            .unwrap();

        let queued = downloader.queued.lock().await;
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].remote_id, "s-1");
        assert_eq!(queued[0].kind, DownloadKind::Song);
    }
}
