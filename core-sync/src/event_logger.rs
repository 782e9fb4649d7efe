//! # Event Logger
//!
//! Persists one [`LogEntry`](core_library::LogEntry) per reported event and
//! optionally forwards a popup to the host's [`AlertDisplayer`].
//!
//! Reporting never fails: a log entry that cannot be written is traced and
//! dropped, so callers can report from any error path. Server URLs in the
//! message lose their credentials before they are stored or shown.

use crate::api::ResponseError;
use crate::error::SyncError;
use bridge_traits::{Alert, AlertDisplayer, AlertSeverity};
use core_library::{LibraryStorage, LogEntryType};
use core_runtime::logging::redact_text;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

const API_ERROR_TOPIC: &str = "API Error";

/// Status codes stored with locally produced log entries. API errors store
/// the server's own status code instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum LogStatusCode {
    DownloadError = 1,
    PlayerError = 2,
    EmailError = 3,
    InternalError = 4,
    ConnectionError = 5,
    CommonError = 6,
    Info = 7,
}

impl LogStatusCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

pub struct EventLogger {
    pool: SqlitePool,
    alert_displayer: Option<Arc<dyn AlertDisplayer>>,
    suppress_alerts: AtomicBool,
}

impl EventLogger {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            alert_displayer: None,
            suppress_alerts: AtomicBool::new(false),
        }
    }

    pub fn with_alert_displayer(mut self, displayer: Arc<dyn AlertDisplayer>) -> Self {
        self.alert_displayer = Some(displayer);
        self
    }

    /// Keep logging but stop forwarding popups, e.g. while a modal flow is
    /// on screen.
    pub fn set_suppress_alerts(&self, suppress: bool) {
        self.suppress_alerts.store(suppress, Ordering::SeqCst);
    }

    pub fn suppresses_alerts(&self) -> bool {
        self.suppress_alerts.load(Ordering::SeqCst)
    }

    pub async fn info(&self, topic: &str, message: &str, display_popup: bool) {
        self.report_status(topic, LogStatusCode::Info, message, LogEntryType::Info, display_popup)
            .await;
    }

    pub async fn error(
        &self,
        topic: &str,
        status_code: LogStatusCode,
        message: &str,
        display_popup: bool,
    ) {
        self.report_status(topic, status_code, message, LogEntryType::Error, display_popup)
            .await;
    }

    /// Report a failed operation. API errors are logged under their own
    /// topic with the server's status code.
    pub async fn report(&self, topic: &str, err: &SyncError, display_popup: bool) {
        if let SyncError::Api(api_error) = err {
            return self.report_api_error(api_error, display_popup).await;
        }

        let message = err.to_string();
        self.save_and_display(
            topic,
            LogEntryType::Error,
            0,
            &format!("{topic}: {message}"),
            display_popup,
            &message,
        )
        .await;
    }

    pub async fn report_api_error(&self, err: &ResponseError, display_popup: bool) {
        let popup = format!("Status code: {}\n{}", err.status_code, err.message);
        self.save_and_display(
            API_ERROR_TOPIC,
            LogEntryType::ApiError,
            err.status_code,
            &err.to_string(),
            display_popup,
            &popup,
        )
        .await;
    }

    async fn report_status(
        &self,
        topic: &str,
        status_code: LogStatusCode,
        message: &str,
        entry_type: LogEntryType,
        display_popup: bool,
    ) {
        self.save_and_display(
            topic,
            entry_type,
            status_code.code(),
            &format!("{topic}: {message}"),
            display_popup,
            message,
        )
        .await;
    }

    async fn save_and_display(
        &self,
        topic: &str,
        entry_type: LogEntryType,
        status_code: i32,
        message: &str,
        display_popup: bool,
        popup_message: &str,
    ) {
        let message = redact_text(message);
        match entry_type {
            LogEntryType::Info => info!(topic, status_code, "{message}"),
            LogEntryType::Error | LogEntryType::ApiError => {
                error!(topic, status_code, "{message}")
            }
        }

        let mut library = LibraryStorage::new(self.pool.clone());
        let saved = async {
            library
                .create_log_entry(topic, status_code, &message, entry_type)
                .await?;
            library.save_context().await
        }
        .await;
        if let Err(e) = saved {
            warn!(topic, error = %e, "Failed to persist log entry");
        }

        if display_popup {
            self.display_alert(topic, &redact_text(popup_message), entry_type);
        }
    }

    fn display_alert(&self, topic: &str, message: &str, entry_type: LogEntryType) {
        let Some(displayer) = &self.alert_displayer else {
            return;
        };
        if self.suppresses_alerts() {
            return;
        }

        let severity = match entry_type {
            LogEntryType::Info => AlertSeverity::Info,
            LogEntryType::Error => AlertSeverity::Error,
            LogEntryType::ApiError => AlertSeverity::ApiError,
        };
        displayer.display(Alert {
            topic: topic.to_string(),
            message: message.to_string(),
            severity,
        });
    }
}

impl std::fmt::Debug for EventLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogger")
            .field("has_alert_displayer", &self.alert_displayer.is_some())
            .field("suppress_alerts", &self.suppresses_alerts())
            .finish()
    }
}
