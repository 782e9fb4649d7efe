//! Alert surface for logged failures.

use serde::{Deserialize, Serialize};

/// How a logged event should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertSeverity {
    Info,
    Error,
    ApiError,
}

/// Popup content handed to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub topic: String,
    pub message: String,
    pub severity: AlertSeverity,
}

/// Host UI collaborator that can show a dismissible popup.
///
/// Implementations are expected to hop to their UI thread themselves; the
/// event logger calls this from whichever task reported the failure.
pub trait AlertDisplayer: Send + Sync {
    fn display(&self, alert: Alert);
}
