use crate::api::ResponseError;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The server answered with an error envelope.
    #[error("{0}")]
    Api(ResponseError),

    /// The server answer could not be understood.
    #[error("Failed to parse server response: {0}")]
    Parse(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Settings error: {0}")]
    Settings(#[from] core_runtime::Error),

    #[error("Download error: {0}")]
    Download(#[from] bridge_traits::BridgeError),
}

impl SyncError {
    /// Whether syncing must stop until the library is rebuilt.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Library(e) if e.is_fatal())
    }
}

impl From<ResponseError> for SyncError {
    fn from(err: ResponseError) -> Self {
        SyncError::Api(err)
    }
}

impl From<quick_xml::Error> for SyncError {
    fn from(err: quick_xml::Error) -> Self {
        SyncError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
