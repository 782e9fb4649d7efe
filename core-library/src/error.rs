use thiserror::Error;

/// SQLite primary result codes that mean the database file itself is damaged.
const SQLITE_CORRUPT: i32 = 11;
const SQLITE_NOTADB: i32 = 26;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// The store file is damaged. Syncing must stop until the library is
    /// rebuilt.
    #[error("Library store is corrupted: {0}")]
    StoreCorrupted(String),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LibraryError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, LibraryError::StoreCorrupted(_))
    }
}

impl From<sqlx::Error> for LibraryError {
    fn from(err: sqlx::Error) -> Self {
        if is_corruption(&err) {
            LibraryError::StoreCorrupted(err.to_string())
        } else {
            LibraryError::Database(err)
        }
    }
}

fn is_corruption(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db_err) = err else {
        return false;
    };

    db_err
        .code()
        .and_then(|code| code.parse::<i32>().ok())
        // Extended result codes carry the primary code in the low byte.
        .map(|code| matches!(code & 0xff, SQLITE_CORRUPT | SQLITE_NOTADB))
        .unwrap_or(false)
}

pub type Result<T> = std::result::Result<T, LibraryError>;
