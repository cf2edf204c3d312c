//! Error types for the PocketLists core library.

use thiserror::Error;

/// All errors that can occur within the PocketLists core library.
#[derive(Debug, Error)]
pub enum PocketListsError {
    /// The identifier has no live document in the collection.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// A write presented a revision that no longer matches the stored document.
    #[error("Document update conflict: {0}")]
    Conflict(String),

    /// A list with this name already exists.
    #[error("A list named '{0}' already exists")]
    DuplicateName(String),

    /// Removing the items of a list failed; the list itself was not deleted.
    #[error("Failed to delete the items of list '{list_id}': {reason}")]
    CascadeDelete { list_id: String, reason: String },

    /// The store rejected a write for a reason other than a revision conflict.
    #[error("Failed to write document: {0}")]
    StoreWrite(String),

    /// The underlying store could not be reached or failed internally.
    #[error("Document store unavailable: {0}")]
    StoreUnavailable(String),

    /// A query pinned to a declared index found the index missing.
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// The current platform does not provide the requested capability.
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// Stored document fields could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O operation on the filesystem failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias that pins the error type to [`PocketListsError`].
pub type Result<T> = std::result::Result<T, PocketListsError>;

impl From<rusqlite::Error> for PocketListsError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => Self::NotFound("no matching row".to_string()),
            rusqlite::Error::SqliteFailure(_, Some(ref msg)) if is_index_message(msg) => {
                Self::IndexUnavailable(msg.clone())
            }
            rusqlite::Error::SqlInputError { ref msg, .. } if is_index_message(msg) => {
                Self::IndexUnavailable(msg.clone())
            }
            other => Self::StoreUnavailable(other.to_string()),
        }
    }
}

fn is_index_message(msg: &str) -> bool {
    msg.starts_with("no such index") || msg.starts_with("no query solution")
}

impl PocketListsError {
    /// Returns `true` for [`PocketListsError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` for [`PocketListsError::Conflict`].
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns a short, human-readable message suitable for display to the end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(_) => "This entry no longer exists".to_string(),
            Self::Conflict(_) => {
                "This entry was changed somewhere else, reload it and try again".to_string()
            }
            Self::DuplicateName(name) => format!("There is already a list named \"{name}\""),
            Self::CascadeDelete { list_id, .. } => {
                format!("Could not delete the items of \"{list_id}\", the list was kept")
            }
            Self::StoreWrite(e) => format!("Failed to save: {e}"),
            Self::StoreUnavailable(e) => format!("Storage is not available: {e}"),
            Self::IndexUnavailable(_) => "Storage is still getting ready, try again".to_string(),
            Self::CapabilityUnavailable(what) => format!("{what} is not available on this device"),
            Self::Json(e) => format!("Data format error: {e}"),
            Self::Io(e) => format!("File error: {e}"),
        }
    }
}
