/// All errors that can be returned by a GraphStore implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// No graph with the given descriptor id exists in the store.
    #[error("graph not found: {id}")]
    NotFound { id: String },

    /// A graph with this descriptor id is already stored.
    #[error("graph already exists: {id}")]
    AlreadyExists { id: String },

    /// The id cannot be used as a storage key (empty, or contains path
    /// separators or other characters outside `[A-Za-z0-9._-]`).
    #[error("invalid graph id: {id:?}")]
    InvalidId { id: String },

    /// A stored document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A backend-specific storage error (I/O, connection, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
