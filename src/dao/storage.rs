use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by room store backends regardless of the underlying transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The client's link to the store is down; nothing was written.
    #[error("room store disconnected while accessing `{path}`")]
    Disconnected {
        /// Store path the failed operation targeted.
        path: String,
    },
}

impl StorageError {
    /// Construct a disconnected error for the given store path.
    pub fn disconnected(path: impl Into<String>) -> Self {
        StorageError::Disconnected { path: path.into() }
    }
}
