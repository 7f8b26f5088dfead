use thiserror::Error;

/// Errors that may occur while interacting with paywatch storage.
///
/// This enum is used across all implementations of the storage traits.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing a settings file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A stored record could not be encoded or decoded.
    #[error(transparent)]
    Serde(#[from] serde_json::Error),

    /// A lock guarding in-memory state was poisoned.
    #[error("lock poisoned")]
    LockPoisoned,

    /// The settings key cannot be mapped to a file name.
    #[error("invalid settings key: {0}")]
    InvalidKey(String),

    /// The referenced invoice does not exist.
    #[error("invoice not found: {0}")]
    InvoiceNotFound(String),
}

impl PartialEq for StorageError {
    fn eq(&self, other: &Self) -> bool {
        use StorageError::*;
        match (self, other) {
            (Io(a), Io(b)) => a.kind() == b.kind(),
            (Serde(a), Serde(b)) => a.to_string() == b.to_string(),
            (LockPoisoned, LockPoisoned) => true,
            (InvalidKey(a), InvalidKey(b)) | (InvoiceNotFound(a), InvoiceNotFound(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for StorageError {}
