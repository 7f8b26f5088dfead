use crate::client::ChainClientError;
use paywatch_storage::StorageError;
use thiserror::Error;

/// Errors returned by the [`ProgressTracker`](super::ProgressTracker).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProgressError {
    /// Reading or writing the progress record failed.
    #[error(transparent)]
    StorageError(#[from] StorageError),

    /// A block needed to verify the retained history could not be fetched.
    #[error("block {number} unavailable: {source}")]
    BlockUnavailable {
        /// The block that could not be fetched.
        number: u64,
        /// The last fetch error.
        #[source]
        source: ChainClientError,
    },

    /// Every retained block was orphaned; the fork point lies before the retained window.
    #[error("reorg of depth {depth} exceeds the retained block history")]
    ReorgExceedsRetainedHistory {
        /// Number of retained blocks found orphaned.
        depth: usize,
    },
}
