use crate::{client::ChainClientError, progress::ProgressError};
use thiserror::Error;

/// Errors aborting one watcher cycle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WatcherError {
    /// The chain could not be queried.
    #[error(transparent)]
    ChainClientError(#[from] ChainClientError),

    /// The processed block history could not be read or repaired.
    #[error(transparent)]
    ProgressError(#[from] ProgressError),
}
