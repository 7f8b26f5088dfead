use crate::client::ChainClientError;
use paywatch_storage::StorageError;
use thiserror::Error;

/// Errors returned by the [`PaymentReconciler`](super::PaymentReconciler).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcilerError {
    /// The invoice store failed.
    #[error(transparent)]
    StorageError(#[from] StorageError),

    /// The chain could not be queried.
    #[error(transparent)]
    ChainClientError(#[from] ChainClientError),
}
