use crate::client::ChainClientError;
use paywatch_storage::StorageError;
use thiserror::Error;

/// Errors returned by the [`ChainSupervisor`](super::ChainSupervisor).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SupervisorError {
    /// The chain has no configured currency.
    #[error("unsupported chain {0}")]
    UnsupportedChain(u64),

    /// The configured RPC URL was rejected. The chain stays unconfigured.
    #[error("invalid rpc url {url} for chain {chain_id}: {reason}")]
    InvalidRpcUrl {
        /// The chain.
        chain_id: u64,
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Connecting to the chain failed.
    #[error(transparent)]
    ChainClientError(#[from] ChainClientError),

    /// Reading or writing settings failed.
    #[error(transparent)]
    StorageError(#[from] StorageError),
}
