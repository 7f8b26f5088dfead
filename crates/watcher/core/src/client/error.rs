use thiserror::Error;

/// Errors returned by a [`ChainClient`](super::ChainClient).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainClientError {
    /// The RPC call failed, e.g. the endpoint is unreachable or returned an error.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// The endpoint does not know the requested block (yet).
    #[error("block {0} not found")]
    BlockNotFound(u64),

    /// The RPC URL cannot be parsed.
    #[error("invalid rpc url {url}: {reason}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}
