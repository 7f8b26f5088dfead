//! Access to the JSON-RPC endpoint of a watched chain.

mod error;
pub use error::ChainClientError;

mod metrics;
pub(crate) use metrics::Metrics;

mod rpc;
pub use rpc::{RpcChainClient, RpcChainClientFactory};

mod traits;
pub use traits::{ChainClient, ChainClientFactory};
