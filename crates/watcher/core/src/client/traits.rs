use super::ChainClientError;
use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use paywatch_types::{BlockRef, ChainBlock, NativeTransfer, TransferLog, TransferReceipt};
use std::{fmt::Debug, sync::Arc};

/// Read access to an EVM chain.
///
/// Every call is fallible and may be retried by the caller.
#[async_trait]
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait ChainClient: Debug + Send + Sync {
    /// Returns the current tip height.
    async fn block_number(&self) -> Result<u64, ChainClientError>;

    /// Returns hash and parent hash of block `number`.
    async fn block_ref(&self, number: u64) -> Result<BlockRef, ChainClientError>;

    /// Returns block `number` together with its transactions.
    async fn block_with_transactions(&self, number: u64) -> Result<ChainBlock, ChainClientError>;

    /// Returns the token `Transfer` logs emitted by `contracts` in blocks `from..=to`.
    async fn transfer_logs(
        &self,
        from: u64,
        to: u64,
        contracts: &[Address],
    ) -> Result<Vec<TransferLog>, ChainClientError>;

    /// Fetches a transaction by hash. `None` if the node does not know it.
    async fn transaction(&self, hash: B256) -> Result<Option<NativeTransfer>, ChainClientError>;

    /// Fetches a transaction receipt by hash. `None` if the transaction is not mined.
    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransferReceipt>, ChainClientError>;
}

/// Builds [`ChainClient`]s for configured RPC endpoints.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait ChainClientFactory: Debug + Send + Sync {
    /// Connects to `rpc_url` of chain `chain_id`.
    fn connect(
        &self,
        chain_id: u64,
        rpc_url: &str,
    ) -> Result<Arc<dyn ChainClient>, ChainClientError>;
}
