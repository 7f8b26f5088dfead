use super::{ChainClient, ChainClientError, ChainClientFactory, Metrics};
use alloy_eips::BlockNumberOrTag;
use alloy_network::{Ethereum, ReceiptResponse, TransactionResponse};
use alloy_primitives::{Address, B256};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types_eth::{Block, Filter, Log, Transaction, TransactionReceipt};
use alloy_sol_types::SolEvent;
use async_trait::async_trait;
use paywatch_metrics::observe_call_async;
use paywatch_types::{BlockRef, ChainBlock, NativeTransfer, Transfer, TransferLog, TransferReceipt};
use std::sync::Arc;
use tracing::{trace, warn};
use url::Url;

/// A [`ChainClient`] backed by an alloy [`RootProvider`].
#[derive(Debug, Clone)]
pub struct RpcChainClient {
    chain_id: u64,
    provider: RootProvider<Ethereum>,
    metrics_enabled: bool,
}

impl RpcChainClient {
    /// Creates a client over an existing provider.
    pub const fn new(chain_id: u64, provider: RootProvider<Ethereum>) -> Self {
        Self { chain_id, provider, metrics_enabled: false }
    }

    /// Connects to an HTTP JSON-RPC endpoint.
    pub fn new_http(chain_id: u64, rpc_url: &str) -> Result<Self, ChainClientError> {
        let url = Url::parse(rpc_url).map_err(|err| ChainClientError::InvalidUrl {
            url: rpc_url.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ChainClientError::InvalidUrl {
                url: rpc_url.to_string(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }
        Ok(Self::new(chain_id, RootProvider::<Ethereum>::new_http(url)))
    }

    /// Enables call metrics.
    pub fn with_metrics(mut self) -> Self {
        Metrics::init(self.chain_id);
        self.metrics_enabled = true;
        self
    }

    async fn observe<T, F>(&self, call: &'static str, f: F) -> Result<T, ChainClientError>
    where
        F: Future<Output = Result<T, ChainClientError>>,
    {
        let result = if self.metrics_enabled {
            observe_call_async!(
                Metrics::RPC_CALLS_TOTAL,
                Metrics::RPC_CALL_DURATION_SECONDS,
                call,
                f,
                "chain_id" => self.chain_id.to_string()
            )
        } else {
            f.await
        };

        result.inspect_err(|err| {
            warn!(target: "paywatch::chain_client", chain_id = self.chain_id, call, %err, "RPC call failed");
        })
    }

    async fn block(&self, number: u64, full: bool) -> Result<Block, ChainClientError> {
        let request = self.provider.get_block_by_number(BlockNumberOrTag::Number(number));
        let block = if full { request.full().await } else { request.await };
        block.map_err(rpc_error)?.ok_or(ChainClientError::BlockNotFound(number))
    }
}

fn rpc_error(err: impl std::fmt::Display) -> ChainClientError {
    ChainClientError::Rpc(err.to_string())
}

fn block_ref(block: &Block) -> BlockRef {
    BlockRef::new(block.header.number, block.header.hash, block.header.parent_hash)
}

fn native_transfer(tx: &Transaction) -> NativeTransfer {
    NativeTransfer {
        hash: TransactionResponse::tx_hash(tx),
        from: TransactionResponse::from(tx),
        to: alloy_consensus::Transaction::to(tx),
        value: alloy_consensus::Transaction::value(tx),
        block_number: tx.block_number,
    }
}

fn transfer_log(log: &Log) -> Option<TransferLog> {
    TransferLog::decode(
        &log.inner,
        log.transaction_hash?,
        log.block_number?,
        log.log_index?,
        log.removed,
    )
}

fn transfer_receipt(receipt: &TransactionReceipt) -> TransferReceipt {
    TransferReceipt {
        transaction_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
        success: ReceiptResponse::status(receipt),
        logs: receipt.inner.logs().iter().filter_map(transfer_log).collect(),
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn block_number(&self) -> Result<u64, ChainClientError> {
        self.observe(Metrics::CALL_BLOCK_NUMBER, async {
            self.provider.get_block_number().await.map_err(rpc_error)
        })
        .await
    }

    async fn block_ref(&self, number: u64) -> Result<BlockRef, ChainClientError> {
        self.observe(Metrics::CALL_BLOCK_REF, async {
            self.block(number, false).await.map(|block| block_ref(&block))
        })
        .await
    }

    async fn block_with_transactions(&self, number: u64) -> Result<ChainBlock, ChainClientError> {
        self.observe(Metrics::CALL_BLOCK_WITH_TRANSACTIONS, async {
            let block = self.block(number, true).await?;
            let transactions = block.transactions.txns().map(native_transfer).collect();
            Ok(ChainBlock { block: block_ref(&block), transactions })
        })
        .await
    }

    async fn transfer_logs(
        &self,
        from: u64,
        to: u64,
        contracts: &[Address],
    ) -> Result<Vec<TransferLog>, ChainClientError> {
        if contracts.is_empty() {
            return Ok(Vec::new());
        }

        let filter = Filter::new()
            .from_block(from)
            .to_block(to)
            .address(contracts.to_vec())
            .event_signature(Transfer::SIGNATURE_HASH);

        self.observe(Metrics::CALL_TRANSFER_LOGS, async {
            let logs = self.provider.get_logs(&filter).await.map_err(rpc_error)?;
            trace!(
                target: "paywatch::chain_client",
                chain_id = self.chain_id,
                from,
                to,
                count = logs.len(),
                "Fetched transfer logs"
            );
            Ok(logs.iter().filter_map(transfer_log).collect())
        })
        .await
    }

    async fn transaction(&self, hash: B256) -> Result<Option<NativeTransfer>, ChainClientError> {
        self.observe(Metrics::CALL_TRANSACTION, async {
            let tx = self.provider.get_transaction_by_hash(hash).await.map_err(rpc_error)?;
            Ok(tx.as_ref().map(native_transfer))
        })
        .await
    }

    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransferReceipt>, ChainClientError> {
        self.observe(Metrics::CALL_TRANSACTION_RECEIPT, async {
            let receipt = self.provider.get_transaction_receipt(hash).await.map_err(rpc_error)?;
            Ok(receipt.as_ref().map(transfer_receipt))
        })
        .await
    }
}

/// Connects [`RpcChainClient`]s over HTTP.
#[derive(Debug, Clone, Copy, Default)]
pub struct RpcChainClientFactory {
    metrics_enabled: bool,
}

impl RpcChainClientFactory {
    /// Enables call metrics on every client created by the factory.
    pub const fn with_metrics(mut self) -> Self {
        self.metrics_enabled = true;
        self
    }
}

impl ChainClientFactory for RpcChainClientFactory {
    fn connect(
        &self,
        chain_id: u64,
        rpc_url: &str,
    ) -> Result<Arc<dyn ChainClient>, ChainClientError> {
        let client = RpcChainClient::new_http(chain_id, rpc_url)?;
        let client = if self.metrics_enabled { client.with_metrics() } else { client };
        Ok(Arc::new(client))
    }
}
