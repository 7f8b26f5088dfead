//! Token transfer events and receipts.

use alloy_primitives::{Address, B256, Log, U256};
use alloy_sol_types::{SolEvent, sol};
use serde::{Deserialize, Serialize};

sol! {
    /// @notice Emitted by token contracts when `value` tokens move from `from` to `to`.
    #[derive(Debug, PartialEq, Eq)]
    event Transfer(address indexed from, address indexed to, uint256 value);
}

/// A decoded token [`Transfer`] log together with its position on chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferLog {
    /// The token contract that emitted the log.
    pub contract: Address,
    /// The token sender.
    pub from: Address,
    /// The token recipient.
    pub to: Address,
    /// The transferred amount in token base units.
    pub value: U256,
    /// Hash of the transaction that emitted the log.
    pub transaction_hash: B256,
    /// The block the log was included in.
    pub block_number: u64,
    /// Index of the log within the block.
    pub log_index: u64,
    /// Set by the node when the log was dropped from the canonical chain by a reorg.
    pub removed: bool,
}

impl TransferLog {
    /// Decodes a raw [`Log`] as a token [`Transfer`].
    ///
    /// Returns `None` if the log is not a `Transfer(address,address,uint256)` event.
    pub fn decode(
        log: &Log,
        transaction_hash: B256,
        block_number: u64,
        log_index: u64,
        removed: bool,
    ) -> Option<Self> {
        let decoded = Transfer::decode_log(log).ok()?;
        Some(Self {
            contract: log.address,
            from: decoded.data.from,
            to: decoded.data.to,
            value: decoded.data.value,
            transaction_hash,
            block_number,
            log_index,
            removed,
        })
    }
}

/// The parts of a transaction receipt the reconciler validates payments against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    /// The transaction hash.
    pub transaction_hash: B256,
    /// The block the transaction was mined in.
    pub block_number: Option<u64>,
    /// Whether execution succeeded.
    pub success: bool,
    /// All token transfer logs emitted by the transaction.
    pub logs: Vec<TransferLog>,
}

impl TransferReceipt {
    /// Finds the transfer log at `log_index`.
    pub fn log_at(&self, log_index: u64) -> Option<&TransferLog> {
        self.logs.iter().find(|log| log.log_index == log_index)
    }
}
