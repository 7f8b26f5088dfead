//! Block and transaction views used by the watcher.

use alloy_primitives::{Address, B256, U256};
use derive_more::Constructor;
use serde::{Deserialize, Serialize};

/// Number, hash and parent hash of a block.
///
/// This is the minimal view the progress tracker needs to detect reorgs: a block whose
/// `parent_hash` does not match the hash recorded for its predecessor was built on a chain we
/// did not index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Constructor)]
#[serde(rename_all = "camelCase")]
pub struct BlockRef {
    /// The block number.
    pub number: u64,
    /// The block hash.
    pub hash: B256,
    /// Hash of the parent block.
    pub parent_hash: B256,
}

/// A native value transfer, i.e. a plain transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeTransfer {
    /// The transaction hash.
    pub hash: B256,
    /// The sender.
    pub from: Address,
    /// The recipient, `None` for contract creations.
    pub to: Option<Address>,
    /// The transferred value in wei.
    pub value: U256,
    /// The block the transaction was mined in, `None` while pending.
    pub block_number: Option<u64>,
}

impl NativeTransfer {
    /// Returns `true` if the transaction pays `address`.
    pub fn is_to(&self, address: &Address) -> bool {
        self.to.as_ref() == Some(address)
    }
}

/// A block together with its transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainBlock {
    /// The block header view.
    pub block: BlockRef,
    /// All transactions of the block.
    pub transactions: Vec<NativeTransfer>,
}
