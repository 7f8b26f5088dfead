//! Test doubles shared by the unit tests of this crate.

use crate::{
    client::{ChainClient, ChainClientError, ChainClientFactory},
    reservation::{AddressReserver, ReservationError},
};
use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use mockall::mock;
use paywatch_storage::{SettingsStore, StorageError};
use paywatch_types::{
    BlockRef, ChainBlock, NativeTransfer, ReservedAddress, TransferLog, TransferReceipt,
};
use serde_json::Value;
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex},
};

mock! {
    #[derive(Debug)]
    pub Client {}

    #[async_trait]
    impl ChainClient for Client {
        async fn block_number(&self) -> Result<u64, ChainClientError>;
        async fn block_ref(&self, number: u64) -> Result<BlockRef, ChainClientError>;
        async fn block_with_transactions(&self, number: u64) -> Result<ChainBlock, ChainClientError>;
        async fn transfer_logs(
            &self,
            from: u64,
            to: u64,
            contracts: &[Address],
        ) -> Result<Vec<TransferLog>, ChainClientError>;
        async fn transaction(&self, hash: B256) -> Result<Option<NativeTransfer>, ChainClientError>;
        async fn transaction_receipt(
            &self,
            hash: B256,
        ) -> Result<Option<TransferReceipt>, ChainClientError>;
    }
}

mock! {
    #[derive(Debug)]
    pub Settings {}

    impl SettingsStore for Settings {
        fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
        fn put(&self, key: &str, value: Value) -> Result<(), StorageError>;
    }
}

mock! {
    #[derive(Debug)]
    pub Factory {}

    impl ChainClientFactory for Factory {
        fn connect(
            &self,
            chain_id: u64,
            rpc_url: &str,
        ) -> Result<Arc<dyn ChainClient>, ChainClientError>;
    }
}

mock! {
    #[derive(Debug)]
    pub Reserver {}

    #[async_trait]
    impl AddressReserver for Reserver {
        async fn reserve(
            &self,
            store_id: &str,
            currency: &str,
        ) -> Result<ReservedAddress, ReservationError>;
    }
}

/// Deterministic hash of block `number` on fork `fork`.
pub(crate) fn block_hash(fork: u8, number: u64) -> B256 {
    let mut bytes = B256::from(U256::from(number)).0;
    bytes[0] = fork;
    B256::from(bytes)
}

#[derive(Debug, Default)]
struct ChainState {
    tip: u64,
    blocks: BTreeMap<u64, ChainBlock>,
    logs: Vec<TransferLog>,
    transactions: HashMap<B256, NativeTransfer>,
    receipts: HashMap<B256, TransferReceipt>,
    unavailable: HashSet<u64>,
    offline: bool,
}

/// An in-memory chain serving [`ChainClient`] calls.
///
/// Blocks are created on demand on fork `0` until [`FakeChain::reorg`] replaces a range.
#[derive(Debug, Default)]
pub(crate) struct FakeChain {
    state: Mutex<ChainState>,
}

impl FakeChain {
    pub(crate) fn with_tip(tip: u64) -> Self {
        let chain = Self::default();
        chain.set_tip(tip);
        chain
    }

    pub(crate) fn set_tip(&self, tip: u64) {
        self.state.lock().unwrap().tip = tip;
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    /// Makes `number` unfetchable.
    pub(crate) fn make_unavailable(&self, number: u64) {
        self.state.lock().unwrap().unavailable.insert(number);
    }

    /// Replaces blocks `from..=to` with blocks of fork `fork`.
    pub(crate) fn reorg(&self, from: u64, to: u64, fork: u8) {
        let mut state = self.state.lock().unwrap();
        for number in from..=to {
            let parent_fork = if number == from { None } else { Some(fork) };
            let parent_hash = match parent_fork {
                Some(fork) => block_hash(fork, number.saturating_sub(1)),
                None => Self::hash_in(&state, number.saturating_sub(1)),
            };
            state.blocks.insert(
                number,
                ChainBlock {
                    block: BlockRef::new(number, block_hash(fork, number), parent_hash),
                    transactions: Vec::new(),
                },
            );
        }
    }

    pub(crate) fn hash_of(&self, number: u64) -> B256 {
        Self::hash_in(&self.state.lock().unwrap(), number)
    }

    fn hash_in(state: &ChainState, number: u64) -> B256 {
        state.blocks.get(&number).map(|block| block.block.hash).unwrap_or(block_hash(0, number))
    }

    fn block_in(state: &ChainState, number: u64) -> ChainBlock {
        state.blocks.get(&number).cloned().unwrap_or_else(|| ChainBlock {
            block: BlockRef::new(
                number,
                block_hash(0, number),
                Self::hash_in(state, number.saturating_sub(1)),
            ),
            transactions: Vec::new(),
        })
    }

    /// Mines a native transfer into block `number`.
    pub(crate) fn add_native_transfer(&self, number: u64, tx: NativeTransfer, success: bool) {
        let mut state = self.state.lock().unwrap();
        let mut block = Self::block_in(&state, number);
        let tx = NativeTransfer { block_number: Some(number), ..tx };
        block.transactions.push(tx.clone());
        state.blocks.insert(number, block);
        state.receipts.insert(
            tx.hash,
            TransferReceipt {
                transaction_hash: tx.hash,
                block_number: Some(number),
                success,
                logs: Vec::new(),
            },
        );
        state.transactions.insert(tx.hash, tx);
    }

    /// Emits a token transfer log, with a receipt carrying it.
    pub(crate) fn add_transfer_log(&self, log: TransferLog, success: bool) {
        let mut state = self.state.lock().unwrap();
        let receipt = state.receipts.entry(log.transaction_hash).or_insert_with(|| {
            TransferReceipt {
                transaction_hash: log.transaction_hash,
                block_number: Some(log.block_number),
                success,
                logs: Vec::new(),
            }
        });
        receipt.logs.push(log.clone());
        state.logs.push(log);
    }

    /// Replaces the receipt of `hash`.
    pub(crate) fn set_receipt(&self, hash: B256, receipt: Option<TransferReceipt>) {
        let mut state = self.state.lock().unwrap();
        match receipt {
            Some(receipt) => state.receipts.insert(hash, receipt),
            None => state.receipts.remove(&hash),
        };
    }

    fn check_online(state: &ChainState) -> Result<(), ChainClientError> {
        if state.offline {
            return Err(ChainClientError::Rpc("offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn block_number(&self) -> Result<u64, ChainClientError> {
        let state = self.state.lock().unwrap();
        Self::check_online(&state)?;
        Ok(state.tip)
    }

    async fn block_ref(&self, number: u64) -> Result<BlockRef, ChainClientError> {
        self.block_with_transactions(number).await.map(|block| block.block)
    }

    async fn block_with_transactions(&self, number: u64) -> Result<ChainBlock, ChainClientError> {
        let state = self.state.lock().unwrap();
        Self::check_online(&state)?;
        if number > state.tip || state.unavailable.contains(&number) {
            return Err(ChainClientError::BlockNotFound(number));
        }
        Ok(Self::block_in(&state, number))
    }

    async fn transfer_logs(
        &self,
        from: u64,
        to: u64,
        contracts: &[Address],
    ) -> Result<Vec<TransferLog>, ChainClientError> {
        let state = self.state.lock().unwrap();
        Self::check_online(&state)?;
        Ok(state
            .logs
            .iter()
            .filter(|log| (from..=to).contains(&log.block_number))
            .filter(|log| contracts.contains(&log.contract))
            .cloned()
            .collect())
    }

    async fn transaction(&self, hash: B256) -> Result<Option<NativeTransfer>, ChainClientError> {
        let state = self.state.lock().unwrap();
        Self::check_online(&state)?;
        Ok(state.transactions.get(&hash).cloned())
    }

    async fn transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TransferReceipt>, ChainClientError> {
        let state = self.state.lock().unwrap();
        Self::check_online(&state)?;
        Ok(state.receipts.get(&hash).cloned())
    }
}
