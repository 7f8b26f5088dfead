use alloy_primitives::B256;
use paywatch_types::SettingsKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of most recent block hashes retained per chain.
pub const MAX_RETAINED_BLOCKS: usize = 200;

/// Hashes of the most recently processed blocks of a chain.
///
/// Native and token processing progress independently, so every chain has up to two records,
/// distinguished by `token_tracking`. The map never holds more than [`MAX_RETAINED_BLOCKS`]
/// entries once [`ChainProgress::append`] returns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainProgress {
    /// The chain the record belongs to.
    pub chain_id: u64,
    /// `true` for the token log processor, `false` for the native block processor.
    pub token_tracking: bool,
    /// Processed block number to block hash.
    #[serde(default)]
    pub block_hashes: BTreeMap<u64, B256>,
}

impl ChainProgress {
    /// Creates an empty record.
    pub const fn new(chain_id: u64, token_tracking: bool) -> Self {
        Self { chain_id, token_tracking, block_hashes: BTreeMap::new() }
    }

    /// Settings key of the record.
    pub fn key(&self) -> String {
        Self::key_for(self.chain_id, self.token_tracking)
    }

    /// Settings key of the record for `chain_id`.
    pub fn key_for(chain_id: u64, token_tracking: bool) -> String {
        SettingsKind::ChainProgress.key(chain_id, token_tracking)
    }

    /// The highest processed block, `None` if nothing was processed yet.
    pub fn last_block_number(&self) -> Option<u64> {
        self.block_hashes.last_key_value().map(|(number, _)| *number)
    }

    /// The recorded hash of `number`.
    pub fn hash_of(&self, number: u64) -> Option<B256> {
        self.block_hashes.get(&number).copied()
    }

    /// Records `number` as processed and prunes the oldest entries.
    pub fn append(&mut self, number: u64, hash: B256) {
        self.block_hashes.insert(number, hash);
        self.prune();
    }

    /// Forgets `number`. Returns the removed hash.
    pub fn remove(&mut self, number: u64) -> Option<B256> {
        self.block_hashes.remove(&number)
    }

    /// Number of retained hashes.
    pub fn len(&self) -> usize {
        self.block_hashes.len()
    }

    /// Returns `true` if no block was retained.
    pub fn is_empty(&self) -> bool {
        self.block_hashes.is_empty()
    }

    fn prune(&mut self) {
        while self.block_hashes.len() > MAX_RETAINED_BLOCKS {
            self.block_hashes.pop_first();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_prunes_oldest() {
        let mut progress = ChainProgress::new(1, false);
        for number in 0..250u64 {
            progress.append(number, B256::from(alloy_primitives::U256::from(number)));
            assert!(progress.len() <= MAX_RETAINED_BLOCKS);
            assert_eq!(progress.last_block_number(), Some(number));
        }

        assert_eq!(progress.len(), MAX_RETAINED_BLOCKS);
        assert_eq!(progress.block_hashes.first_key_value().map(|(n, _)| *n), Some(50));
    }

    #[test]
    fn test_remove_updates_last_block() {
        let mut progress = ChainProgress::new(1, true);
        progress.append(10, B256::repeat_byte(1));
        progress.append(11, B256::repeat_byte(2));

        assert_eq!(progress.remove(11), Some(B256::repeat_byte(2)));
        assert_eq!(progress.last_block_number(), Some(10));
        assert_eq!(progress.remove(10), Some(B256::repeat_byte(1)));
        assert_eq!(progress.last_block_number(), None);
        assert!(progress.is_empty());
    }

    #[test]
    fn test_key() {
        assert_eq!(ChainProgress::new(5, false).key(), "ChainProgress_5");
        assert_eq!(ChainProgress::new(5, true).key(), "ChainProgress_5_erc20");
    }

    #[test]
    fn test_json_round_trip_keeps_order() {
        let mut progress = ChainProgress::new(1, false);
        progress.append(9, B256::repeat_byte(9));
        progress.append(10, B256::repeat_byte(10));

        let json = serde_json::to_value(&progress).unwrap();
        let decoded: ChainProgress = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, progress);
    }
}
