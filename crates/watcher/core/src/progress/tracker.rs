use super::{Metrics, ProgressError};
use crate::client::{ChainClient, ChainClientError};
use backon::{ConstantBuilder, Retryable};
use paywatch_storage::{ChainProgress, SettingsStore, SettingsStoreExt};
use paywatch_types::BlockRef;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, trace, warn};

/// Result of [`ProgressTracker::record_processed_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUpdate {
    /// The block extends the retained history and was recorded.
    Appended,
    /// The block could not be fetched; nothing was recorded. Retry on the next cycle.
    Deferred,
    /// The retained history was reorged out. Orphaned blocks were removed, and the caller must
    /// rescan from `resume_from`.
    Rewound {
        /// First block that is not verified against the canonical chain anymore.
        resume_from: u64,
    },
}

/// Bounded retry applied to block fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockFetchRetry {
    /// Total number of attempts, including the first one.
    pub attempts: usize,
    /// Delay between two attempts.
    pub delay: Duration,
}

impl Default for BlockFetchRetry {
    fn default() -> Self {
        Self { attempts: 5, delay: Duration::from_millis(500) }
    }
}

impl BlockFetchRetry {
    fn backoff(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(self.attempts.saturating_sub(1))
    }
}

/// Tracks the blocks a processor has handled on one chain and repairs that history after reorgs.
///
/// The hashes of the last [`MAX_RETAINED_BLOCKS`](paywatch_storage::MAX_RETAINED_BLOCKS)
/// processed blocks are persisted through the [`SettingsStore`]. A block whose parent hash does
/// not link to the retained hash of its predecessor reveals a reorg: orphaned entries are
/// dropped one by one until the history links up with the canonical chain again.
#[derive(Debug)]
pub struct ProgressTracker<S, C> {
    chain_id: u64,
    token_tracking: bool,
    settings: Arc<S>,
    client: C,
    retry: BlockFetchRetry,
    metrics_enabled: bool,
}

impl<S, C> ProgressTracker<S, C>
where
    S: SettingsStore,
    C: ChainClient,
{
    /// Creates a tracker for the native (`token_tracking == false`) or token log processor of
    /// `chain_id`.
    pub fn new(chain_id: u64, token_tracking: bool, settings: Arc<S>, client: C) -> Self {
        Self {
            chain_id,
            token_tracking,
            settings,
            client,
            retry: BlockFetchRetry::default(),
            metrics_enabled: false,
        }
    }

    /// Overrides the block fetch retry.
    pub const fn with_retry(mut self, retry: BlockFetchRetry) -> Self {
        self.retry = retry;
        self
    }

    /// Enables reorg metrics.
    pub fn with_metrics(mut self) -> Self {
        Metrics::init(self.chain_id, self.tracking_label());
        self.metrics_enabled = true;
        self
    }

    const fn tracking_label(&self) -> &'static str {
        if self.token_tracking { "token" } else { "native" }
    }

    fn load(&self) -> Result<ChainProgress, ProgressError> {
        Ok(self
            .settings
            .chain_progress(self.chain_id, self.token_tracking)?
            .unwrap_or_else(|| ChainProgress::new(self.chain_id, self.token_tracking)))
    }

    fn persist(&self, progress: &ChainProgress) -> Result<(), ProgressError> {
        self.settings.save_chain_progress(progress).inspect_err(|err| {
            warn!(
                target: "paywatch::progress",
                chain_id = self.chain_id,
                token_tracking = self.token_tracking,
                %err,
                "Failed to persist chain progress"
            );
        })?;
        Ok(())
    }

    fn record_reorg(&self, depth: usize) {
        if self.metrics_enabled && depth > 0 {
            Metrics::record_reorg(self.chain_id, self.tracking_label(), depth);
        }
    }

    async fn fetch_block_ref(&self, number: u64) -> Result<BlockRef, ChainClientError> {
        (|| self.client.block_ref(number))
            .retry(self.retry.backoff())
            .notify(|err, delay| {
                debug!(
                    target: "paywatch::progress",
                    chain_id = self.chain_id,
                    block_number = number,
                    %err,
                    ?delay,
                    "Retrying block fetch"
                );
            })
            .await
    }

    /// Returns the highest processed block that is still part of the canonical chain.
    ///
    /// Retained blocks whose hash no longer matches the chain are removed first. The record is
    /// only written if something was removed.
    ///
    /// # Returns
    /// * `Ok(Some(number))` with the first retained block agreeing with the chain.
    /// * `Ok(None)` if nothing was processed yet or the whole retained history was orphaned.
    /// * `Err(ProgressError::BlockUnavailable)` if a retained block could not be fetched. The
    ///   record is left untouched.
    pub async fn last_processed_block(&self) -> Result<Option<u64>, ProgressError> {
        let mut progress = self.load()?;
        let mut removed = 0;

        while let Some(last) = progress.last_block_number() {
            let canonical = self
                .fetch_block_ref(last)
                .await
                .map_err(|source| ProgressError::BlockUnavailable { number: last, source })?;

            let stored = progress.hash_of(last);
            if stored == Some(canonical.hash) {
                break;
            }

            warn!(
                target: "paywatch::progress",
                chain_id = self.chain_id,
                token_tracking = self.token_tracking,
                block_number = last,
                stored_hash = ?stored,
                canonical_hash = %canonical.hash,
                "Processed block was orphaned, dropping it"
            );
            progress.remove(last);
            removed += 1;
        }

        if removed > 0 {
            self.persist(&progress)?;
            self.record_reorg(removed);
        }
        Ok(progress.last_block_number())
    }

    /// Records block `number` as processed.
    ///
    /// Fetches the block (with bounded retry) and checks it links to the retained history. On a
    /// reorg the orphaned entries are removed, walking back until the history links up again,
    /// and nothing is appended.
    pub async fn record_processed_block(
        &self,
        number: u64,
    ) -> Result<ProgressUpdate, ProgressError> {
        let mut progress = self.load()?;
        let mut block = match self.fetch_block_ref(number).await {
            Ok(block) => block,
            Err(err) => {
                warn!(
                    target: "paywatch::progress",
                    chain_id = self.chain_id,
                    block_number = number,
                    %err,
                    "Block unavailable, deferring progress"
                );
                return Ok(ProgressUpdate::Deferred);
            }
        };

        if links_to_history(&progress, &block) {
            progress.append(number, block.hash);
            self.persist(&progress)?;
            trace!(
                target: "paywatch::progress",
                chain_id = self.chain_id,
                token_tracking = self.token_tracking,
                block_number = number,
                "Block recorded"
            );
            return Ok(ProgressUpdate::Appended);
        }

        let mut removed = 0;
        loop {
            // `links_to_history` failed, so the predecessor of `block` is the retained tip
            let orphaned = block.number - 1;
            warn!(
                target: "paywatch::progress",
                chain_id = self.chain_id,
                token_tracking = self.token_tracking,
                block_number = orphaned,
                stored_hash = ?progress.hash_of(orphaned),
                canonical_hash = %block.parent_hash,
                "Reorg detected, dropping orphaned block"
            );
            progress.remove(orphaned);
            removed += 1;

            if progress.is_empty() {
                self.persist(&progress)?;
                self.record_reorg(removed);
                return Err(ProgressError::ReorgExceedsRetainedHistory { depth: removed });
            }

            block = match self.fetch_block_ref(orphaned).await {
                Ok(block) => block,
                Err(err) => {
                    debug!(
                        target: "paywatch::progress",
                        chain_id = self.chain_id,
                        block_number = orphaned,
                        %err,
                        "Block unavailable while walking back a reorg"
                    );
                    break;
                }
            };
            if links_to_history(&progress, &block) {
                break;
            }
        }

        self.persist(&progress)?;
        self.record_reorg(removed);
        let resume_from = progress.last_block_number().map_or(number, |last| last + 1);
        info!(
            target: "paywatch::progress",
            chain_id = self.chain_id,
            token_tracking = self.token_tracking,
            depth = removed,
            resume_from,
            "Reorg repaired"
        );
        Ok(ProgressUpdate::Rewound { resume_from })
    }
}

/// Returns `false` if `block` directly follows the retained tip but does not build on it.
fn links_to_history(progress: &ChainProgress, block: &BlockRef) -> bool {
    match progress.last_block_number() {
        Some(last) if last + 1 == block.number => {
            progress.hash_of(last) == Some(block.parent_hash)
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeChain, MockClient, MockSettings, block_hash};
    use alloy_primitives::B256;
    use paywatch_storage::{MAX_RETAINED_BLOCKS, MemorySettings};

    const FAST_RETRY: BlockFetchRetry =
        BlockFetchRetry { attempts: 2, delay: Duration::from_millis(1) };

    fn tracker(
        chain: &Arc<FakeChain>,
        settings: &Arc<MemorySettings>,
    ) -> ProgressTracker<MemorySettings, Arc<FakeChain>> {
        ProgressTracker::new(1, false, settings.clone(), chain.clone()).with_retry(FAST_RETRY)
    }

    fn stored(settings: &MemorySettings) -> ChainProgress {
        settings.chain_progress(1, false).unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_history_is_capped() {
        let chain = Arc::new(FakeChain::with_tip(300));
        let settings = Arc::new(MemorySettings::new());
        let tracker = tracker(&chain, &settings);

        for number in 0..250 {
            assert_eq!(tracker.record_processed_block(number).await, Ok(ProgressUpdate::Appended));
        }

        let progress = stored(&settings);
        assert_eq!(progress.len(), MAX_RETAINED_BLOCKS);
        assert_eq!(progress.last_block_number(), Some(249));
        assert_eq!(tracker.last_processed_block().await, Ok(Some(249)));
    }

    #[tokio::test]
    async fn test_reorg_drops_orphaned_blocks() {
        let chain = Arc::new(FakeChain::with_tip(20));
        let settings = Arc::new(MemorySettings::new());
        let tracker = tracker(&chain, &settings);
        for number in 1..=10 {
            tracker.record_processed_block(number).await.unwrap();
        }

        chain.reorg(8, 12, 1);
        assert_eq!(
            tracker.record_processed_block(11).await,
            Ok(ProgressUpdate::Rewound { resume_from: 8 })
        );
        assert_eq!(stored(&settings).last_block_number(), Some(7));

        for number in 8..=11 {
            assert_eq!(tracker.record_processed_block(number).await, Ok(ProgressUpdate::Appended));
        }

        let progress = stored(&settings);
        for (number, hash) in &progress.block_hashes {
            assert_eq!(*hash, chain.hash_of(*number));
        }
        assert_eq!(progress.hash_of(9), Some(block_hash(1, 9)));
    }

    #[tokio::test]
    async fn test_reorg_beyond_history() {
        let chain = Arc::new(FakeChain::with_tip(20));
        let settings = Arc::new(MemorySettings::new());
        let tracker = tracker(&chain, &settings);
        tracker.record_processed_block(5).await.unwrap();

        chain.reorg(5, 6, 1);
        assert_eq!(
            tracker.record_processed_block(6).await,
            Err(ProgressError::ReorgExceedsRetainedHistory { depth: 1 })
        );
        assert!(stored(&settings).is_empty());
        assert_eq!(tracker.last_processed_block().await, Ok(None));
    }

    #[tokio::test]
    async fn test_last_processed_block_self_heals() {
        let chain = Arc::new(FakeChain::with_tip(20));
        let settings = Arc::new(MemorySettings::new());
        let tracker = tracker(&chain, &settings);
        for number in 1..=5 {
            tracker.record_processed_block(number).await.unwrap();
        }

        chain.reorg(4, 5, 1);
        assert_eq!(tracker.last_processed_block().await, Ok(Some(3)));
        assert_eq!(stored(&settings).last_block_number(), Some(3));
    }

    #[tokio::test]
    async fn test_last_processed_block_without_change_does_not_write() {
        let mut progress = ChainProgress::new(1, false);
        progress.append(9, block_hash(0, 9));
        progress.append(10, block_hash(0, 10));
        let record = serde_json::to_value(&progress).unwrap();

        let mut settings = MockSettings::new();
        settings
            .expect_get()
            .withf(|key| key == "ChainProgress_1")
            .times(2)
            .returning(move |_| Ok(Some(record.clone())));
        settings.expect_put().times(0);

        let mut client = MockClient::new();
        client
            .expect_block_ref()
            .times(2)
            .returning(|number| Ok(BlockRef::new(number, block_hash(0, number), B256::ZERO)));

        let tracker = ProgressTracker::new(1, false, Arc::new(settings), client);
        assert_eq!(tracker.last_processed_block().await, Ok(Some(10)));
        assert_eq!(tracker.last_processed_block().await, Ok(Some(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_block_is_deferred_after_retries() {
        let mut settings = MockSettings::new();
        settings.expect_get().returning(|_| Ok(None));
        settings.expect_put().times(0);

        let mut client = MockClient::new();
        client
            .expect_block_ref()
            .times(5)
            .returning(|_| Err(ChainClientError::Rpc("timeout".to_string())));

        let tracker = ProgressTracker::new(1, true, Arc::new(settings), client);
        assert_eq!(tracker.record_processed_block(42).await, Ok(ProgressUpdate::Deferred));
    }

    #[tokio::test]
    async fn test_last_processed_block_unavailable() {
        let chain = Arc::new(FakeChain::with_tip(20));
        let settings = Arc::new(MemorySettings::new());
        let tracker = tracker(&chain, &settings);
        tracker.record_processed_block(5).await.unwrap();

        chain.make_unavailable(5);
        assert!(matches!(
            tracker.last_processed_block().await,
            Err(ProgressError::BlockUnavailable { number: 5, .. })
        ));
        assert_eq!(stored(&settings).last_block_number(), Some(5));
    }
}
