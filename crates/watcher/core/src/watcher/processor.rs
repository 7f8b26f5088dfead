use super::{WatcherConfig, WatcherError};
use crate::{
    client::ChainClient,
    config::ChainCurrencies,
    matcher::TransferMatcher,
    progress::{ProgressError, ProgressTracker, ProgressUpdate},
};
use alloy_primitives::Address;
use paywatch_storage::SettingsStore;
use std::sync::Arc;
use tracing::{debug, warn};

/// Walks the blocks of one chain up to a target, feeding native transfers and token transfer
/// logs to the [`TransferMatcher`].
///
/// Native transfers and token logs each keep their own processed block history, so both
/// processors resume independently.
#[derive(Debug)]
pub struct BlockProcessor<S, C> {
    chain_id: u64,
    client: C,
    matcher: TransferMatcher,
    contracts: Vec<Address>,
    process_native: bool,
    native_progress: ProgressTracker<S, C>,
    token_progress: ProgressTracker<S, C>,
    log_batch_size: u64,
}

impl<S, C> BlockProcessor<S, C>
where
    S: SettingsStore + Send + Sync,
    C: ChainClient + Clone,
{
    /// Creates a processor for the chain of `currencies`.
    pub fn new(
        currencies: &ChainCurrencies,
        settings: Arc<S>,
        client: C,
        matcher: TransferMatcher,
        config: &WatcherConfig,
    ) -> Self {
        let chain_id = currencies.chain_id;
        let native_progress =
            ProgressTracker::new(chain_id, false, settings.clone(), client.clone())
                .with_retry(config.block_fetch_retry);
        let token_progress = ProgressTracker::new(chain_id, true, settings, client.clone())
            .with_retry(config.block_fetch_retry);

        Self {
            chain_id,
            client,
            matcher,
            contracts: currencies.contracts(),
            process_native: currencies.native.is_some(),
            native_progress,
            token_progress,
            log_batch_size: config.log_batch_size.max(1),
        }
    }

    /// Enables reorg metrics on both progress trackers.
    pub fn with_metrics(mut self) -> Self {
        self.native_progress = self.native_progress.with_metrics();
        self.token_progress = self.token_progress.with_metrics();
        self
    }

    /// Processes every unprocessed block up to and including `target`.
    ///
    /// Without processed history, processing starts at `target`.
    pub async fn process_until(&self, target: u64) -> Result<(), WatcherError> {
        let native = async {
            if self.process_native { self.process_blocks(target).await } else { Ok(()) }
        };
        let tokens = async {
            if self.contracts.is_empty() { Ok(()) } else { self.process_logs(target).await }
        };

        let (native, tokens) = tokio::join!(native, tokens);
        native.and(tokens)
    }

    async fn first_unprocessed(
        &self,
        progress: &ProgressTracker<S, C>,
        target: u64,
    ) -> Result<u64, WatcherError> {
        Ok(progress.last_processed_block().await?.map_or(target, |last| last + 1))
    }

    async fn process_blocks(&self, target: u64) -> Result<(), WatcherError> {
        let mut next = self.first_unprocessed(&self.native_progress, target).await?;
        let mut matched = 0;

        while next <= target {
            let block = self.client.block_with_transactions(next).await?;
            matched += self.matcher.match_block(&block).await;

            match self.record(&self.native_progress, next, target).await? {
                Some(resume_from) => next = resume_from,
                None => break,
            }
        }

        debug!(target: "paywatch::watcher", chain_id = self.chain_id, target, matched, "Native transfers processed");
        Ok(())
    }

    async fn process_logs(&self, target: u64) -> Result<(), WatcherError> {
        let mut next = self.first_unprocessed(&self.token_progress, target).await?;
        let mut matched = 0;

        while next <= target {
            let to = target.min(next.saturating_add(self.log_batch_size - 1));
            let logs = self.client.transfer_logs(next, to, &self.contracts).await?;
            matched += self.matcher.match_logs(&logs).await;

            match self.record(&self.token_progress, to, target).await? {
                Some(resume_from) => next = resume_from,
                None => break,
            }
        }

        debug!(target: "paywatch::watcher", chain_id = self.chain_id, target, matched, "Token transfers processed");
        Ok(())
    }

    /// Records `number` as processed and returns the next block to process, `None` to end the
    /// cycle.
    async fn record(
        &self,
        progress: &ProgressTracker<S, C>,
        number: u64,
        target: u64,
    ) -> Result<Option<u64>, WatcherError> {
        match progress.record_processed_block(number).await {
            Ok(ProgressUpdate::Appended) => Ok(Some(number + 1)),
            Ok(ProgressUpdate::Rewound { resume_from }) => Ok(Some(resume_from)),
            Ok(ProgressUpdate::Deferred) => Ok(None),
            Err(ProgressError::ReorgExceedsRetainedHistory { depth }) => {
                warn!(
                    target: "paywatch::watcher",
                    chain_id = self.chain_id,
                    depth,
                    target,
                    "Reorg deeper than the retained history, continuing from target"
                );
                Ok(Some(target))
            }
            Err(err) => Err(err.into()),
        }
    }
}
