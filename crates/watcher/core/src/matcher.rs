//! Matching of chain activity against watched deposit addresses.

use crate::{config::ChainCurrencies, watched::WatchedAddresses};
use paywatch_types::{ChainBlock, MatchedTransaction, MatchedTransfer, TransferLog};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Matches native transfers and token transfer logs of one chain against the watched addresses
/// and forwards every match as a [`MatchedTransaction`].
#[derive(Debug, Clone)]
pub struct TransferMatcher {
    currencies: Arc<ChainCurrencies>,
    watched: Arc<WatchedAddresses>,
    sender: mpsc::Sender<MatchedTransaction>,
}

impl TransferMatcher {
    /// Creates a matcher for the chain of `currencies`.
    pub const fn new(
        currencies: Arc<ChainCurrencies>,
        watched: Arc<WatchedAddresses>,
        sender: mpsc::Sender<MatchedTransaction>,
    ) -> Self {
        Self { currencies, watched, sender }
    }

    /// Forwards every native transfer of `block` paid to a watched address.
    ///
    /// Nothing is matched on chains whose native currency is not accepted.
    ///
    /// # Returns
    /// The number of matches forwarded.
    pub async fn match_block(&self, block: &ChainBlock) -> usize {
        if self.currencies.native.is_none() {
            return 0;
        }

        let matches: Vec<_> = block
            .transactions
            .iter()
            .filter(|tx| tx.to.is_some_and(|to| self.watched.contains(&to)))
            .map(|tx| MatchedTransfer::Native(tx.clone()))
            .collect();
        self.forward(matches).await
    }

    /// Forwards every transfer log of a tracked contract paid to a watched address.
    ///
    /// Removed logs are forwarded as well, their payment is then not accounted.
    ///
    /// # Returns
    /// The number of matches forwarded.
    pub async fn match_logs(&self, logs: &[TransferLog]) -> usize {
        let matches: Vec<_> = logs
            .iter()
            .filter(|log| self.currencies.tokens.contains_key(&log.contract))
            .filter(|log| self.watched.contains(&log.to))
            .map(|log| MatchedTransfer::Token(log.clone()))
            .collect();
        self.forward(matches).await
    }

    async fn forward(&self, matches: Vec<MatchedTransfer>) -> usize {
        let chain_id = self.currencies.chain_id;
        let mut forwarded = 0;
        for transfer in matches {
            let transaction_hash = transfer.transaction_hash();
            debug!(
                target: "paywatch::matcher",
                chain_id,
                %transaction_hash,
                recipient = ?transfer.recipient(),
                "Matched transfer"
            );
            if let Err(err) = self.sender.send(MatchedTransaction::new(chain_id, transfer)).await {
                warn!(
                    target: "paywatch::matcher",
                    chain_id,
                    %transaction_hash,
                    %err,
                    "Failed to forward matched transfer"
                );
                continue;
            }
            forwarded += 1;
        }
        forwarded
    }
}
