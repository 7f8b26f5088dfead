use crate::progress::BlockFetchRetry;
use std::time::Duration;

/// Tuning of a [`ChainWatcher`](super::ChainWatcher).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Pause between two live cycles.
    pub poll_interval: Duration,
    /// Maximum number of blocks covered by one transfer log query.
    pub log_batch_size: u64,
    /// Distance to the tip at which catch-up ends.
    pub confirmation_margin: u64,
    /// Capacity of the channel between matcher and reconciler.
    pub match_buffer: usize,
    /// Retry of block fetches done by the progress trackers.
    pub block_fetch_retry: BlockFetchRetry,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            log_batch_size: 100,
            confirmation_margin: 12,
            match_buffer: 1024,
            block_fetch_retry: BlockFetchRetry::default(),
        }
    }
}
