//! Per-chain watching: catch-up, live polling and forwarding of matches to the reconciler.

mod chain;
pub use chain::ChainWatcher;

mod config;
pub use config::WatcherConfig;

mod error;
pub use error::WatcherError;

mod handle;
pub use handle::WatcherHandle;

mod processor;
pub use processor::BlockProcessor;

mod state;
pub use state::WatcherState;
