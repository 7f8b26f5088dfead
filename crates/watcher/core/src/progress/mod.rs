//! Reorg aware tracking of processed blocks.

mod error;
pub use error::ProgressError;

mod metrics;
pub(crate) use metrics::Metrics;

mod tracker;
pub use tracker::{BlockFetchRetry, ProgressTracker, ProgressUpdate};
