//! Supervision of one chain watcher per configured chain.

mod chain_supervisor;
pub use chain_supervisor::{ChainSupervisor, SyncStatus};

mod error;
pub use error::SupervisorError;

mod metrics;
pub(crate) use metrics::Metrics;
