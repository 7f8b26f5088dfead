//! Core logic of paywatch: following EVM chains, matching transfers to the deposit addresses of
//! pending invoices and reconciling the recorded payments with the chain.

pub mod client;
pub use client::{
    ChainClient, ChainClientError, ChainClientFactory, RpcChainClient, RpcChainClientFactory,
};

pub mod config;
pub use config::{ChainCurrencies, ChainNetworks, Config, NetworkConfigError};

mod matcher;
pub use matcher::TransferMatcher;

pub mod progress;
pub use progress::{BlockFetchRetry, ProgressError, ProgressTracker, ProgressUpdate};

pub mod reconciler;
pub use reconciler::{MatchOutcome, PaymentReconciler, ReconcilerError, SweepSummary};

pub mod reservation;
pub use reservation::{
    AddressDeriver, AddressReserver, DerivedAddressTable, RESERVATION_TIMEOUT, ReservationCall,
    ReservationClient, ReservationError,
};

mod supervisor;
pub use supervisor::{ChainSupervisor, SupervisorError, SyncStatus};

mod watched;
pub use watched::WatchedAddresses;

pub mod watcher;
pub use watcher::{
    BlockProcessor, ChainWatcher, WatcherConfig, WatcherError, WatcherHandle, WatcherState,
};

#[cfg(test)]
mod test_utils;
