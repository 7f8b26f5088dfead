use super::WatcherState;
use crate::watched::WatchedAddresses;
use alloy_primitives::Address;
use std::sync::Arc;
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Control over a running [`ChainWatcher`](super::ChainWatcher).
#[derive(Debug)]
pub struct WatcherHandle {
    chain_id: u64,
    state: watch::Receiver<WatcherState>,
    watched: Arc<WatchedAddresses>,
    cancellation: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl WatcherHandle {
    pub(crate) const fn new(
        chain_id: u64,
        state: watch::Receiver<WatcherState>,
        watched: Arc<WatchedAddresses>,
        cancellation: CancellationToken,
        tasks: Vec<JoinHandle<()>>,
    ) -> Self {
        Self { chain_id, state, watched, cancellation, tasks }
    }

    /// The watched chain.
    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// The current state of the watcher.
    pub fn state(&self) -> WatcherState {
        *self.state.borrow()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<WatcherState> {
        self.state.clone()
    }

    /// Returns `true` while the watcher has not reached the chain tip yet.
    pub fn is_catching_up(&self) -> bool {
        self.state() == WatcherState::CatchingUp
    }

    /// The addresses the watcher matches transfers against.
    pub fn watched(&self) -> Arc<WatchedAddresses> {
        self.watched.clone()
    }

    /// Starts watching `address`.
    pub fn watch_address(&self, address: Address) -> bool {
        self.watched.append(address)
    }

    /// Stops the watcher and waits for its tasks to finish. Calling it again is a no-op.
    pub async fn stop(&mut self) {
        self.cancellation.cancel();
        if self.tasks.is_empty() {
            return;
        }

        for task in self.tasks.drain(..) {
            if let Err(err) = task.await {
                error!(target: "paywatch::watcher", chain_id = self.chain_id, %err, "Watcher task failed");
            }
        }
        info!(target: "paywatch::watcher", chain_id = self.chain_id, "Chain watcher shut down");
    }
}
