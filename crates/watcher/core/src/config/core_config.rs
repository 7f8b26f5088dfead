use super::ChainNetworks;
use crate::watcher::WatcherConfig;
use derive_more::Constructor;
use std::collections::BTreeMap;

/// Configuration of the paywatch core.
#[derive(Debug, Clone, Default, Constructor)]
pub struct Config {
    /// Currencies received, per chain.
    pub networks: ChainNetworks,
    /// RPC endpoints used for chains without persisted configuration.
    pub chain_rpcs: BTreeMap<u64, String>,
    /// Behaviour of every chain watcher.
    pub watcher: WatcherConfig,
}

impl Config {
    /// The endpoint to seed `chain_id` with when no configuration was persisted.
    pub fn seed_rpc_url(&self, chain_id: u64) -> Option<&str> {
        self.chain_rpcs.get(&chain_id).map(String::as_str)
    }
}
