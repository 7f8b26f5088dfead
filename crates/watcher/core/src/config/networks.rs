use alloy_primitives::Address;
use paywatch_types::{ChainNetwork, MatchedTransfer};
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;

/// Errors in the configured network list.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkConfigError {
    /// Two networks share a currency code.
    #[error("currency {0} is configured more than once")]
    DuplicateCurrency(String),

    /// A chain has more than one network without token contract.
    #[error("chain {0} has more than one native currency")]
    DuplicateNativeCurrency(u64),

    /// A token contract is configured twice on the same chain.
    #[error("contract {contract} is configured more than once on chain {chain_id}")]
    DuplicateContract {
        /// The chain.
        chain_id: u64,
        /// The duplicated contract.
        contract: Address,
    },
}

/// Every currency paywatch can receive, indexed by currency code and chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainNetworks {
    networks: Vec<ChainNetwork>,
}

impl ChainNetworks {
    /// Validates and indexes `networks`.
    pub fn new(networks: Vec<ChainNetwork>) -> Result<Self, NetworkConfigError> {
        let mut currencies = HashSet::new();
        let mut natives = HashSet::new();
        let mut contracts = HashSet::new();

        for network in &networks {
            if !currencies.insert(network.currency.as_str()) {
                return Err(NetworkConfigError::DuplicateCurrency(network.currency.clone()));
            }
            match network.contract {
                None if !natives.insert(network.chain_id) => {
                    return Err(NetworkConfigError::DuplicateNativeCurrency(network.chain_id));
                }
                Some(contract) if !contracts.insert((network.chain_id, contract)) => {
                    return Err(NetworkConfigError::DuplicateContract {
                        chain_id: network.chain_id,
                        contract,
                    });
                }
                _ => {}
            }
        }
        Ok(Self { networks })
    }

    /// Ids of all chains with at least one currency.
    pub fn chain_ids(&self) -> BTreeSet<u64> {
        self.networks.iter().map(|network| network.chain_id).collect()
    }

    /// The network of `currency`.
    pub fn by_currency(&self, currency: &str) -> Option<&ChainNetwork> {
        self.networks.iter().find(|network| network.currency == currency)
    }

    /// All configured networks.
    pub fn iter(&self) -> impl Iterator<Item = &ChainNetwork> {
        self.networks.iter()
    }

    /// The currencies received on `chain_id`.
    pub fn currencies(&self, chain_id: u64) -> ChainCurrencies {
        let mut currencies = ChainCurrencies { chain_id, ..Default::default() };
        for network in self.networks.iter().filter(|network| network.chain_id == chain_id) {
            match network.contract {
                Some(contract) => {
                    currencies.tokens.insert(contract, network.currency.clone());
                }
                None => currencies.native = Some(network.currency.clone()),
            }
        }
        currencies
    }
}

/// The currencies of one chain: its native currency and the tracked token contracts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainCurrencies {
    /// The chain.
    pub chain_id: u64,
    /// Currency code of the native currency, if it is accepted.
    pub native: Option<String>,
    /// Token contract to currency code.
    pub tokens: HashMap<Address, String>,
}

impl ChainCurrencies {
    /// The tracked token contracts.
    pub fn contracts(&self) -> Vec<Address> {
        let mut contracts: Vec<_> = self.tokens.keys().copied().collect();
        contracts.sort();
        contracts
    }

    /// Returns `true` if at least one token contract is tracked.
    pub fn tracks_tokens(&self) -> bool {
        !self.tokens.is_empty()
    }

    /// All currency codes of the chain.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.native.iter().chain(self.tokens.values()).map(String::as_str)
    }

    /// Returns `true` if `currency` is received on this chain.
    pub fn contains(&self, currency: &str) -> bool {
        self.codes().any(|code| code == currency)
    }

    /// The currency a matched transfer was made in. `None` for untracked contracts.
    pub fn currency_of(&self, transfer: &MatchedTransfer) -> Option<&str> {
        match transfer {
            MatchedTransfer::Native(_) => self.native.as_deref(),
            MatchedTransfer::Token(log) => self.tokens.get(&log.contract).map(String::as_str),
        }
    }
}
