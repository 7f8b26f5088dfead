//! Chain network configuration.

use alloy_primitives::Address;
use derive_more::{Constructor, Display};
use serde::{Deserialize, Serialize};

/// A currency that can be received on an EVM chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Constructor)]
#[serde(rename_all = "camelCase")]
pub struct ChainNetwork {
    /// Currency code, e.g. `ETH` or `USDT`.
    pub currency: String,
    /// Chain the currency lives on.
    pub chain_id: u64,
    /// Number of decimals of the currency.
    pub divisibility: u8,
    /// Token contract. `None` for the chain's native currency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<Address>,
}

impl ChainNetwork {
    /// Returns `true` if this is the chain's native currency.
    pub const fn is_native(&self) -> bool {
        self.contract.is_none()
    }
}

/// Per-chain configuration persisted in the settings store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Constructor)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfiguration {
    /// The chain this configuration applies to.
    pub chain_id: u64,
    /// JSON-RPC endpoint. The chain is not watched when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
}

/// Kind of a per-chain record in the settings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum SettingsKind {
    /// Recently processed block hashes.
    ChainProgress,
    /// RPC endpoint configuration.
    ChainConfiguration,
}

impl SettingsKind {
    /// Builds the settings key `<Kind>_<chainId>[_erc20]`.
    pub fn key(&self, chain_id: u64, token_tracking: bool) -> String {
        if token_tracking {
            format!("{self}_{chain_id}_erc20")
        } else {
            format!("{self}_{chain_id}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_keys() {
        assert_eq!(SettingsKind::ChainProgress.key(1, false), "ChainProgress_1");
        assert_eq!(SettingsKind::ChainProgress.key(1, true), "ChainProgress_1_erc20");
        assert_eq!(SettingsKind::ChainConfiguration.key(11155111, false), "ChainConfiguration_11155111");
    }

    #[test]
    fn test_network_deserialize() {
        let json = r#"[
            {"currency":"ETH","chainId":1,"divisibility":18},
            {"currency":"USDT","chainId":1,"divisibility":6,"contract":"0xdAC17F958D2ee523a2206206994597C13D831ec7"}
        ]"#;
        let networks: Vec<ChainNetwork> = serde_json::from_str(json).unwrap();

        assert!(networks[0].is_native());
        assert!(!networks[1].is_native());
        assert_eq!(networks[1].divisibility, 6);
    }
}
