use anyhow::{Context as _, Result, anyhow};
use clap::Args;
use paywatch_core::{ChainNetworks, Config, WatcherConfig};
use paywatch_service::{Fixtures, ServiceConfig};
use paywatch_types::ChainNetwork;
use serde::de::DeserializeOwned;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use tokio::{fs::File, io::AsyncReadExt};

/// How often the watcher gauges are sampled.
const METRICS_INTERVAL: Duration = Duration::from_secs(30);

/// A `chainId=url` pair seeding the RPC endpoint of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainRpc {
    /// The chain.
    pub chain_id: u64,
    /// JSON-RPC endpoint of the chain.
    pub url: String,
}

impl FromStr for ChainRpc {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chain_id, url) =
            s.split_once('=').ok_or_else(|| format!("expected <chainId>=<url>, got '{s}'"))?;
        let chain_id =
            chain_id.trim().parse().map_err(|err| format!("invalid chain id '{chain_id}': {err}"))?;
        let url = url.trim();
        if url.is_empty() {
            return Err(format!("missing url for chain {chain_id}"));
        }
        Ok(Self { chain_id, url: url.to_string() })
    }
}

/// Watcher configuration arguments.
#[derive(Args, Debug)]
pub struct WatcherArgs {
    /// Directory to store the chain progress and configuration in.
    #[arg(long, env = "PAYWATCH_DATADIR")]
    pub datadir: PathBuf,

    /// Path to the JSON list of accepted currencies.
    #[arg(long, env = "PAYWATCH_NETWORKS")]
    pub networks: PathBuf,

    /// RPC endpoints of chains without persisted configuration, as `<chainId>=<url>`.
    #[arg(long = "chain-rpc", env = "PAYWATCH_CHAIN_RPC", value_delimiter = ',')]
    pub chain_rpcs: Vec<ChainRpc>,

    /// Optional JSON file seeding invoices, payment methods and derived addresses.
    #[arg(long, env = "PAYWATCH_FIXTURES")]
    pub fixtures: Option<PathBuf>,

    /// Seconds between two live polling cycles.
    #[arg(long = "poll-interval-secs", env = "PAYWATCH_POLL_INTERVAL_SECS", default_value_t = 5)]
    pub poll_interval_secs: u64,

    /// Maximum number of blocks covered by one transfer log query.
    #[arg(long = "log-batch-size", env = "PAYWATCH_LOG_BATCH_SIZE", default_value_t = 100)]
    pub log_batch_size: u64,

    /// Distance to the chain tip at which catch-up ends.
    #[arg(long = "confirmation-margin", env = "PAYWATCH_CONFIRMATION_MARGIN", default_value_t = 12)]
    pub confirmation_margin: u64,
}

impl WatcherArgs {
    async fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
        let mut file = File::open(path)
            .await
            .with_context(|| format!("Failed to open '{}'", path.display()))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .await
            .with_context(|| format!("Failed to read '{}'", path.display()))?;
        let value = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse JSON from '{}'", path.display()))?;
        Ok(value)
    }

    /// Initialise and return the accepted networks.
    pub async fn init_networks(&self) -> Result<ChainNetworks> {
        let networks: Vec<ChainNetwork> = Self::read_json_file(&self.networks).await?;
        Ok(ChainNetworks::new(networks)?)
    }

    /// The seed endpoints per chain. A chain given twice is rejected.
    pub fn init_chain_rpcs(&self) -> Result<BTreeMap<u64, String>> {
        let mut chain_rpcs = BTreeMap::new();
        for ChainRpc { chain_id, url } in &self.chain_rpcs {
            if chain_rpcs.insert(*chain_id, url.clone()).is_some() {
                return Err(anyhow!("rpc url of chain {chain_id} given twice"));
            }
        }
        Ok(chain_rpcs)
    }

    /// The watcher tuning.
    pub fn init_watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            log_batch_size: self.log_batch_size,
            confirmation_margin: self.confirmation_margin,
            ..Default::default()
        }
    }

    /// Initialise and return the service configuration.
    pub async fn init_config(&self, metrics_enabled: bool) -> Result<ServiceConfig> {
        let networks = self.init_networks().await?;
        let fixtures = match &self.fixtures {
            Some(path) => Fixtures::load(path)?,
            None => Fixtures::default(),
        };

        Ok(ServiceConfig {
            core: Config::new(networks, self.init_chain_rpcs()?, self.init_watcher_config()),
            datadir: self.datadir.clone(),
            fixtures,
            metrics_enabled,
            metrics_interval: METRICS_INTERVAL,
        })
    }
}
