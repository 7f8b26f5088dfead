//! Configuration of the paywatch core.

mod core_config;
pub use core_config::Config;

mod networks;
pub use networks::{ChainCurrencies, ChainNetworks, NetworkConfigError};
