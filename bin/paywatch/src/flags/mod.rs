//! CLI flags.

mod watcher;
pub use watcher::{ChainRpc, WatcherArgs};
