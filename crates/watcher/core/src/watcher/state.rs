use derive_more::Display;

/// Lifecycle of a chain watcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
pub enum WatcherState {
    /// Not running.
    #[default]
    Stopped,
    /// Processing the blocks missed while stopped.
    CatchingUp,
    /// Following the chain tip.
    Live,
}
