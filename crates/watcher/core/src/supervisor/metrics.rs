use crate::watcher::WatcherState;

/// Metrics for the state of the supervised watchers.
#[derive(Debug, Clone)]
pub(crate) struct Metrics;

impl Metrics {
    pub(crate) const WATCHER_STATE: &'static str = "paywatch_watcher_state";
    pub(crate) const CONFIGURED_CHAINS: &'static str = "paywatch_configured_chains";

    pub(crate) fn init(chain_ids: impl IntoIterator<Item = u64>) {
        Self::describe();
        for chain_id in chain_ids {
            Self::record_state(chain_id, WatcherState::Stopped);
        }
        metrics::gauge!(Self::CONFIGURED_CHAINS).set(0.0);
    }

    fn describe() {
        metrics::describe_gauge!(
            Self::WATCHER_STATE,
            "State of the chain watcher: 0 stopped or unconfigured, 1 catching up, 2 live",
        );
        metrics::describe_gauge!(
            Self::CONFIGURED_CHAINS,
            metrics::Unit::Count,
            "Number of chains with a running watcher",
        );
    }

    pub(crate) fn record_state(chain_id: u64, state: WatcherState) {
        let value = match state {
            WatcherState::Stopped => 0.0,
            WatcherState::CatchingUp => 1.0,
            WatcherState::Live => 2.0,
        };
        metrics::gauge!(Self::WATCHER_STATE, "chain_id" => chain_id.to_string()).set(value);
    }

    pub(crate) fn record_configured(count: usize) {
        metrics::gauge!(Self::CONFIGURED_CHAINS).set(count as f64);
    }
}
