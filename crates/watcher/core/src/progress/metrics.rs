/// Metrics for reorgs detected by the progress tracker.
#[derive(Debug, Clone)]
pub(crate) struct Metrics;

impl Metrics {
    pub(crate) const REORGS_TOTAL: &'static str = "paywatch_reorgs_total";
    pub(crate) const REORG_DEPTH: &'static str = "paywatch_reorg_depth";

    pub(crate) fn init(chain_id: u64, tracking: &'static str) {
        Self::describe();
        Self::zero(chain_id, tracking);
    }

    fn describe() {
        metrics::describe_counter!(
            Self::REORGS_TOTAL,
            metrics::Unit::Count,
            "Total number of reorgs repaired in the processed block history",
        );
        metrics::describe_histogram!(
            Self::REORG_DEPTH,
            metrics::Unit::Count,
            "Number of processed blocks orphaned by a reorg",
        );
    }

    fn zero(chain_id: u64, tracking: &'static str) {
        metrics::counter!(
            Self::REORGS_TOTAL,
            "chain_id" => chain_id.to_string(),
            "tracking" => tracking,
        )
        .increment(0);

        metrics::histogram!(
            Self::REORG_DEPTH,
            "chain_id" => chain_id.to_string(),
            "tracking" => tracking,
        )
        .record(0);
    }

    pub(crate) fn record_reorg(chain_id: u64, tracking: &'static str, depth: usize) {
        metrics::counter!(
            Self::REORGS_TOTAL,
            "chain_id" => chain_id.to_string(),
            "tracking" => tracking,
        )
        .increment(1);

        metrics::histogram!(
            Self::REORG_DEPTH,
            "chain_id" => chain_id.to_string(),
            "tracking" => tracking,
        )
        .record(depth as f64);
    }
}
