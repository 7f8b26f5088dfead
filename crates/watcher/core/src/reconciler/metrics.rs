/// Metrics for payments handled by the reconciler.
#[derive(Debug, Clone)]
pub(crate) struct Metrics;

impl Metrics {
    pub(crate) const PAYMENTS_RECORDED_TOTAL: &'static str = "paywatch_payments_recorded_total";
    pub(crate) const PAYMENTS_INVALIDATED_TOTAL: &'static str =
        "paywatch_payments_invalidated_total";
    pub(crate) const WATCHED_ADDRESSES: &'static str = "paywatch_watched_addresses";

    pub(crate) fn init(chain_id: u64) {
        Self::describe();
        Self::zero(chain_id);
    }

    fn describe() {
        metrics::describe_counter!(
            Self::PAYMENTS_RECORDED_TOTAL,
            metrics::Unit::Count,
            "Total number of payments recorded on invoices",
        );
        metrics::describe_counter!(
            Self::PAYMENTS_INVALIDATED_TOTAL,
            metrics::Unit::Count,
            "Total number of recorded payments found invalid on chain",
        );
        metrics::describe_gauge!(
            Self::WATCHED_ADDRESSES,
            metrics::Unit::Count,
            "Number of deposit addresses currently watched",
        );
    }

    fn zero(chain_id: u64) {
        metrics::counter!(Self::PAYMENTS_RECORDED_TOTAL, "chain_id" => chain_id.to_string())
            .increment(0);
        metrics::counter!(Self::PAYMENTS_INVALIDATED_TOTAL, "chain_id" => chain_id.to_string())
            .increment(0);
        metrics::gauge!(Self::WATCHED_ADDRESSES, "chain_id" => chain_id.to_string()).set(0.0);
    }

    pub(crate) fn record_payment(chain_id: u64) {
        metrics::counter!(Self::PAYMENTS_RECORDED_TOTAL, "chain_id" => chain_id.to_string())
            .increment(1);
    }

    pub(crate) fn record_sweep(chain_id: u64, invalidated: usize, watched: usize) {
        metrics::counter!(Self::PAYMENTS_INVALIDATED_TOTAL, "chain_id" => chain_id.to_string())
            .increment(invalidated as u64);
        metrics::gauge!(Self::WATCHED_ADDRESSES, "chain_id" => chain_id.to_string())
            .set(watched as f64);
    }
}
