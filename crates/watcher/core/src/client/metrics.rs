/// Metrics for chain RPC calls.
#[derive(Debug, Clone)]
pub(crate) struct Metrics;

impl Metrics {
    pub(crate) const RPC_CALLS_TOTAL: &'static str = "paywatch_chain_rpc_calls_total";
    pub(crate) const RPC_CALL_DURATION_SECONDS: &'static str =
        "paywatch_chain_rpc_call_duration_seconds";

    pub(crate) const CALL_BLOCK_NUMBER: &'static str = "block_number";
    pub(crate) const CALL_BLOCK_REF: &'static str = "block_ref";
    pub(crate) const CALL_BLOCK_WITH_TRANSACTIONS: &'static str = "block_with_transactions";
    pub(crate) const CALL_TRANSFER_LOGS: &'static str = "transfer_logs";
    pub(crate) const CALL_TRANSACTION: &'static str = "transaction";
    pub(crate) const CALL_TRANSACTION_RECEIPT: &'static str = "transaction_receipt";

    const CALLS: [&'static str; 6] = [
        Self::CALL_BLOCK_NUMBER,
        Self::CALL_BLOCK_REF,
        Self::CALL_BLOCK_WITH_TRANSACTIONS,
        Self::CALL_TRANSFER_LOGS,
        Self::CALL_TRANSACTION,
        Self::CALL_TRANSACTION_RECEIPT,
    ];

    pub(crate) fn init(chain_id: u64) {
        Self::describe();
        Self::zero(chain_id);
    }

    fn describe() {
        metrics::describe_counter!(
            Self::RPC_CALLS_TOTAL,
            metrics::Unit::Count,
            "Total number of chain RPC calls by outcome"
        );
        metrics::describe_histogram!(
            Self::RPC_CALL_DURATION_SECONDS,
            metrics::Unit::Seconds,
            "Duration of chain RPC calls"
        );
    }

    fn zero(chain_id: u64) {
        for call in Self::CALLS {
            for outcome in [paywatch_metrics::OUTCOME_SUCCESS, paywatch_metrics::OUTCOME_ERROR] {
                metrics::counter!(
                    Self::RPC_CALLS_TOTAL,
                    "call" => call,
                    "outcome" => outcome,
                    "chain_id" => chain_id.to_string()
                )
                .increment(0);
            }
            metrics::histogram!(
                Self::RPC_CALL_DURATION_SECONDS,
                "call" => call,
                "chain_id" => chain_id.to_string()
            )
            .record(0.0);
        }
    }
}
