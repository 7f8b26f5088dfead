/// Container for settings store metrics.
#[derive(Debug, Clone)]
pub(crate) struct Metrics;

impl Metrics {
    pub(crate) const SETTINGS_CALLS_TOTAL: &'static str = "paywatch_settings_calls_total";
    pub(crate) const SETTINGS_CALL_DURATION_SECONDS: &'static str =
        "paywatch_settings_call_duration_seconds";

    pub(crate) const CALL_GET: &'static str = "get";
    pub(crate) const CALL_PUT: &'static str = "put";

    pub(crate) fn init() {
        Self::describe();
        Self::zero(Self::CALL_GET);
        Self::zero(Self::CALL_PUT);
    }

    fn describe() {
        metrics::describe_counter!(
            Self::SETTINGS_CALLS_TOTAL,
            metrics::Unit::Count,
            "Total number of settings store calls by outcome"
        );
        metrics::describe_histogram!(
            Self::SETTINGS_CALL_DURATION_SECONDS,
            metrics::Unit::Seconds,
            "Duration of settings store calls"
        );
    }

    fn zero(call: &'static str) {
        for outcome in [paywatch_metrics::OUTCOME_SUCCESS, paywatch_metrics::OUTCOME_ERROR] {
            metrics::counter!(Self::SETTINGS_CALLS_TOTAL, "call" => call, "outcome" => outcome)
                .increment(0);
        }
        metrics::histogram!(Self::SETTINGS_CALL_DURATION_SECONDS, "call" => call).record(0.0);
    }
}
