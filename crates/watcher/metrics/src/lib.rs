//! Metric helpers shared across the paywatch components.
//!
//! Every instrumented call is recorded as one `<prefix>_calls_total` counter labelled with the
//! call name and its outcome, plus a `<prefix>_call_duration_seconds` histogram. Components
//! describe and zero their metrics up front and then wrap calls with [`observe_call!`] or
//! [`observe_call_async!`].

mod macros;

mod reporter;
pub use reporter::MetricsReporter;

/// Label value recorded for calls that returned `Ok`.
pub const OUTCOME_SUCCESS: &str = "success";

/// Label value recorded for calls that returned `Err`.
pub const OUTCOME_ERROR: &str = "error";

/// Returns the outcome label for a result.
pub const fn outcome<T, E>(result: &Result<T, E>) -> &'static str {
    match result {
        Ok(_) => OUTCOME_SUCCESS,
        Err(_) => OUTCOME_ERROR,
    }
}
