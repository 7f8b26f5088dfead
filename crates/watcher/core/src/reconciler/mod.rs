//! Recording of matched transfers as invoice payments and their revalidation.

mod error;
pub use error::ReconcilerError;

mod metrics;
pub(crate) use metrics::Metrics;

mod payments;
pub use payments::{MatchOutcome, PaymentReconciler, SweepSummary};
