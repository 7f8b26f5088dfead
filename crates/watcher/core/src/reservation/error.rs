use paywatch_types::OperationId;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by an [`AddressReserver`](super::AddressReserver).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReservationError {
    /// No response arrived in time.
    #[error("no reservation response within {0:?}")]
    Timeout(Duration),

    /// The reservation handler is gone.
    #[error("reservation channel closed")]
    ChannelClosed,

    /// The response answers a different request.
    #[error("reservation response {received} does not answer request {expected}")]
    CorrelationMismatch {
        /// Id of the request.
        expected: OperationId,
        /// Id carried by the response.
        received: OperationId,
    },

    /// The handler could not reserve an address.
    #[error("no address reserved for {currency} of store {store_id}")]
    Failed {
        /// Store owning the payment method.
        store_id: String,
        /// Currency of the payment method.
        currency: String,
    },
}
