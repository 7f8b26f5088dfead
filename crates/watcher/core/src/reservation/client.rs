use super::{AddressReserver, ReservationError};
use async_trait::async_trait;
use paywatch_types::{ReservationRequest, ReservationResponse, ReservedAddress};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// How long a reservation may take before it is abandoned.
pub const RESERVATION_TIMEOUT: Duration = Duration::from_secs(60);

/// A reservation request together with the channel its response must be sent on.
#[derive(Debug)]
pub struct ReservationCall {
    /// The request.
    pub request: ReservationRequest,
    /// Where the response goes. Dropped without answer if the caller gave up.
    pub reply: oneshot::Sender<ReservationResponse>,
}

/// [`AddressReserver`] sending [`ReservationCall`]s to a remote handler.
#[derive(Debug, Clone)]
pub struct ReservationClient {
    sender: mpsc::Sender<ReservationCall>,
    timeout: Duration,
}

impl ReservationClient {
    /// Creates a client sending calls on `sender`.
    pub const fn new(sender: mpsc::Sender<ReservationCall>) -> Self {
        Self { sender, timeout: RESERVATION_TIMEOUT }
    }

    /// Creates a client and the receiving end its handler must serve.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ReservationCall>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self::new(sender), receiver)
    }

    /// Overrides [`RESERVATION_TIMEOUT`].
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sends `request` and waits for its response.
    ///
    /// The reply channel is dropped when this returns, whatever the outcome.
    pub async fn request(
        &self,
        request: ReservationRequest,
    ) -> Result<ReservationResponse, ReservationError> {
        let expected = request.op_id;
        let (reply, response) = oneshot::channel();
        let call = ReservationCall { request, reply };

        let round_trip = async {
            self.sender.send(call).await.map_err(|_| ReservationError::ChannelClosed)?;
            response.await.map_err(|_| ReservationError::ChannelClosed)
        };
        let response = tokio::time::timeout(self.timeout, round_trip)
            .await
            .map_err(|_| ReservationError::Timeout(self.timeout))??;

        if response.op_id != expected {
            return Err(ReservationError::CorrelationMismatch { expected, received: response.op_id });
        }
        Ok(response)
    }
}

#[async_trait]
impl AddressReserver for ReservationClient {
    async fn reserve(
        &self,
        store_id: &str,
        currency: &str,
    ) -> Result<ReservedAddress, ReservationError> {
        let request = ReservationRequest::with_random_id(store_id, currency);
        let op_id = request.op_id;
        debug!(target: "paywatch::reservation", %op_id, store_id, currency, "Requesting address");

        let response = self.request(request).await.inspect_err(|err| {
            warn!(target: "paywatch::reservation", %op_id, store_id, currency, %err, "Reservation failed");
        })?;
        response.reserved().cloned().ok_or_else(|| ReservationError::Failed {
            store_id: store_id.to_string(),
            currency: currency.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;
    use paywatch_types::{OperationId, ReservationOutcome};

    fn reserved() -> ReservedAddress {
        ReservedAddress::new(Address::repeat_byte(1), 4, "xpub".to_string())
    }

    #[tokio::test]
    async fn test_reserve_round_trip() {
        let (client, mut calls) = ReservationClient::channel(1);
        let handler = tokio::spawn(async move {
            let call = calls.recv().await.unwrap();
            assert_eq!(call.request.store_id, "store");
            let outcome = ReservationOutcome::Reserved(reserved());
            call.reply.send(ReservationResponse::for_request(&call.request, outcome)).unwrap();
        });

        assert_eq!(client.reserve("store", "ETH").await, Ok(reserved()));
        handler.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_outcome() {
        let (client, mut calls) = ReservationClient::channel(1);
        tokio::spawn(async move {
            let call = calls.recv().await.unwrap();
            call.reply.send(ReservationResponse::failed(&call.request)).unwrap();
        });

        assert_eq!(
            client.reserve("store", "ETH").await,
            Err(ReservationError::Failed { store_id: "store".into(), currency: "ETH".into() })
        );
    }

    #[tokio::test]
    async fn test_mismatched_correlation_id() {
        let (client, mut calls) = ReservationClient::channel(1);
        tokio::spawn(async move {
            let call = calls.recv().await.unwrap();
            let mut response = ReservationResponse::failed(&call.request);
            response.op_id = OperationId::random();
            call.reply.send(response).unwrap();
        });

        let request = ReservationRequest::with_random_id("store", "ETH");
        assert!(matches!(
            client.request(request).await,
            Err(ReservationError::CorrelationMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_closed_channel() {
        let (client, calls) = ReservationClient::channel(1);
        drop(calls);

        assert_eq!(client.reserve("store", "ETH").await, Err(ReservationError::ChannelClosed));
    }

    #[tokio::test]
    async fn test_dropped_reply() {
        let (client, mut calls) = ReservationClient::channel(1);
        tokio::spawn(async move {
            drop(calls.recv().await);
        });

        assert_eq!(client.reserve("store", "ETH").await, Err(ReservationError::ChannelClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_releases_reply_channel() {
        let (client, mut calls) = ReservationClient::channel(1);

        let result = client.reserve("store", "ETH").await;
        assert_eq!(result, Err(ReservationError::Timeout(RESERVATION_TIMEOUT)));

        // the unanswered call is still queued, but nobody waits for its reply anymore
        let call = calls.recv().await.unwrap();
        assert!(call.reply.is_closed());
    }
}
