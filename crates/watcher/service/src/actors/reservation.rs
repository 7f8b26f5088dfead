use async_trait::async_trait;
use paywatch_core::ReservationCall;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{ServiceActor, WatcherControl};

/// Serves the address reservations requested by the chain watchers.
#[derive(Debug)]
pub struct ReservationActor<W> {
    control: W,
    calls: mpsc::Receiver<ReservationCall>,
    cancel_token: CancellationToken,
}

impl<W> ReservationActor<W>
where
    W: WatcherControl + 'static,
{
    /// Creates a new [`ReservationActor`].
    pub const fn new(
        control: W,
        calls: mpsc::Receiver<ReservationCall>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self { control, calls, cancel_token }
    }

    async fn serve(&self, call: ReservationCall) {
        let ReservationCall { request, reply } = call;
        let op_id = request.op_id;
        if reply.is_closed() {
            debug!(target: "paywatch::reservation_actor", %op_id, "Skipping abandoned reservation");
            return;
        }
        let response = self.control.handle_reservation(request).await;
        if reply.send(response).is_err() {
            // the requester timed out meanwhile
            warn!(target: "paywatch::reservation_actor", %op_id, "Reservation requester is gone");
        }
    }
}

#[async_trait]
impl<W> ServiceActor for ReservationActor<W>
where
    W: WatcherControl + 'static,
{
    type InboundEvent = ReservationCall;
    type Error = ReservationActorError;

    async fn start(mut self) -> Result<(), Self::Error> {
        info!(target: "paywatch::reservation_actor", "Starting ReservationActor");

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!(target: "paywatch::reservation_actor", "ReservationActor cancellation requested, stopping...");
                    break;
                }
                maybe_call = self.calls.recv() => {
                    let Some(call) = maybe_call else {
                        info!(target: "paywatch::reservation_actor", "Reservation receiver closed, stopping ReservationActor");
                        return Err(ReservationActorError::ReceiverClosed);
                    };
                    debug!(target: "paywatch::reservation_actor", op_id = %call.request.op_id, "Serving reservation");
                    self.serve(call).await;
                }
            }
        }
        Ok(())
    }
}

/// Errors of the [`ReservationActor`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReservationActorError {
    /// Every [`ReservationClient`](paywatch_core::ReservationClient) was dropped.
    #[error("reservation receiver closed")]
    ReceiverClosed,
}
