use async_trait::async_trait;
use paywatch_core::ChainNetworks;
use paywatch_types::{InvoiceEvent, Payment};
use std::convert::Infallible;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::ServiceActor;

/// Logs the invoice events published by the chain watchers.
#[derive(Debug)]
pub struct InvoiceEventActor {
    networks: ChainNetworks,
    events: broadcast::Receiver<InvoiceEvent>,
    cancel_token: CancellationToken,
}

impl InvoiceEventActor {
    /// Creates a new [`InvoiceEventActor`].
    pub const fn new(
        networks: ChainNetworks,
        events: broadcast::Receiver<InvoiceEvent>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self { networks, events, cancel_token }
    }

    /// The payment amount in whole units of its currency.
    fn value(&self, payment: &Payment) -> Option<String> {
        let network = self.networks.by_currency(&payment.data.currency)?;
        payment.data.value(network.divisibility)
    }

    fn log(&self, event: &InvoiceEvent) {
        match event {
            InvoiceEvent::NeedUpdate { invoice_id } => {
                info!(target: "paywatch::events", %invoice_id, "Invoice needs update");
            }
            InvoiceEvent::NewAddress { invoice_id, currency, address } => {
                info!(target: "paywatch::events", %invoice_id, %currency, %address, "New deposit address");
            }
            InvoiceEvent::PaymentReceived { invoice_id, payment } => {
                info!(
                    target: "paywatch::events",
                    %invoice_id,
                    currency = %payment.data.currency,
                    value = self.value(payment).as_deref(),
                    amount = %payment.data.amount,
                    confirmations = payment.data.confirmation_count,
                    "Payment received"
                );
            }
        }
    }
}

#[async_trait]
impl ServiceActor for InvoiceEventActor {
    type InboundEvent = InvoiceEvent;
    type Error = Infallible;

    async fn start(mut self) -> Result<(), Self::Error> {
        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => break,
                next = self.events.recv() => match next {
                    Ok(event) => self.log(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(target: "paywatch::events", skipped, "Invoice event listener lagged behind");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
        info!(target: "paywatch::events", "InvoiceEventActor stopped");
        Ok(())
    }
}
