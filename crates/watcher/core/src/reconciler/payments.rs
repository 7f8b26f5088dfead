use super::{Metrics, ReconcilerError};
use crate::{
    client::{ChainClient, ChainClientError},
    config::ChainCurrencies,
    reservation::AddressReserver,
    watched::WatchedAddresses,
};
use alloy_primitives::{Address, U256};
use futures::future::join_all;
use paywatch_storage::InvoiceStore;
use paywatch_types::{
    Invoice, InvoiceEvent, InvoicePaymentMethod, MatchedTransaction, MatchedTransfer, Payment,
    PaymentData,
};
use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, trace, warn};

/// What [`PaymentReconciler::handle_match`] did with a matched transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The transfer pays no known invoice, or its currency is not tracked.
    Ignored,
    /// A new payment was recorded.
    Recorded(Payment),
    /// The transfer was merged into an existing payment.
    Merged(Payment),
}

/// Counters of one [`PaymentReconciler::sweep`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Pending invoices paid in a currency of the chain.
    pub invoices: usize,
    /// Payments revalidated.
    pub checked: usize,
    /// Payments persisted after revalidation.
    pub updated: usize,
    /// Accounted payments found invalid.
    pub invalidated: usize,
    /// Payments that could not be checked and were left untouched.
    pub unverified: usize,
    /// Size of the rebuilt watched set.
    pub watched: usize,
}

#[derive(Debug)]
enum Revalidation {
    Valid(Payment),
    Invalid(Payment),
    Unverified,
}

/// Turns matched transfers into invoice payments and keeps recorded payments in line with the
/// chain.
#[derive(Debug)]
pub struct PaymentReconciler<I, C, R> {
    currencies: Arc<ChainCurrencies>,
    invoices: Arc<I>,
    client: C,
    reserver: R,
    watched: Arc<WatchedAddresses>,
    events: broadcast::Sender<InvoiceEvent>,
    sweep_lock: Mutex<()>,
    metrics_enabled: bool,
}

impl<I, C, R> PaymentReconciler<I, C, R>
where
    I: InvoiceStore + Send + Sync,
    C: ChainClient,
    R: AddressReserver,
{
    /// Creates a reconciler for the chain of `currencies`.
    pub fn new(
        currencies: Arc<ChainCurrencies>,
        invoices: Arc<I>,
        client: C,
        reserver: R,
        watched: Arc<WatchedAddresses>,
        events: broadcast::Sender<InvoiceEvent>,
    ) -> Self {
        Self {
            currencies,
            invoices,
            client,
            reserver,
            watched,
            events,
            sweep_lock: Mutex::new(()),
            metrics_enabled: false,
        }
    }

    /// Enables payment metrics.
    pub fn with_metrics(mut self) -> Self {
        Metrics::init(self.chain_id());
        self.metrics_enabled = true;
        self
    }

    fn chain_id(&self) -> u64 {
        self.currencies.chain_id
    }

    fn publish(&self, event: InvoiceEvent) {
        if self.events.send(event).is_err() {
            trace!(target: "paywatch::reconciler", chain_id = self.chain_id(), "No invoice event subscribers");
        }
    }

    /// Records a matched transfer on the invoice owning the paid address.
    ///
    /// A transfer already recorded under the same payment identity is merged into the stored
    /// payment instead of being added twice.
    pub async fn handle_match(
        &self,
        matched: MatchedTransaction,
    ) -> Result<MatchOutcome, ReconcilerError> {
        let chain_id = self.chain_id();
        let transfer = &matched.transfer;
        let transaction_hash = transfer.transaction_hash();

        let (Some(currency), Some(address)) =
            (self.currencies.currency_of(transfer), transfer.recipient())
        else {
            debug!(target: "paywatch::reconciler", chain_id, %transaction_hash, "Ignoring transfer of untracked currency");
            return Ok(MatchOutcome::Ignored);
        };
        let Some(invoice) = self.invoices.invoice_by_address(currency, address)? else {
            debug!(target: "paywatch::reconciler", chain_id, %transaction_hash, %address, "No invoice for paid address");
            return Ok(MatchOutcome::Ignored);
        };

        let tip = self.client.block_number().await?;
        let data = payment_data(transfer, address, currency, tip);
        let accounted = transfer.accounted();
        let id = data.id();

        let existing = invoice.payment(currency, &id).cloned();
        let stored = match existing {
            Some(payment) => Some(payment),
            None => match self.invoices.add_payment(&invoice.id, data.clone(), accounted)? {
                Some(payment) => {
                    info!(
                        target: "paywatch::reconciler",
                        chain_id,
                        invoice_id = %invoice.id,
                        payment_id = %id,
                        amount = %payment.data.amount,
                        confirmations = payment.data.confirmation_count,
                        accounted,
                        "Payment recorded"
                    );
                    if self.metrics_enabled {
                        Metrics::record_payment(chain_id);
                    }
                    self.payment_recorded(invoice, &payment).await?;
                    return Ok(MatchOutcome::Recorded(payment));
                }
                // recorded concurrently
                None => self
                    .invoices
                    .invoice(&invoice.id)?
                    .and_then(|stored| stored.payment(currency, &id).cloned()),
            },
        };
        let Some(mut payment) = stored else {
            return Ok(MatchOutcome::Ignored);
        };

        payment.data.merge(&data);
        payment.accounted = accounted;
        self.invoices.update_payments(&invoice.id, std::slice::from_ref(&payment))?;
        debug!(
            target: "paywatch::reconciler",
            chain_id,
            invoice_id = %invoice.id,
            payment_id = %id,
            confirmations = payment.data.confirmation_count,
            "Payment updated"
        );
        self.publish(InvoiceEvent::NeedUpdate { invoice_id: invoice.id });
        Ok(MatchOutcome::Merged(payment))
    }

    async fn payment_recorded(
        &self,
        mut invoice: Invoice,
        payment: &Payment,
    ) -> Result<(), ReconcilerError> {
        let currency = payment.data.currency.as_str();
        invoice.payments.push(payment.clone());

        let pays_current_address = invoice
            .payment_method(currency)
            .is_some_and(|method| method.deposit_address == payment.data.address);
        if payment.accounted && pays_current_address && invoice.amount_due(currency) > U256::ZERO {
            self.issue_next_address(&invoice, currency).await?;
        }

        self.publish(InvoiceEvent::PaymentReceived {
            invoice_id: invoice.id.clone(),
            payment: payment.clone(),
        });
        Ok(())
    }

    async fn issue_next_address(
        &self,
        invoice: &Invoice,
        currency: &str,
    ) -> Result<(), ReconcilerError> {
        let Some(method) = invoice.payment_method(currency) else {
            return Ok(());
        };

        let reserved = match self.reserver.reserve(&invoice.store_id, currency).await {
            Ok(reserved) => reserved,
            Err(err) => {
                warn!(
                    target: "paywatch::reconciler",
                    chain_id = self.chain_id(),
                    invoice_id = %invoice.id,
                    currency,
                    %err,
                    "Failed to reserve next deposit address"
                );
                return Ok(());
            }
        };

        let method = InvoicePaymentMethod {
            deposit_address: reserved.address,
            index: reserved.index,
            ..method.clone()
        };
        self.invoices.new_address(&invoice.id, method)?;
        self.watched.append(reserved.address);
        info!(
            target: "paywatch::reconciler",
            chain_id = self.chain_id(),
            invoice_id = %invoice.id,
            currency,
            address = %reserved.address,
            index = reserved.index,
            "Assigned next deposit address"
        );
        self.publish(InvoiceEvent::NewAddress {
            invoice_id: invoice.id.clone(),
            currency: currency.to_string(),
            address: reserved.address,
        });
        Ok(())
    }

    /// Rebuilds the watched addresses from the pending invoices and revalidates every payment
    /// they carry in a currency of this chain.
    ///
    /// Only one sweep runs at a time; a concurrent call waits for the running one.
    pub async fn sweep(&self) -> Result<SweepSummary, ReconcilerError> {
        let _guard = self.sweep_lock.lock().await;
        let chain_id = self.chain_id();

        self.watched.begin_rebuild();
        let pending = self.invoices.pending_invoice_ids()?;
        let invoices: Vec<Invoice> = if pending.is_empty() {
            Vec::new()
        } else {
            self.invoices.invoices(&pending)?
        };
        let invoices: Vec<Invoice> = invoices
            .into_iter()
            .filter(|invoice| invoice.accepts_any(self.currencies.codes()))
            .collect();

        let payments: Vec<(&Invoice, &Payment)> = invoices
            .iter()
            .flat_map(|invoice| {
                invoice
                    .payments
                    .iter()
                    .filter(|payment| self.currencies.contains(&payment.data.currency))
                    .map(move |payment| (invoice, payment))
            })
            .collect();

        let deposit_addresses = invoices.iter().flat_map(|invoice| {
            invoice
                .payment_methods
                .iter()
                .filter(|method| self.currencies.contains(&method.currency))
                .map(|method| method.deposit_address)
        });
        let addresses: HashSet<Address> = payments
            .iter()
            .map(|(_, payment)| payment.data.address)
            .chain(deposit_addresses)
            .collect();
        self.watched.replace(addresses);

        let mut summary = SweepSummary {
            invoices: invoices.len(),
            checked: payments.len(),
            watched: self.watched.len(),
            ..Default::default()
        };
        info!(
            target: "paywatch::reconciler",
            chain_id,
            invoices = summary.invoices,
            payments = summary.checked,
            watched = summary.watched,
            "Checking existing payments"
        );

        if !payments.is_empty() {
            let tip = self.client.block_number().await?;
            let results =
                join_all(payments.iter().map(|(_, payment)| self.revalidate(payment, tip))).await;

            let mut updates: BTreeMap<&str, Vec<Payment>> = BTreeMap::new();
            for ((invoice, original), result) in payments.iter().zip(results) {
                let payment = match result {
                    Revalidation::Valid(payment) => payment,
                    Revalidation::Invalid(payment) => {
                        if original.accounted {
                            summary.invalidated += 1;
                        }
                        payment
                    }
                    Revalidation::Unverified => {
                        summary.unverified += 1;
                        continue;
                    }
                };
                summary.updated += 1;
                updates.entry(invoice.id.as_str()).or_default().push(payment);
            }

            for (invoice_id, payments) in &updates {
                self.invoices.update_payments(invoice_id, payments)?;
                self.publish(InvoiceEvent::NeedUpdate { invoice_id: invoice_id.to_string() });
            }
        }

        if self.metrics_enabled {
            Metrics::record_sweep(chain_id, summary.invalidated, summary.watched);
        }
        info!(
            target: "paywatch::reconciler",
            chain_id,
            updated = summary.updated,
            invalidated = summary.invalidated,
            unverified = summary.unverified,
            checked = summary.checked,
            "Existing payments checked"
        );
        Ok(summary)
    }

    async fn revalidate(&self, payment: &Payment, tip: u64) -> Revalidation {
        let result = match payment.data.log_index {
            Some(log_index) => self.revalidate_token(payment, log_index, tip).await,
            None => self.revalidate_native(payment, tip).await,
        };

        match result {
            Ok(Some(payment)) => Revalidation::Valid(payment),
            Ok(None) => {
                warn!(
                    target: "paywatch::reconciler",
                    chain_id = self.chain_id(),
                    payment_id = %payment.id(),
                    "Payment is not valid on chain anymore"
                );
                Revalidation::Invalid(Payment { accounted: false, ..payment.clone() })
            }
            Err(err) => {
                warn!(
                    target: "paywatch::reconciler",
                    chain_id = self.chain_id(),
                    payment_id = %payment.id(),
                    %err,
                    "Failed to revalidate payment"
                );
                Revalidation::Unverified
            }
        }
    }

    async fn revalidate_token(
        &self,
        payment: &Payment,
        log_index: u64,
        tip: u64,
    ) -> Result<Option<Payment>, ChainClientError> {
        let Some(receipt) = self.client.transaction_receipt(payment.data.transaction_id).await?
        else {
            return Ok(None);
        };
        let Some(log) = receipt.log_at(log_index) else {
            return Ok(None);
        };
        if !receipt.success || log.to != payment.data.address || log.removed {
            return Ok(None);
        }

        let mut payment = payment.clone();
        payment.data.amount = log.value;
        payment.data.log_index = Some(log.log_index);
        payment.data.block_number = receipt.block_number;
        payment.data.confirmation_count = confirmations(tip, receipt.block_number);
        payment.accounted = true;
        Ok(Some(payment))
    }

    async fn revalidate_native(
        &self,
        payment: &Payment,
        tip: u64,
    ) -> Result<Option<Payment>, ChainClientError> {
        let hash = payment.data.transaction_id;
        let Some(tx) = self.client.transaction(hash).await? else {
            return Ok(None);
        };
        let Some(receipt) = self.client.transaction_receipt(hash).await? else {
            return Ok(None);
        };
        if !receipt.success || !tx.is_to(&payment.data.address) {
            return Ok(None);
        }

        let mut payment = payment.clone();
        payment.data.amount = tx.value;
        payment.data.log_index = None;
        payment.data.block_number = receipt.block_number;
        payment.data.confirmation_count = confirmations(tip, receipt.block_number);
        payment.accounted = true;
        Ok(Some(payment))
    }
}

fn confirmations(tip: u64, block_number: Option<u64>) -> u64 {
    block_number.map_or(0, |number| tip.saturating_sub(number))
}

fn payment_data(
    transfer: &MatchedTransfer,
    address: Address,
    currency: &str,
    tip: u64,
) -> PaymentData {
    let (amount, log_index) = match transfer {
        MatchedTransfer::Native(tx) => (tx.value, None),
        MatchedTransfer::Token(log) => (log.value, Some(log.log_index)),
    };
    let block_number = transfer.block_number();

    PaymentData {
        address,
        amount,
        transaction_id: transfer.transaction_hash(),
        log_index,
        block_number,
        confirmation_count: confirmations(tip, block_number),
        currency: currency.to_string(),
    }
}
