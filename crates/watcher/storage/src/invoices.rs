use crate::{InvoiceStore, StorageError};
use alloy_primitives::Address;
use paywatch_types::{Invoice, InvoicePaymentMethod, Payment, PaymentData};
use std::{
    collections::HashMap,
    sync::RwLock,
    time::{SystemTime, UNIX_EPOCH},
};
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    invoices: HashMap<String, Invoice>,
    // (currency, address) -> invoice id, including addresses that were since replaced
    addresses: HashMap<(String, Address), String>,
}

impl Inner {
    fn index(&mut self, invoice: &Invoice) {
        for method in &invoice.payment_methods {
            self.addresses
                .insert((method.currency.clone(), method.deposit_address), invoice.id.clone());
        }
    }

    fn invoice_mut(&mut self, invoice_id: &str) -> Result<&mut Invoice, StorageError> {
        self.invoices
            .get_mut(invoice_id)
            .ok_or_else(|| StorageError::InvoiceNotFound(invoice_id.to_string()))
    }
}

/// An [`InvoiceStore`] holding everything in memory.
#[derive(Debug, Default)]
pub struct MemoryInvoiceStore {
    inner: RwLock<Inner>,
}

impl MemoryInvoiceStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `invoices`.
    pub fn with_invoices(invoices: impl IntoIterator<Item = Invoice>) -> Result<Self, StorageError> {
        let store = Self::new();
        for invoice in invoices {
            store.insert(invoice)?;
        }
        Ok(store)
    }

    /// Inserts or replaces an invoice.
    pub fn insert(&self, invoice: Invoice) -> Result<(), StorageError> {
        let mut inner = self.inner.write().map_err(|_| StorageError::LockPoisoned)?;
        inner.index(&invoice);
        inner.invoices.insert(invoice.id.clone(), invoice);
        Ok(())
    }
}

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|elapsed| elapsed.as_secs()).unwrap_or_default()
}

impl InvoiceStore for MemoryInvoiceStore {
    fn invoice(&self, invoice_id: &str) -> Result<Option<Invoice>, StorageError> {
        let inner = self.inner.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(inner.invoices.get(invoice_id).cloned())
    }

    fn invoice_by_address(
        &self,
        currency: &str,
        address: Address,
    ) -> Result<Option<Invoice>, StorageError> {
        let inner = self.inner.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(inner
            .addresses
            .get(&(currency.to_string(), address))
            .and_then(|invoice_id| inner.invoices.get(invoice_id))
            .cloned())
    }

    fn pending_invoice_ids(&self) -> Result<Vec<String>, StorageError> {
        let inner = self.inner.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut ids: Vec<String> = inner
            .invoices
            .values()
            .filter(|invoice| invoice.is_pending())
            .map(|invoice| invoice.id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    fn invoices(&self, invoice_ids: &[String]) -> Result<Vec<Invoice>, StorageError> {
        let inner = self.inner.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(invoice_ids.iter().filter_map(|id| inner.invoices.get(id)).cloned().collect())
    }

    fn add_payment(
        &self,
        invoice_id: &str,
        data: PaymentData,
        accounted: bool,
    ) -> Result<Option<Payment>, StorageError> {
        let mut inner = self.inner.write().map_err(|_| StorageError::LockPoisoned)?;
        let invoice = inner.invoice_mut(invoice_id)?;
        if invoice.payment(&data.currency, &data.id()).is_some() {
            return Ok(None);
        }

        let payment = Payment::new(data, accounted, now());
        invoice.payments.push(payment.clone());
        debug!(
            target: "paywatch::storage",
            invoice_id,
            payment_id = %payment.id(),
            accounted,
            "Payment added"
        );
        Ok(Some(payment))
    }

    fn update_payments(&self, invoice_id: &str, payments: &[Payment]) -> Result<(), StorageError> {
        let mut inner = self.inner.write().map_err(|_| StorageError::LockPoisoned)?;
        let invoice = inner.invoice_mut(invoice_id)?;
        for updated in payments {
            let (currency, id) = (updated.data.currency.as_str(), updated.id());
            let stored = invoice.payments.iter_mut().find(|stored| stored.is(currency, &id));
            if let Some(stored) = stored {
                *stored = updated.clone();
            }
        }
        Ok(())
    }

    fn new_address(
        &self,
        invoice_id: &str,
        method: InvoicePaymentMethod,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write().map_err(|_| StorageError::LockPoisoned)?;
        if !inner.invoices.contains_key(invoice_id) {
            return Err(StorageError::InvoiceNotFound(invoice_id.to_string()));
        }
        inner
            .addresses
            .insert((method.currency.clone(), method.deposit_address), invoice_id.to_string());

        let invoice = inner.invoice_mut(invoice_id)?;
        match invoice.payment_method_mut(&method.currency) {
            Some(stored) => *stored = method,
            None => invoice.payment_methods.push(method),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{B256, U256};
    use paywatch_types::InvoiceStatus;

    fn invoice(id: &str, status: InvoiceStatus, address: Address) -> Invoice {
        Invoice {
            id: id.to_string(),
            store_id: "store".to_string(),
            status,
            payment_methods: vec![InvoicePaymentMethod {
                currency: "ETH".to_string(),
                deposit_address: address,
                index: 0,
                amount: U256::from(100),
            }],
            ..Default::default()
        }
    }

    fn data(address: Address, tx: u8, amount: u64) -> PaymentData {
        PaymentData {
            address,
            amount: U256::from(amount),
            transaction_id: B256::repeat_byte(tx),
            currency: "ETH".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_pending_ids_and_lookup() {
        let store = MemoryInvoiceStore::with_invoices([
            invoice("b", InvoiceStatus::Processing, Address::repeat_byte(2)),
            invoice("a", InvoiceStatus::New, Address::repeat_byte(1)),
            invoice("c", InvoiceStatus::Settled, Address::repeat_byte(3)),
        ])
        .unwrap();

        assert_eq!(store.pending_invoice_ids().unwrap(), vec!["a", "b"]);
        assert_eq!(
            store.invoice_by_address("ETH", Address::repeat_byte(3)).unwrap().map(|i| i.id),
            Some("c".to_string())
        );
        assert!(store.invoice_by_address("USDT", Address::repeat_byte(3)).unwrap().is_none());
        assert_eq!(store.invoices(&["a".to_string(), "zz".to_string()]).unwrap().len(), 1);
    }

    #[test]
    fn test_add_payment_is_idempotent_per_identity() {
        let address = Address::repeat_byte(1);
        let store =
            MemoryInvoiceStore::with_invoices([invoice("a", InvoiceStatus::New, address)]).unwrap();

        assert!(store.add_payment("a", data(address, 1, 10), true).unwrap().is_some());
        assert!(store.add_payment("a", data(address, 1, 20), true).unwrap().is_none());
        assert_eq!(store.invoice("a").unwrap().unwrap().payments.len(), 1);

        let err = store.add_payment("missing", data(address, 2, 10), true).unwrap_err();
        assert_eq!(err, StorageError::InvoiceNotFound("missing".to_string()));
    }

    #[test]
    fn test_update_payments_replaces_matching() {
        let address = Address::repeat_byte(1);
        let store =
            MemoryInvoiceStore::with_invoices([invoice("a", InvoiceStatus::New, address)]).unwrap();
        let mut payment = store.add_payment("a", data(address, 1, 10), true).unwrap().unwrap();

        payment.accounted = false;
        payment.data.confirmation_count = 3;
        store.update_payments("a", &[payment.clone()]).unwrap();

        let stored = store.invoice("a").unwrap().unwrap();
        assert_eq!(stored.payments, vec![payment]);
    }

    #[test]
    fn test_same_transaction_in_two_currencies() {
        let address = Address::repeat_byte(1);
        let store =
            MemoryInvoiceStore::with_invoices([invoice("a", InvoiceStatus::New, address)]).unwrap();
        let native = store.add_payment("a", data(address, 1, 300), true).unwrap().unwrap();
        let token = PaymentData {
            log_index: Some(3),
            currency: "USDT".to_string(),
            ..data(address, 1, 500)
        };
        let mut token = store.add_payment("a", token, true).unwrap().unwrap();

        token.data.confirmation_count = 4;
        store.update_payments("a", &[token.clone()]).unwrap();

        let stored = store.invoice("a").unwrap().unwrap();
        assert_eq!(stored.payments, vec![native, token]);
    }

    #[test]
    fn test_new_address_keeps_old_address_indexed() {
        let old = Address::repeat_byte(1);
        let new = Address::repeat_byte(9);
        let store =
            MemoryInvoiceStore::with_invoices([invoice("a", InvoiceStatus::New, old)]).unwrap();

        store
            .new_address(
                "a",
                InvoicePaymentMethod {
                    currency: "ETH".to_string(),
                    deposit_address: new,
                    index: 1,
                    amount: U256::from(100),
                },
            )
            .unwrap();

        let stored = store.invoice("a").unwrap().unwrap();
        assert_eq!(stored.payment_method("ETH").map(|m| m.deposit_address), Some(new));
        assert!(store.invoice_by_address("ETH", old).unwrap().is_some());
        assert!(store.invoice_by_address("ETH", new).unwrap().is_some());
    }
}
