use crate::{StorageError, models::ChainProgress};
use alloy_primitives::Address;
use paywatch_types::{
    ChainConfiguration, Invoice, InvoicePaymentMethod, Payment, PaymentData, SettingsKind,
    SupportedPaymentMethod,
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::fmt::Debug;

/// Durable key-value store for per-chain settings records.
///
/// Keys have the form `<RecordKind>_<chainId>[_erc20]`, see [`SettingsKind::key`].
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait SettingsStore: Debug {
    /// Reads the record stored under `key`.
    ///
    /// # Returns
    /// * `Ok(Some(value))` if a record exists.
    /// * `Ok(None)` if nothing was stored under `key`.
    /// * `Err(StorageError)` if the record could not be read.
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Replaces the record stored under `key`.
    fn put(&self, key: &str, value: Value) -> Result<(), StorageError>;
}

/// Typed accessors on top of a [`SettingsStore`].
pub trait SettingsStoreExt: SettingsStore {
    /// Reads and decodes the record stored under `key`.
    fn get_record<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        self.get(key)?.map(serde_json::from_value).transpose().map_err(StorageError::from)
    }

    /// Encodes and stores `record` under `key`.
    fn put_record<T: Serialize>(&self, key: &str, record: &T) -> Result<(), StorageError> {
        self.put(key, serde_json::to_value(record)?)
    }

    /// Loads the processing progress of a chain.
    fn chain_progress(
        &self,
        chain_id: u64,
        token_tracking: bool,
    ) -> Result<Option<ChainProgress>, StorageError> {
        self.get_record(&ChainProgress::key_for(chain_id, token_tracking))
    }

    /// Persists the processing progress of a chain.
    fn save_chain_progress(&self, progress: &ChainProgress) -> Result<(), StorageError> {
        self.put_record(&progress.key(), progress)
    }

    /// Loads the RPC configuration of a chain.
    fn chain_configuration(
        &self,
        chain_id: u64,
    ) -> Result<Option<ChainConfiguration>, StorageError> {
        self.get_record(&SettingsKind::ChainConfiguration.key(chain_id, false))
    }

    /// Persists the RPC configuration of a chain.
    fn save_chain_configuration(&self, config: &ChainConfiguration) -> Result<(), StorageError> {
        self.put_record(&SettingsKind::ChainConfiguration.key(config.chain_id, false), config)
    }
}

impl<S: SettingsStore + ?Sized> SettingsStoreExt for S {}

/// Read and write access to invoices and their payments.
///
/// Implementations are expected to be thread-safe; the reconciler calls them from concurrent
/// tasks.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait InvoiceStore: Debug {
    /// Fetches an invoice by id.
    fn invoice(&self, invoice_id: &str) -> Result<Option<Invoice>, StorageError>;

    /// Finds the invoice that was ever assigned `address` as deposit address for `currency`.
    fn invoice_by_address(
        &self,
        currency: &str,
        address: Address,
    ) -> Result<Option<Invoice>, StorageError>;

    /// Ids of all invoices that may still receive payments.
    fn pending_invoice_ids(&self) -> Result<Vec<String>, StorageError>;

    /// Fetches the invoices with the given ids, skipping unknown ids.
    fn invoices(&self, invoice_ids: &[String]) -> Result<Vec<Invoice>, StorageError>;

    /// Records a new payment on an invoice.
    ///
    /// # Returns
    /// * `Ok(Some(payment))` with the recorded payment.
    /// * `Ok(None)` if a payment with the same identity already exists.
    /// * `Err(StorageError::InvoiceNotFound)` if the invoice does not exist.
    fn add_payment(
        &self,
        invoice_id: &str,
        data: PaymentData,
        accounted: bool,
    ) -> Result<Option<Payment>, StorageError>;

    /// Replaces the stored payments with the same identity as the given ones.
    fn update_payments(&self, invoice_id: &str, payments: &[Payment]) -> Result<(), StorageError>;

    /// Assigns a new deposit address to one of the invoice's payment methods.
    fn new_address(
        &self,
        invoice_id: &str,
        method: InvoicePaymentMethod,
    ) -> Result<(), StorageError>;
}

/// Store level payment method configuration.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait PaymentMethodStore: Debug {
    /// Fetches the payment method a store configured for `currency`.
    fn payment_method(
        &self,
        store_id: &str,
        currency: &str,
    ) -> Result<Option<SupportedPaymentMethod>, StorageError>;

    /// Persists an updated payment method, e.g. after advancing its derivation index.
    fn update_payment_method(&self, method: SupportedPaymentMethod) -> Result<(), StorageError>;
}
