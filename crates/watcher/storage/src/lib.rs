//! Persistent storage for paywatch.
//!
//! Three concerns live here:
//! - per-chain settings records ([`ChainProgress`] and chain configuration) behind the
//!   [`SettingsStore`] trait, with a JSON file backed and an in-memory implementation;
//! - the invoice and payment store the reconciler writes through ([`InvoiceStore`]);
//! - store level payment methods used for address derivation ([`PaymentMethodStore`]).
//!
//! The in-memory invoice and payment method stores are reference implementations; production
//! deployments provide their own.

pub mod models;
pub use models::{ChainProgress, MAX_RETAINED_BLOCKS};

mod error;
pub use error::StorageError;

mod metrics;
pub(crate) use metrics::Metrics;

mod settings;
pub use settings::{FileSettings, MemorySettings};

mod invoices;
pub use invoices::MemoryInvoiceStore;

mod payment_methods;
pub use payment_methods::MemoryPaymentMethodStore;

mod traits;
pub use traits::{InvoiceStore, PaymentMethodStore, SettingsStore, SettingsStoreExt};
