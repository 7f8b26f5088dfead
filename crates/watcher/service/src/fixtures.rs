//! Seed data for the in-memory invoice and payment method stores.

use anyhow::{Context, Result};
use paywatch_core::DerivedAddressTable;
use paywatch_types::{Invoice, SupportedPaymentMethod};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Invoices, payment methods and pre-derived addresses loaded at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Fixtures {
    /// Invoices to watch.
    pub invoices: Vec<Invoice>,
    /// Store payment methods used for address reservation.
    pub payment_methods: Vec<SupportedPaymentMethod>,
    /// Addresses derived ahead of time, per extended public key.
    pub derived_addresses: DerivedAddressTable,
}

impl Fixtures {
    /// Reads fixtures from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read fixtures from {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse fixtures from {}", path.display()))
    }
}
