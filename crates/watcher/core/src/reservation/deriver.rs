use alloy_primitives::Address;
use paywatch_types::SupportedPaymentMethod;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt::Debug};

/// Derives deposit addresses from the extended public key of a payment method.
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait AddressDeriver: Debug + Send + Sync {
    /// Derives the address at `index`, `None` if the key cannot derive it.
    fn derive(&self, method: &SupportedPaymentMethod, index: u32) -> Option<Address>;
}

/// [`AddressDeriver`] serving addresses derived ahead of time, per extended public key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DerivedAddressTable {
    addresses: HashMap<String, Vec<Address>>,
}

impl DerivedAddressTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the addresses of `xpub`, in derivation order starting at index 0.
    pub fn with_addresses(mut self, xpub: impl Into<String>, addresses: Vec<Address>) -> Self {
        self.addresses.insert(xpub.into(), addresses);
        self
    }
}

impl AddressDeriver for DerivedAddressTable {
    fn derive(&self, method: &SupportedPaymentMethod, index: u32) -> Option<Address> {
        self.addresses.get(&method.xpub)?.get(index as usize).copied()
    }
}
