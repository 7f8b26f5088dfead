use crate::{PaymentMethodStore, StorageError};
use paywatch_types::SupportedPaymentMethod;
use std::{collections::HashMap, sync::RwLock};

/// A [`PaymentMethodStore`] holding everything in memory, keyed by store and currency.
#[derive(Debug, Default)]
pub struct MemoryPaymentMethodStore {
    methods: RwLock<HashMap<(String, String), SupportedPaymentMethod>>,
}

impl MemoryPaymentMethodStore {
    /// Create a store seeded with `methods`.
    pub fn with_methods(methods: impl IntoIterator<Item = SupportedPaymentMethod>) -> Self {
        let methods = methods
            .into_iter()
            .map(|method| ((method.store_id.clone(), method.currency.clone()), method))
            .collect();
        Self { methods: RwLock::new(methods) }
    }
}

impl PaymentMethodStore for MemoryPaymentMethodStore {
    fn payment_method(
        &self,
        store_id: &str,
        currency: &str,
    ) -> Result<Option<SupportedPaymentMethod>, StorageError> {
        let methods = self.methods.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(methods.get(&(store_id.to_string(), currency.to_string())).cloned())
    }

    fn update_payment_method(&self, method: SupportedPaymentMethod) -> Result<(), StorageError> {
        let mut methods = self.methods.write().map_err(|_| StorageError::LockPoisoned)?;
        methods.insert((method.store_id.clone(), method.currency.clone()), method);
        Ok(())
    }
}
