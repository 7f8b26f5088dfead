//! The set of deposit addresses a chain watcher matches transfers against.

use alloy_primitives::Address;
use std::{
    collections::HashSet,
    sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

#[derive(Debug, Default)]
struct Inner {
    addresses: HashSet<Address>,
    // Addresses appended since the running rebuild took its snapshot.
    appended: Option<HashSet<Address>>,
}

/// Watched deposit addresses of one chain.
///
/// Read concurrently while matching, appended to when a new address is reserved and replaced
/// wholesale after every reconciliation sweep. Appends racing a rebuild are carried into the
/// rebuilt set.
#[derive(Debug, Default)]
pub struct WatchedAddresses {
    inner: RwLock<Inner>,
}

impl WatchedAddresses {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` if `address` is watched.
    pub fn contains(&self, address: &Address) -> bool {
        self.read().addresses.contains(address)
    }

    /// Number of watched addresses.
    pub fn len(&self) -> usize {
        self.read().addresses.len()
    }

    /// Returns `true` if no address is watched.
    pub fn is_empty(&self) -> bool {
        self.read().addresses.is_empty()
    }

    /// Copies the watched addresses.
    pub fn snapshot(&self) -> HashSet<Address> {
        self.read().addresses.clone()
    }

    /// Starts watching `address`. Returns `false` if it was already watched.
    pub fn append(&self, address: Address) -> bool {
        let mut inner = self.write();
        if let Some(appended) = inner.appended.as_mut() {
            appended.insert(address);
        }
        inner.addresses.insert(address)
    }

    /// Marks the start of a rebuild. Appends from now on survive the next [`Self::replace`].
    pub fn begin_rebuild(&self) {
        self.write().appended = Some(HashSet::new());
    }

    /// Replaces the watched set with `addresses` plus everything appended since
    /// [`Self::begin_rebuild`].
    pub fn replace(&self, mut addresses: HashSet<Address>) {
        let mut inner = self.write();
        if let Some(appended) = inner.appended.take() {
            addresses.extend(appended);
        }
        inner.addresses = addresses;
    }
}
