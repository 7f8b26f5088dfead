use super::ReservationError;
use async_trait::async_trait;
use paywatch_types::ReservedAddress;
use std::fmt::Debug;

/// Hands out the next deposit address of a store's payment method.
#[async_trait]
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait AddressReserver: Debug + Send + Sync {
    /// Reserves the next address of the `currency` payment method of `store_id`.
    async fn reserve(
        &self,
        store_id: &str,
        currency: &str,
    ) -> Result<ReservedAddress, ReservationError>;
}
