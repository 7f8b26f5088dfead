//! Messages of the address-reservation protocol.

use alloy_primitives::{Address, B256};
use derive_more::{Constructor, Display};
use serde::{Deserialize, Serialize};

/// Correlation id of a reservation round trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(transparent)]
pub struct OperationId(pub B256);

impl OperationId {
    /// Generates a random operation id.
    pub fn random() -> Self {
        Self(B256::random())
    }
}

/// Asks for the next deposit address of a store's payment method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Constructor)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    /// Correlation id echoed in the response.
    pub op_id: OperationId,
    /// Store owning the payment method.
    pub store_id: String,
    /// Currency of the payment method.
    pub currency: String,
}

impl ReservationRequest {
    /// Creates a request with a random operation id.
    pub fn with_random_id(store_id: impl Into<String>, currency: impl Into<String>) -> Self {
        Self::new(OperationId::random(), store_id.into(), currency.into())
    }
}

/// A freshly derived deposit address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Constructor)]
#[serde(rename_all = "camelCase")]
pub struct ReservedAddress {
    /// The derived address.
    pub address: Address,
    /// Derivation index of the address.
    pub index: u32,
    /// Extended public key the address was derived from.
    pub xpub: String,
}

/// Outcome of a reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReservationOutcome {
    /// An address was reserved.
    Reserved(ReservedAddress),
    /// No payment method matched or derivation failed.
    Failed,
}

/// Answer to a [`ReservationRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationResponse {
    /// Correlation id of the request.
    pub op_id: OperationId,
    /// Store owning the payment method.
    pub store_id: String,
    /// Currency of the payment method.
    pub currency: String,
    /// Result of the reservation.
    pub outcome: ReservationOutcome,
}

impl ReservationResponse {
    /// Builds a response to `request` carrying `outcome`.
    pub fn for_request(request: &ReservationRequest, outcome: ReservationOutcome) -> Self {
        Self {
            op_id: request.op_id,
            store_id: request.store_id.clone(),
            currency: request.currency.clone(),
            outcome,
        }
    }

    /// Builds a failed response to `request`.
    pub fn failed(request: &ReservationRequest) -> Self {
        Self::for_request(request, ReservationOutcome::Failed)
    }

    /// Returns the reserved address, if any.
    pub const fn reserved(&self) -> Option<&ReservedAddress> {
        match &self.outcome {
            ReservationOutcome::Reserved(reserved) => Some(reserved),
            ReservationOutcome::Failed => None,
        }
    }
}
