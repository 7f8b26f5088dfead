use crate::{NativeTransfer, Payment, TransferLog};
use alloy_primitives::{Address, B256};
use derive_more::Constructor;
use serde::{Deserialize, Serialize};

/// The on-chain record that paid into a watched address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum MatchedTransfer {
    /// A plain value transfer.
    Native(NativeTransfer),
    /// A token `Transfer` log.
    Token(TransferLog),
}

impl MatchedTransfer {
    /// Hash of the transaction carrying the transfer.
    pub const fn transaction_hash(&self) -> B256 {
        match self {
            Self::Native(tx) => tx.hash,
            Self::Token(log) => log.transaction_hash,
        }
    }

    /// The watched address that was paid.
    pub fn recipient(&self) -> Option<Address> {
        match self {
            Self::Native(tx) => tx.to,
            Self::Token(log) => Some(log.to),
        }
    }

    /// Block the transfer was included in.
    pub const fn block_number(&self) -> Option<u64> {
        match self {
            Self::Native(tx) => tx.block_number,
            Self::Token(log) => Some(log.block_number),
        }
    }

    /// Whether the transfer should count towards an invoice.
    ///
    /// Token logs the node flagged as removed are forwarded but not accounted.
    pub const fn accounted(&self) -> bool {
        match self {
            Self::Native(_) => true,
            Self::Token(log) => !log.removed,
        }
    }
}

/// A transfer matched against the watched addresses of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Constructor)]
#[serde(rename_all = "camelCase")]
pub struct MatchedTransaction {
    /// The chain the transfer was observed on.
    pub chain_id: u64,
    /// The matched transfer.
    pub transfer: MatchedTransfer,
}

/// Notifications published for invoice consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum InvoiceEvent {
    /// Payments of the invoice changed; its status must be recomputed.
    NeedUpdate {
        /// The affected invoice.
        invoice_id: String,
    },
    /// A new deposit address was assigned to a payment method of the invoice.
    NewAddress {
        /// The affected invoice.
        invoice_id: String,
        /// Currency of the payment method.
        currency: String,
        /// The newly assigned deposit address.
        address: Address,
    },
    /// A new payment was recorded.
    PaymentReceived {
        /// The affected invoice.
        invoice_id: String,
        /// The recorded payment.
        payment: Payment,
    },
}

impl InvoiceEvent {
    /// The invoice the event refers to.
    pub fn invoice_id(&self) -> &str {
        match self {
            Self::NeedUpdate { invoice_id } |
            Self::NewAddress { invoice_id, .. } |
            Self::PaymentReceived { invoice_id, .. } => invoice_id,
        }
    }
}
