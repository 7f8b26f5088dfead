//! Payment observations and the confirmation policy.

use alloy_primitives::{Address, B256, U256, utils::format_units};
use derive_more::{Constructor, Display};
use serde::{Deserialize, Serialize};

/// Number of confirmations after which a payment is settled regardless of the speed policy.
pub const FULLY_SETTLED_CONFIRMATIONS: u64 = 25;

/// Identity of a payment: the transaction paying into a deposit address.
///
/// Two observations with the same id describe the same payment and are merged.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, Constructor,
)]
#[display("{transaction_id}#{address}")]
#[serde(rename_all = "camelCase")]
pub struct PaymentId {
    /// Hash of the paying transaction.
    pub transaction_id: B256,
    /// The deposit address that was paid.
    pub address: Address,
}

/// Whether a payment was made with the chain's native currency or with a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum PaymentKind {
    /// A plain value transfer.
    Native,
    /// A token `Transfer` log.
    Token,
}

/// How many confirmations a store requires before it considers a payment confirmed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpeedPolicy {
    /// 2 confirmations.
    HighSpeed,
    /// 6 confirmations.
    MediumSpeed,
    /// 12 confirmations.
    LowMediumSpeed,
    /// 20 confirmations.
    LowSpeed,
    /// A policy this watcher does not know. Payments are never reported confirmed.
    #[default]
    #[serde(other)]
    Unknown,
}

impl SpeedPolicy {
    /// Minimum number of confirmations required by the policy.
    pub const fn required_confirmations(&self) -> Option<u64> {
        match self {
            Self::HighSpeed => Some(2),
            Self::MediumSpeed => Some(6),
            Self::LowMediumSpeed => Some(12),
            Self::LowSpeed => Some(20),
            Self::Unknown => None,
        }
    }
}

/// A normalized payment observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentData {
    /// The deposit address that was paid.
    pub address: Address,
    /// Amount in base units of the currency.
    pub amount: U256,
    /// Hash of the paying transaction.
    pub transaction_id: B256,
    /// Index of the token `Transfer` log. Only set for token payments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<u64>,
    /// Block the payment was mined in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// Chain tip minus block number at the time of the last observation.
    pub confirmation_count: u64,
    /// Currency code of the payment method that was paid.
    pub currency: String,
}

impl PaymentData {
    /// Returns the identity of the payment.
    pub const fn id(&self) -> PaymentId {
        PaymentId { transaction_id: self.transaction_id, address: self.address }
    }

    /// Returns the kind of the payment, derived from the presence of a log index.
    pub const fn kind(&self) -> PaymentKind {
        match self.log_index {
            Some(_) => PaymentKind::Token,
            None => PaymentKind::Native,
        }
    }

    /// Returns `true` once the payment cannot reasonably be reverted anymore.
    pub const fn payment_completed(&self) -> bool {
        self.confirmation_count >= FULLY_SETTLED_CONFIRMATIONS
    }

    /// Returns `true` if the payment has enough confirmations for `policy`.
    pub fn payment_confirmed(&self, policy: SpeedPolicy) -> bool {
        policy.required_confirmations().is_some_and(|required| self.confirmation_count >= required)
    }

    /// The amount in whole units of a currency with `divisibility` decimals, trailing zeros
    /// trimmed: `1_500_000` at divisibility 6 is `"1.5"`.
    ///
    /// `None` if `divisibility` exceeds what a 256 bit amount can hold.
    pub fn value(&self, divisibility: u8) -> Option<String> {
        let formatted = format_units(self.amount, divisibility).ok()?;
        Some(formatted.trim_end_matches('0').trim_end_matches('.').to_string())
    }

    /// Overwrites the chain derived fields with a newer observation of the same payment.
    pub fn merge(&mut self, newer: &Self) {
        self.amount = newer.amount;
        self.confirmation_count = newer.confirmation_count;
        self.block_number = newer.block_number;
        self.log_index = newer.log_index;
    }
}

/// A payment recorded against an invoice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Constructor)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// The payment observation.
    pub data: PaymentData,
    /// Whether the payment counts towards the invoice total.
    pub accounted: bool,
    /// Unix timestamp (seconds) of when the payment was first seen.
    pub received_at: u64,
}

impl Payment {
    /// Shorthand for `self.data.id()`.
    pub const fn id(&self) -> PaymentId {
        self.data.id()
    }

    /// Returns `true` if this is the payment recorded in `currency` under `id`.
    pub fn is(&self, currency: &str, id: &PaymentId) -> bool {
        self.data.currency == currency && &self.id() == id
    }
}
