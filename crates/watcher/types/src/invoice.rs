//! Invoices and the payment methods they can be paid with.

use crate::{Payment, PaymentId, SpeedPolicy};
use alloy_primitives::{Address, U256};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Lifecycle state of an invoice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "camelCase")]
pub enum InvoiceStatus {
    /// Created, nothing received yet.
    #[default]
    New,
    /// Some payment was received but the invoice is not settled yet.
    Processing,
    /// Fully paid and confirmed.
    Settled,
    /// Expired before it was paid.
    Expired,
    /// Marked invalid.
    Invalid,
}

impl InvoiceStatus {
    /// Returns `true` while the invoice may still receive payments.
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::New | Self::Processing)
    }
}

/// A currency an invoice accepts, with the deposit address currently assigned to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoicePaymentMethod {
    /// Currency code.
    pub currency: String,
    /// Address payments for this method are expected on.
    pub deposit_address: Address,
    /// Derivation index of `deposit_address`.
    pub index: u32,
    /// Requested amount in base units.
    pub amount: U256,
}

/// A payment method configured on a store, used to derive fresh deposit addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedPaymentMethod {
    /// Owning store.
    pub store_id: String,
    /// Currency code.
    pub currency: String,
    /// Extended public key the addresses are derived from.
    pub xpub: String,
    /// Index of the last derived address.
    pub current_index: u32,
}

/// An invoice as seen by the watcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    /// Invoice id.
    pub id: String,
    /// Owning store.
    pub store_id: String,
    /// Lifecycle state.
    pub status: InvoiceStatus,
    /// Speed policy of the store at invoice creation.
    #[serde(default)]
    pub speed_policy: SpeedPolicy,
    /// Accepted payment methods.
    #[serde(default)]
    pub payment_methods: Vec<InvoicePaymentMethod>,
    /// Payments recorded so far, including ones no longer accounted.
    #[serde(default)]
    pub payments: Vec<Payment>,
}

impl Invoice {
    /// Returns `true` while the invoice may still receive payments.
    pub const fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    /// Returns the payment method for `currency`.
    pub fn payment_method(&self, currency: &str) -> Option<&InvoicePaymentMethod> {
        self.payment_methods.iter().find(|method| method.currency == currency)
    }

    /// Returns the payment method for `currency` mutably.
    pub fn payment_method_mut(&mut self, currency: &str) -> Option<&mut InvoicePaymentMethod> {
        self.payment_methods.iter_mut().find(|method| method.currency == currency)
    }

    /// Returns `true` if the invoice accepts any of `currencies`.
    pub fn accepts_any<'a>(&self, mut currencies: impl Iterator<Item = &'a str>) -> bool {
        currencies.any(|currency| self.payment_method(currency).is_some())
    }

    /// Returns the payment recorded in `currency` with the given identity.
    ///
    /// A single transaction can pay the same address in several currencies, so identities are
    /// only unique per currency.
    pub fn payment(&self, currency: &str, id: &PaymentId) -> Option<&Payment> {
        self.payments.iter().find(|payment| payment.is(currency, id))
    }

    /// Amount still due in `currency`: requested minus the sum of accounted payments.
    ///
    /// Returns zero if the invoice does not accept `currency`.
    pub fn amount_due(&self, currency: &str) -> U256 {
        let Some(method) = self.payment_method(currency) else {
            return U256::ZERO;
        };
        let paid = self
            .payments
            .iter()
            .filter(|payment| payment.accounted && payment.data.currency == currency)
            .fold(U256::ZERO, |acc, payment| acc.saturating_add(payment.data.amount));
        method.amount.saturating_sub(paid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PaymentData;
    use alloy_primitives::B256;

    fn invoice() -> Invoice {
        Invoice {
            id: "inv-1".to_string(),
            store_id: "store".to_string(),
            status: InvoiceStatus::New,
            payment_methods: vec![InvoicePaymentMethod {
                currency: "USDT".to_string(),
                deposit_address: Address::repeat_byte(0xbb),
                index: 0,
                amount: U256::from(1_000),
            }],
            ..Default::default()
        }
    }

    fn payment(amount: u64, accounted: bool, tx: u8) -> Payment {
        Payment {
            data: PaymentData {
                address: Address::repeat_byte(0xbb),
                amount: U256::from(amount),
                transaction_id: B256::repeat_byte(tx),
                currency: "USDT".to_string(),
                ..Default::default()
            },
            accounted,
            received_at: 0,
        }
    }

    #[test]
    fn test_amount_due_counts_accounted_only() {
        let mut invoice = invoice();
        invoice.payments.push(payment(300, true, 1));
        invoice.payments.push(payment(500, false, 2));

        assert_eq!(invoice.amount_due("USDT"), U256::from(700));
    }

    #[test]
    fn test_amount_due_saturates() {
        let mut invoice = invoice();
        invoice.payments.push(payment(1_500, true, 1));

        assert_eq!(invoice.amount_due("USDT"), U256::ZERO);
        assert_eq!(invoice.amount_due("ETH"), U256::ZERO);
    }

    #[test]
    fn test_pending_statuses() {
        assert!(InvoiceStatus::New.is_pending());
        assert!(InvoiceStatus::Processing.is_pending());
        assert!(!InvoiceStatus::Settled.is_pending());
        assert!(!InvoiceStatus::Expired.is_pending());
        assert!(!InvoiceStatus::Invalid.is_pending());
    }

    #[test]
    fn test_payment_lookup() {
        let mut invoice = invoice();
        let recorded = payment(10, true, 7);
        let id = recorded.id();
        invoice.payments.push(recorded);

        assert!(invoice.payment("USDT", &id).is_some());
        assert!(invoice.payment("ETH", &id).is_none());
        assert!(invoice.payment("USDT", &PaymentId::default()).is_none());
        assert!(invoice.accepts_any(["ETH", "USDT"].into_iter()));
        assert!(!invoice.accepts_any(["ETH"].into_iter()));
    }
}
