//! Core types shared across paywatch components.
//!
//! This crate defines the data structures exchanged between the chain client, the
//! progress tracker, the transfer matcher, the payment reconciler and the chain supervisor.

mod block;
pub use block::{BlockRef, ChainBlock, NativeTransfer};

mod transfer;
pub use transfer::{Transfer, TransferLog, TransferReceipt};

mod payment;
pub use payment::{
    FULLY_SETTLED_CONFIRMATIONS, Payment, PaymentData, PaymentId, PaymentKind, SpeedPolicy,
};

mod invoice;
pub use invoice::{Invoice, InvoicePaymentMethod, InvoiceStatus, SupportedPaymentMethod};

mod network;
pub use network::{ChainConfiguration, ChainNetwork, SettingsKind};

mod event;
pub use event::{InvoiceEvent, MatchedTransaction, MatchedTransfer};

mod reservation;
pub use reservation::{
    OperationId, ReservationOutcome, ReservationRequest, ReservationResponse, ReservedAddress,
};
