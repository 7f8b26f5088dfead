//! Reservation of fresh deposit addresses.
//!
//! The reconciler asks for a new address through an [`AddressReserver`]. The shipped
//! [`ReservationClient`] sends every request as a [`ReservationCall`] over a channel and waits
//! for the reply on a dedicated oneshot, at most [`RESERVATION_TIMEOUT`].

mod client;
pub use client::{RESERVATION_TIMEOUT, ReservationCall, ReservationClient};

mod deriver;
pub use deriver::{AddressDeriver, DerivedAddressTable};

mod error;
pub use error::ReservationError;

mod traits;
pub use traits::AddressReserver;
