//! [ServiceActor] services run by the [`Service`](crate::Service).
//!
//! [ServiceActor]: super::ServiceActor

mod traits;
pub use traits::{ServiceActor, WatcherControl};

mod metric;
pub use metric::MetricWorker;

mod reservation;
pub use reservation::{ReservationActor, ReservationActorError};

mod configuration;
pub use configuration::{ConfigurationActor, ConfigurationActorError, ConfigurationRequest};

mod events;
pub use events::InvoiceEventActor;
