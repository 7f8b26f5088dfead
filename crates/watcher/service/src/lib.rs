//! Actors and the [`Service`] runner wiring the paywatch components together.

mod actors;
pub use actors::{
    ConfigurationActor, ConfigurationActorError, ConfigurationRequest, InvoiceEventActor,
    MetricWorker, ReservationActor, ReservationActorError, ServiceActor, WatcherControl,
};

mod fixtures;
pub use fixtures::Fixtures;

mod service;
pub use service::{PaywatchSupervisor, Service, ServiceConfig};
