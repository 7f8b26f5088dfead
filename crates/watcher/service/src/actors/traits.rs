use async_trait::async_trait;
use paywatch_core::{AddressDeriver, ChainSupervisor, SupervisorError};
use paywatch_storage::{InvoiceStore, PaymentMethodStore, SettingsStore};
use paywatch_types::{ChainConfiguration, ReservationRequest, ReservationResponse};

/// The [`ServiceActor`] trait is an actor-like service run by the [`Service`](crate::Service).
#[async_trait]
pub trait ServiceActor {
    /// The event type received by the actor.
    type InboundEvent;
    /// The error type for the actor.
    type Error: std::fmt::Debug;
    /// Starts the actor.
    async fn start(mut self) -> Result<(), Self::Error>;
}

/// The supervisor operations driven by actors.
#[async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait WatcherControl: Send + Sync {
    /// Reserves the next deposit address for `request`.
    async fn handle_reservation(&self, request: ReservationRequest) -> ReservationResponse;

    /// Persists `configuration` and restarts the watcher of its chain.
    async fn apply_configuration(
        &self,
        configuration: ChainConfiguration,
    ) -> Result<(), SupervisorError>;
}

#[async_trait]
impl<S, I, P, D> WatcherControl for ChainSupervisor<S, I, P, D>
where
    S: SettingsStore + Send + Sync + 'static,
    I: InvoiceStore + Send + Sync + 'static,
    P: PaymentMethodStore + Send + Sync,
    D: AddressDeriver,
{
    async fn handle_reservation(&self, request: ReservationRequest) -> ReservationResponse {
        Self::handle_reservation(self, request).await
    }

    async fn apply_configuration(
        &self,
        configuration: ChainConfiguration,
    ) -> Result<(), SupervisorError> {
        Self::apply_configuration(self, configuration).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use mockall::mock;

    mock!(
        #[derive(Debug)]
        pub Control {}

        #[async_trait]
        impl WatcherControl for Control {
            async fn handle_reservation(&self, request: ReservationRequest) -> ReservationResponse;
            async fn apply_configuration(
                &self,
                configuration: ChainConfiguration,
            ) -> Result<(), SupervisorError>;
        }
    );
}
