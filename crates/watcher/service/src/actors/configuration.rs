use async_trait::async_trait;
use paywatch_core::SupervisorError;
use paywatch_types::ChainConfiguration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{ServiceActor, WatcherControl};

/// Asks the service to apply a chain configuration.
#[derive(Debug)]
pub struct ConfigurationRequest {
    /// The configuration to persist and apply.
    pub configuration: ChainConfiguration,
    /// Receives the outcome.
    pub resp: oneshot::Sender<Result<(), SupervisorError>>,
}

impl ConfigurationRequest {
    /// Creates a request and the receiver of its outcome.
    pub fn new(
        configuration: ChainConfiguration,
    ) -> (Self, oneshot::Receiver<Result<(), SupervisorError>>) {
        let (resp, receiver) = oneshot::channel();
        (Self { configuration, resp }, receiver)
    }
}

/// Applies chain configuration changes, one at a time.
#[derive(Debug)]
pub struct ConfigurationActor<W> {
    control: W,
    requests: mpsc::Receiver<ConfigurationRequest>,
    cancel_token: CancellationToken,
}

impl<W> ConfigurationActor<W>
where
    W: WatcherControl + 'static,
{
    /// Creates a new [`ConfigurationActor`].
    pub const fn new(
        control: W,
        requests: mpsc::Receiver<ConfigurationRequest>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self { control, requests, cancel_token }
    }
}

#[async_trait]
impl<W> ServiceActor for ConfigurationActor<W>
where
    W: WatcherControl + 'static,
{
    type InboundEvent = ConfigurationRequest;
    type Error = ConfigurationActorError;

    async fn start(mut self) -> Result<(), Self::Error> {
        info!(target: "paywatch::configuration_actor", "Starting ConfigurationActor");

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!(target: "paywatch::configuration_actor", "ConfigurationActor cancellation requested, stopping...");
                    break;
                }
                maybe_request = self.requests.recv() => {
                    let Some(ConfigurationRequest { configuration, resp }) = maybe_request else {
                        info!(target: "paywatch::configuration_actor", "Configuration receiver closed, stopping ConfigurationActor");
                        return Err(ConfigurationActorError::ReceiverClosed);
                    };

                    let chain_id = configuration.chain_id;
                    let result = self.control.apply_configuration(configuration).await;
                    if let Err(err) = &result {
                        error!(target: "paywatch::configuration_actor", chain_id, %err, "Failed to apply chain configuration");
                    }
                    let _ = resp.send(result);
                }
            }
        }
        Ok(())
    }
}

/// Errors of the [`ConfigurationActor`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationActorError {
    /// Every configuration sender was dropped.
    #[error("configuration receiver closed")]
    ReceiverClosed,
}
