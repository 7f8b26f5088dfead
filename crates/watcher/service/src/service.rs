//! Contains the main paywatch service runner.

use anyhow::Result;
use paywatch_core::{
    ChainNetworks, ChainSupervisor, Config, DerivedAddressTable, ReservationCall, ReservationClient,
    RpcChainClientFactory,
};
use paywatch_storage::{FileSettings, MemoryInvoiceStore, MemoryPaymentMethodStore};
use paywatch_types::InvoiceEvent;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    Fixtures,
    actors::{
        ConfigurationActor, ConfigurationRequest, InvoiceEventActor, MetricWorker,
        ReservationActor, ServiceActor,
    },
};

/// The supervisor run by the [`Service`].
pub type PaywatchSupervisor = ChainSupervisor<
    FileSettings,
    MemoryInvoiceStore,
    MemoryPaymentMethodStore,
    DerivedAddressTable,
>;

const RESERVATION_CHANNEL_CAPACITY: usize = 100;
const CONFIGURATION_CHANNEL_CAPACITY: usize = 16;

/// Everything the [`Service`] is built from.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Networks, seed endpoints and watcher tuning.
    pub core: Config,
    /// Directory of the persisted settings.
    pub datadir: PathBuf,
    /// Seed data of the in-memory stores.
    pub fixtures: Fixtures,
    /// Whether metrics are recorded.
    pub metrics_enabled: bool,
    /// How often gauges are sampled.
    pub metrics_interval: Duration,
}

/// Orchestrates the chain supervisor and the actors serving it.
#[derive(Debug)]
pub struct Service {
    metrics_enabled: bool,
    metrics_interval: Duration,

    networks: ChainNetworks,
    supervisor: Arc<PaywatchSupervisor>,

    // channels
    reservation_calls: Option<mpsc::Receiver<ReservationCall>>,
    configuration_sender: mpsc::Sender<ConfigurationRequest>,
    configuration_requests: Option<mpsc::Receiver<ConfigurationRequest>>,

    cancel_token: CancellationToken,
    join_set: JoinSet<Result<(), anyhow::Error>>,
}

impl Service {
    /// Opens the stores and builds the supervisor. Nothing runs before [`Self::run`].
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let ServiceConfig { core, datadir, fixtures, metrics_enabled, metrics_interval } = config;

        let settings = FileSettings::open(&datadir)?;
        let settings = if metrics_enabled { settings.with_metrics() } else { settings };
        let invoices = MemoryInvoiceStore::with_invoices(fixtures.invoices)?;
        let payment_methods = MemoryPaymentMethodStore::with_methods(fixtures.payment_methods);
        let factory = RpcChainClientFactory::default();
        let factory = if metrics_enabled { factory.with_metrics() } else { factory };

        let (reserver, reservation_calls) = ReservationClient::channel(RESERVATION_CHANNEL_CAPACITY);
        let (configuration_sender, configuration_requests) =
            mpsc::channel(CONFIGURATION_CHANNEL_CAPACITY);
        let cancel_token = CancellationToken::new();
        let networks = core.networks.clone();

        let supervisor = ChainSupervisor::new(
            core,
            Arc::new(settings),
            Arc::new(invoices),
            Arc::new(payment_methods),
            fixtures.derived_addresses,
            Arc::new(factory),
            reserver,
        )
        .with_cancellation(cancel_token.clone());
        let supervisor = if metrics_enabled { supervisor.with_metrics() } else { supervisor };

        info!(target: "paywatch::service", datadir = %datadir.display(), "Service created");
        Ok(Self {
            metrics_enabled,
            metrics_interval,
            networks,
            supervisor: Arc::new(supervisor),
            reservation_calls: Some(reservation_calls),
            configuration_sender,
            configuration_requests: Some(configuration_requests),
            cancel_token,
            join_set: JoinSet::new(),
        })
    }

    /// The supervisor of the chain watchers.
    pub const fn supervisor(&self) -> &Arc<PaywatchSupervisor> {
        &self.supervisor
    }

    /// Subscribes to the invoice events of every chain.
    pub fn subscribe(&self) -> broadcast::Receiver<InvoiceEvent> {
        self.supervisor.subscribe()
    }

    /// Sender through which chain configurations are applied while the service runs.
    pub fn configuration_sender(&self) -> mpsc::Sender<ConfigurationRequest> {
        self.configuration_sender.clone()
    }

    /// Spawns the actors and starts the chain watchers.
    pub async fn initialise(&mut self) -> Result<()> {
        self.init_reservation_actor()?;
        self.init_configuration_actor()?;
        self.init_event_logger();
        if self.metrics_enabled {
            self.init_metric_reporter();
        }

        info!(target: "paywatch::service", "Starting chain watchers...");
        self.supervisor.start().await?;
        Ok(())
    }

    fn init_reservation_actor(&mut self) -> Result<()> {
        let calls = self
            .reservation_calls
            .take()
            .ok_or(anyhow::anyhow!("reservation actor already started"))?;

        let supervisor = self.supervisor.clone();
        let cancel_token = self.cancel_token.clone();
        self.join_set.spawn(async move {
            ReservationActor::new(supervisor, calls, cancel_token)
                .start()
                .await
                .map_err(|err| anyhow::anyhow!(err))
        });
        Ok(())
    }

    fn init_configuration_actor(&mut self) -> Result<()> {
        let requests = self
            .configuration_requests
            .take()
            .ok_or(anyhow::anyhow!("configuration actor already started"))?;

        let supervisor = self.supervisor.clone();
        let cancel_token = self.cancel_token.clone();
        self.join_set.spawn(async move {
            ConfigurationActor::new(supervisor, requests, cancel_token)
                .start()
                .await
                .map_err(|err| anyhow::anyhow!(err))
        });
        Ok(())
    }

    fn init_event_logger(&mut self) {
        let actor = InvoiceEventActor::new(
            self.networks.clone(),
            self.supervisor.subscribe(),
            self.cancel_token.clone(),
        );
        self.join_set.spawn(async move { actor.start().await.map_err(anyhow::Error::from) });
    }

    fn init_metric_reporter(&mut self) {
        let supervisor = self.supervisor.clone();
        let interval = self.metrics_interval;
        let cancel_token = self.cancel_token.clone();
        self.join_set.spawn(async move {
            MetricWorker::new(interval, vec![supervisor], cancel_token)
                .start()
                .await
                .map_err(anyhow::Error::from)
        });
    }

    /// Runs the service until every actor finished or one of them failed.
    pub async fn run(&mut self) -> Result<()> {
        self.initialise().await?;

        while let Some(result) = self.join_set.join_next().await {
            match result {
                Ok(Ok(())) => {
                    info!(target: "paywatch::service", "Task completed successfully.");
                }
                Ok(Err(err)) => {
                    error!(target: "paywatch::service", %err, "A task encountered an error.");
                    self.cancel_token.cancel();
                    return Err(anyhow::anyhow!("a service task failed: {err}"));
                }
                Err(err) => {
                    error!(target: "paywatch::service", %err, "A task panicked or was aborted.");
                    self.cancel_token.cancel();
                    return Err(anyhow::anyhow!("a service task failed: {err}"));
                }
            }
        }
        Ok(())
    }

    /// Stops the chain watchers and waits for every actor to finish.
    pub async fn shutdown(mut self) -> Result<()> {
        self.cancel_token.cancel();
        self.supervisor.shutdown().await;

        while let Some(result) = self.join_set.join_next().await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(target: "paywatch::service", %err, "A task encountered an error during shutdown.");
                }
                Err(err) => {
                    error!(target: "paywatch::service", %err, "A task failed during shutdown.");
                }
            }
        }
        info!(target: "paywatch::service", "Service stopped");
        Ok(())
    }
}
