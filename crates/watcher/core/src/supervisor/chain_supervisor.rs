use super::{Metrics, SupervisorError};
use crate::{
    client::{ChainClient, ChainClientError, ChainClientFactory},
    config::Config,
    reservation::{AddressDeriver, ReservationClient},
    watcher::{ChainWatcher, WatcherHandle, WatcherState},
};
use paywatch_metrics::MetricsReporter;
use paywatch_storage::{InvoiceStore, PaymentMethodStore, SettingsStore, SettingsStoreExt};
use paywatch_types::{
    ChainConfiguration, InvoiceEvent, ReservationOutcome, ReservationRequest, ReservationResponse,
    ReservedAddress,
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Capacity of the invoice event channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Synchronisation status of one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatus {
    /// The chain.
    pub chain_id: u64,
    /// Whether a watcher runs for the chain.
    pub configured: bool,
    /// State of the watcher, [`WatcherState::Stopped`] if unconfigured.
    pub state: WatcherState,
    /// Last block processed for native transfers.
    pub native_block: Option<u64>,
    /// Last block processed for token transfers.
    pub token_block: Option<u64>,
}

impl SyncStatus {
    /// Returns `true` while the watcher has not reached the chain tip yet.
    pub fn is_catching_up(&self) -> bool {
        self.state == WatcherState::CatchingUp
    }
}

type Watcher<S, I> = ChainWatcher<S, I, Arc<dyn ChainClient>, ReservationClient>;

/// Runs one [`ChainWatcher`] per configured chain and serves address reservations.
#[derive(Debug)]
pub struct ChainSupervisor<S, I, P, D> {
    config: Config,
    settings: Arc<S>,
    invoices: Arc<I>,
    payment_methods: Arc<P>,
    deriver: D,
    factory: Arc<dyn ChainClientFactory>,
    reserver: ReservationClient,
    events: broadcast::Sender<InvoiceEvent>,
    cancellation: CancellationToken,
    watchers: RwLock<HashMap<u64, WatcherHandle>>,
    // serialises restarts, `watchers` is never held across a stop
    restart_lock: Mutex<()>,
    // serialises derivation index updates
    reservation_lock: Mutex<()>,
    metrics_enabled: bool,
}

impl<S, I, P, D> ChainSupervisor<S, I, P, D>
where
    S: SettingsStore + Send + Sync + 'static,
    I: InvoiceStore + Send + Sync + 'static,
    P: PaymentMethodStore + Send + Sync,
    D: AddressDeriver,
{
    /// Creates a supervisor without any running watcher. See [`Self::start`].
    pub fn new(
        config: Config,
        settings: Arc<S>,
        invoices: Arc<I>,
        payment_methods: Arc<P>,
        deriver: D,
        factory: Arc<dyn ChainClientFactory>,
        reserver: ReservationClient,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            settings,
            invoices,
            payment_methods,
            deriver,
            factory,
            reserver,
            events,
            cancellation: CancellationToken::new(),
            watchers: RwLock::new(HashMap::new()),
            restart_lock: Mutex::new(()),
            reservation_lock: Mutex::new(()),
            metrics_enabled: false,
        }
    }

    /// Binds every watcher to a child of `cancellation`.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Enables watcher, reorg and payment metrics.
    pub fn with_metrics(mut self) -> Self {
        Metrics::init(self.config.networks.chain_ids());
        self.metrics_enabled = true;
        self
    }

    /// Subscribes to the invoice events published by all watchers.
    pub fn subscribe(&self) -> broadcast::Receiver<InvoiceEvent> {
        self.events.subscribe()
    }

    /// Starts a watcher for every chain with a configured RPC endpoint.
    ///
    /// Chains without persisted configuration use the endpoint of [`Config::chain_rpcs`]. A chain
    /// that fails to start is logged and left unconfigured.
    pub async fn start(&self) -> Result<(), SupervisorError> {
        for chain_id in self.config.networks.chain_ids() {
            let configuration = match self.settings.chain_configuration(chain_id)? {
                Some(configuration) => configuration,
                None => ChainConfiguration::new(
                    chain_id,
                    self.config.seed_rpc_url(chain_id).map(str::to_string),
                ),
            };

            if let Err(err) = self.restart(&configuration).await {
                warn!(target: "paywatch::supervisor", chain_id, %err, "Failed to start chain watcher");
            }
        }
        Ok(())
    }

    /// Persists `configuration` and restarts the watcher of its chain with it.
    ///
    /// Without RPC URL the chain is left unconfigured.
    pub async fn apply_configuration(
        &self,
        configuration: ChainConfiguration,
    ) -> Result<(), SupervisorError> {
        let chain_id = configuration.chain_id;
        if !self.config.networks.chain_ids().contains(&chain_id) {
            return Err(SupervisorError::UnsupportedChain(chain_id));
        }

        self.settings.save_chain_configuration(&configuration)?;
        info!(
            target: "paywatch::supervisor",
            chain_id,
            rpc_url = ?configuration.rpc_url,
            "Chain configuration updated"
        );
        self.restart(&configuration).await.inspect_err(|err| {
            warn!(target: "paywatch::supervisor", chain_id, %err, "Chain left unconfigured");
        })
    }

    async fn restart(&self, configuration: &ChainConfiguration) -> Result<(), SupervisorError> {
        let chain_id = configuration.chain_id;
        let _guard = self.restart_lock.lock().await;

        // reservations served meanwhile need the watchers lock
        let previous = self.watchers.write().await.remove(&chain_id);
        if let Some(mut handle) = previous {
            handle.stop().await;
        }

        let mut watchers = self.watchers.write().await;
        let result = match configuration.rpc_url.as_deref() {
            Some(rpc_url) => self.watcher(chain_id, rpc_url).map(|watcher| {
                watchers.insert(chain_id, watcher.spawn(self.cancellation.child_token()));
            }),
            None => {
                debug!(target: "paywatch::supervisor", chain_id, "No rpc url configured");
                Ok(())
            }
        };

        if self.metrics_enabled {
            Metrics::record_configured(watchers.len());
            if !watchers.contains_key(&chain_id) {
                Metrics::record_state(chain_id, WatcherState::Stopped);
            }
        }
        result
    }

    fn watcher(&self, chain_id: u64, rpc_url: &str) -> Result<Watcher<S, I>, SupervisorError> {
        let client = self.factory.connect(chain_id, rpc_url).map_err(|err| match err {
            ChainClientError::InvalidUrl { url, reason } => {
                SupervisorError::InvalidRpcUrl { chain_id, url, reason }
            }
            err => err.into(),
        })?;

        let watcher = ChainWatcher::new(
            self.config.networks.currencies(chain_id),
            self.config.watcher,
            self.settings.clone(),
            self.invoices.clone(),
            client,
            self.reserver.clone(),
            self.events.clone(),
        );
        Ok(if self.metrics_enabled { watcher.with_metrics() } else { watcher })
    }

    /// Reserves the next deposit address of the payment method named in `request`.
    ///
    /// The derivation index of the payment method is advanced and the address is watched by the
    /// chain of the currency right away. Any failure yields a [`ReservationOutcome::Failed`]
    /// response.
    pub async fn handle_reservation(&self, request: ReservationRequest) -> ReservationResponse {
        match self.reserve(&request).await {
            Ok(Some(reserved)) => {
                info!(
                    target: "paywatch::supervisor",
                    op_id = %request.op_id,
                    store_id = %request.store_id,
                    currency = %request.currency,
                    address = %reserved.address,
                    index = reserved.index,
                    "Address reserved"
                );
                ReservationResponse::for_request(&request, ReservationOutcome::Reserved(reserved))
            }
            Ok(None) => {
                warn!(
                    target: "paywatch::supervisor",
                    op_id = %request.op_id,
                    store_id = %request.store_id,
                    currency = %request.currency,
                    "No address could be derived"
                );
                ReservationResponse::failed(&request)
            }
            Err(err) => {
                warn!(
                    target: "paywatch::supervisor",
                    op_id = %request.op_id,
                    %err,
                    "Address reservation failed"
                );
                ReservationResponse::failed(&request)
            }
        }
    }

    async fn reserve(
        &self,
        request: &ReservationRequest,
    ) -> Result<Option<ReservedAddress>, SupervisorError> {
        let _guard = self.reservation_lock.lock().await;

        let Some(mut method) =
            self.payment_methods.payment_method(&request.store_id, &request.currency)?
        else {
            return Ok(None);
        };
        let Some(index) = method.current_index.checked_add(1) else {
            return Ok(None);
        };
        let Some(address) = self.deriver.derive(&method, index) else {
            return Ok(None);
        };

        method.current_index = index;
        let xpub = method.xpub.clone();
        self.payment_methods.update_payment_method(method)?;

        let chain_id = self.config.networks.by_currency(&request.currency).map(|n| n.chain_id);
        let watchers = self.watchers.read().await;
        if let Some(handle) = chain_id.and_then(|chain_id| watchers.get(&chain_id)) {
            handle.watch_address(address);
        }
        Ok(Some(ReservedAddress::new(address, index, xpub)))
    }

    /// The synchronisation status of `chain_id`.
    pub async fn sync_status(&self, chain_id: u64) -> Result<SyncStatus, SupervisorError> {
        if !self.config.networks.chain_ids().contains(&chain_id) {
            return Err(SupervisorError::UnsupportedChain(chain_id));
        }

        let state = self.watchers.read().await.get(&chain_id).map(WatcherHandle::state);
        let last_block = |token_tracking| {
            self.settings
                .chain_progress(chain_id, token_tracking)
                .map(|progress| progress.and_then(|progress| progress.last_block_number()))
        };

        Ok(SyncStatus {
            chain_id,
            configured: state.is_some(),
            state: state.unwrap_or_default(),
            native_block: last_block(false)?,
            token_block: last_block(true)?,
        })
    }

    /// Returns `true` if the chain of `currency` has a watcher following its tip.
    pub async fn is_available(&self, currency: &str) -> bool {
        let Some(network) = self.config.networks.by_currency(currency) else {
            return false;
        };
        self.is_live(network.chain_id).await
    }

    /// Returns `true` if every chain has a watcher following its tip.
    pub async fn is_all_available(&self) -> bool {
        let watchers = self.watchers.read().await;
        self.config.networks.chain_ids().iter().all(|chain_id| {
            watchers.get(chain_id).is_some_and(|handle| handle.state() == WatcherState::Live)
        })
    }

    async fn is_live(&self, chain_id: u64) -> bool {
        self.watchers
            .read()
            .await
            .get(&chain_id)
            .is_some_and(|handle| handle.state() == WatcherState::Live)
    }

    /// Stops every watcher.
    pub async fn shutdown(&self) {
        let _guard = self.restart_lock.lock().await;
        let handles: Vec<WatcherHandle> =
            self.watchers.write().await.drain().map(|(_, handle)| handle).collect();
        for mut handle in handles {
            handle.stop().await;
        }
        info!(target: "paywatch::supervisor", "All chain watchers stopped");
    }
}

impl<S, I, P, D> MetricsReporter for ChainSupervisor<S, I, P, D> {
    fn report_metrics(&self) {
        if !self.metrics_enabled {
            return;
        }
        // skipped while a configuration change holds the registry
        let Ok(watchers) = self.watchers.try_read() else {
            return;
        };
        for chain_id in self.config.networks.chain_ids() {
            let state = watchers.get(&chain_id).map(WatcherHandle::state).unwrap_or_default();
            Metrics::record_state(chain_id, state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::ChainNetworks,
        progress::BlockFetchRetry,
        reservation::DerivedAddressTable,
        test_utils::{FakeChain, MockFactory},
        watcher::WatcherConfig,
    };
    use alloy_primitives::{Address, B256, U256};
    use paywatch_storage::{MemoryInvoiceStore, MemoryPaymentMethodStore, MemorySettings};
    use paywatch_types::{
        ChainNetwork, Invoice, InvoicePaymentMethod, InvoiceStatus, NativeTransfer,
        SupportedPaymentMethod,
    };
    use std::{collections::BTreeMap, time::Duration};

    type Supervisor = ChainSupervisor<
        MemorySettings,
        MemoryInvoiceStore,
        MemoryPaymentMethodStore,
        DerivedAddressTable,
    >;

    fn networks() -> ChainNetworks {
        ChainNetworks::new(vec![
            ChainNetwork::new("ETH".to_string(), 1, 18, None),
            ChainNetwork::new("tETH".to_string(), 5, 18, None),
        ])
        .unwrap()
    }

    fn factory(chain: Arc<FakeChain>) -> Arc<dyn ChainClientFactory> {
        let mut factory = MockFactory::new();
        factory.expect_connect().returning(move |_, rpc_url| {
            if rpc_url.starts_with("http") {
                Ok(chain.clone() as Arc<dyn ChainClient>)
            } else {
                Err(ChainClientError::InvalidUrl {
                    url: rpc_url.to_string(),
                    reason: "unsupported scheme".to_string(),
                })
            }
        });
        Arc::new(factory)
    }

    fn supervisor(
        chain_rpcs: BTreeMap<u64, String>,
        settings: Arc<MemorySettings>,
    ) -> (Supervisor, Arc<MemoryPaymentMethodStore>) {
        let (reserver, _calls) = ReservationClient::channel(1);
        supervisor_with(
            chain_rpcs,
            settings,
            Arc::new(FakeChain::with_tip(100)),
            MemoryInvoiceStore::new(),
            reserver,
        )
    }

    fn supervisor_with(
        chain_rpcs: BTreeMap<u64, String>,
        settings: Arc<MemorySettings>,
        chain: Arc<FakeChain>,
        invoices: MemoryInvoiceStore,
        reserver: ReservationClient,
    ) -> (Supervisor, Arc<MemoryPaymentMethodStore>) {
        let watcher = WatcherConfig {
            block_fetch_retry: BlockFetchRetry { attempts: 1, delay: Duration::from_millis(1) },
            ..Default::default()
        };
        let payment_methods = Arc::new(MemoryPaymentMethodStore::with_methods([
            SupportedPaymentMethod {
                store_id: "store".to_string(),
                currency: "ETH".to_string(),
                xpub: "xpub".to_string(),
                current_index: 0,
            },
        ]));
        let deriver = DerivedAddressTable::new().with_addresses(
            "xpub",
            vec![Address::repeat_byte(0), Address::repeat_byte(1), Address::repeat_byte(2)],
        );
        let supervisor = ChainSupervisor::new(
            Config::new(networks(), chain_rpcs, watcher),
            settings,
            Arc::new(invoices),
            payment_methods.clone(),
            deriver,
            factory(chain),
            reserver,
        );
        (supervisor, payment_methods)
    }

    async fn wait_until_live(supervisor: &Supervisor, chain_id: u64) {
        let mut state = supervisor.watchers.read().await.get(&chain_id).unwrap().subscribe();
        state.wait_for(|state| *state == WatcherState::Live).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_configuration_starts_and_stops_watcher() {
        let settings = Arc::new(MemorySettings::new());
        let (supervisor, _) = supervisor(BTreeMap::new(), settings.clone());

        let configuration = ChainConfiguration::new(1, Some("http://localhost:8545".to_string()));
        supervisor.apply_configuration(configuration.clone()).await.unwrap();
        wait_until_live(&supervisor, 1).await;

        assert_eq!(settings.chain_configuration(1).unwrap(), Some(configuration));
        assert!(supervisor.is_available("ETH").await);
        assert!(!supervisor.is_available("tETH").await);
        assert!(!supervisor.is_all_available().await);

        let status = supervisor.sync_status(1).await.unwrap();
        assert!(status.configured);
        assert_eq!(status.native_block, Some(88));
        assert_eq!(status.token_block, None);

        supervisor.apply_configuration(ChainConfiguration::new(1, None)).await.unwrap();
        let status = supervisor.sync_status(1).await.unwrap();
        assert!(!status.configured);
        assert_eq!(status.state, WatcherState::Stopped);
        assert!(!supervisor.is_available("ETH").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_rpc_url_leaves_chain_unconfigured() {
        let settings = Arc::new(MemorySettings::new());
        let (supervisor, _) = supervisor(BTreeMap::new(), settings);
        supervisor
            .apply_configuration(ChainConfiguration::new(5, Some("http://goerli".to_string())))
            .await
            .unwrap();

        let result = supervisor
            .apply_configuration(ChainConfiguration::new(1, Some("ws://localhost".to_string())))
            .await;

        assert!(matches!(result, Err(SupervisorError::InvalidRpcUrl { chain_id: 1, .. })));
        assert!(!supervisor.sync_status(1).await.unwrap().configured);
        assert!(supervisor.sync_status(5).await.unwrap().configured);
        assert_eq!(
            supervisor.apply_configuration(ChainConfiguration::new(7, None)).await,
            Err(SupervisorError::UnsupportedChain(7))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_prefers_persisted_configuration() {
        let settings = Arc::new(MemorySettings::new());
        settings.save_chain_configuration(&ChainConfiguration::new(5, None)).unwrap();
        let seeds = BTreeMap::from([
            (1, "http://mainnet".to_string()),
            (5, "http://goerli".to_string()),
        ]);
        let (supervisor, _) = supervisor(seeds, settings);

        supervisor.start().await.unwrap();

        assert!(supervisor.sync_status(1).await.unwrap().configured);
        assert!(!supervisor.sync_status(5).await.unwrap().configured);
        supervisor.shutdown().await;
        assert!(!supervisor.sync_status(1).await.unwrap().configured);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_reservation_advances_index_and_watches_address() {
        let settings = Arc::new(MemorySettings::new());
        let (supervisor, payment_methods) =
            supervisor(BTreeMap::from([(1, "http://mainnet".to_string())]), settings);
        supervisor.start().await.unwrap();

        let request = ReservationRequest::with_random_id("store", "ETH");
        let response = supervisor.handle_reservation(request.clone()).await;

        assert_eq!(response.op_id, request.op_id);
        let reserved = response.reserved().unwrap();
        assert_eq!((reserved.address, reserved.index), (Address::repeat_byte(1), 1));
        assert_eq!(
            payment_methods.payment_method("store", "ETH").unwrap().unwrap().current_index,
            1
        );
        let watched = supervisor.watchers.read().await.get(&1).unwrap().watched();
        assert!(watched.contains(&Address::repeat_byte(1)));

        let second = supervisor.handle_reservation(request.clone()).await;
        assert_eq!(second.reserved().map(|r| r.index), Some(2));
        // the table holds three addresses
        let exhausted = supervisor.handle_reservation(request).await;
        assert_eq!(exhausted.outcome, ReservationOutcome::Failed);
        assert_eq!(
            payment_methods.payment_method("store", "ETH").unwrap().unwrap().current_index,
            2
        );

        let unknown = ReservationRequest::with_random_id("other-store", "ETH");
        assert_eq!(supervisor.handle_reservation(unknown).await.outcome, ReservationOutcome::Failed);

        supervisor.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconfiguring_abandons_pending_reservation() {
        let deposit = Address::repeat_byte(0xbb);
        let chain = Arc::new(FakeChain::with_tip(100));
        chain.add_native_transfer(
            88,
            NativeTransfer {
                hash: B256::repeat_byte(1),
                from: Address::repeat_byte(0xcc),
                to: Some(deposit),
                value: U256::from(300),
                block_number: None,
            },
            true,
        );
        let invoice = Invoice {
            id: "inv".to_string(),
            store_id: "store".to_string(),
            status: InvoiceStatus::New,
            payment_methods: vec![InvoicePaymentMethod {
                currency: "ETH".to_string(),
                deposit_address: deposit,
                index: 0,
                amount: U256::from(1_000),
            }],
            ..Default::default()
        };
        let invoices = MemoryInvoiceStore::with_invoices([invoice]).unwrap();
        let (reserver, mut calls) = ReservationClient::channel(1);
        let settings = Arc::new(MemorySettings::new());
        let (supervisor, payment_methods) =
            supervisor_with(BTreeMap::new(), settings, chain, invoices, reserver);
        supervisor
            .apply_configuration(ChainConfiguration::new(1, Some("http://mainnet".to_string())))
            .await
            .unwrap();

        // the partial payment asks for the next address, left unanswered
        let call = calls.recv().await.unwrap();
        let stopped = tokio::time::timeout(
            Duration::from_secs(5),
            supervisor.apply_configuration(ChainConfiguration::new(1, None)),
        )
        .await;
        assert_eq!(stopped, Ok(Ok(())));
        assert!(call.reply.is_closed());
        assert_eq!(
            payment_methods.payment_method("store", "ETH").unwrap().unwrap().current_index,
            0
        );

        let served = tokio::time::timeout(
            Duration::from_secs(5),
            supervisor.handle_reservation(call.request),
        )
        .await;
        assert!(served.is_ok_and(|response| response.reserved().is_some()));
    }
}
