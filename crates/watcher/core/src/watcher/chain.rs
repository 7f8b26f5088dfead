use super::{BlockProcessor, WatcherConfig, WatcherError, WatcherHandle, WatcherState};
use crate::{
    client::ChainClient,
    config::ChainCurrencies,
    matcher::TransferMatcher,
    reconciler::PaymentReconciler,
    reservation::AddressReserver,
    watched::WatchedAddresses,
};
use paywatch_storage::{InvoiceStore, SettingsStore};
use paywatch_types::{InvoiceEvent, MatchedTransaction};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Watches one chain for payments to the deposit addresses of pending invoices.
///
/// Once spawned, a polling task first catches up to `tip - confirmation_margin`, then follows the
/// tip, sweeping payments after every cycle. A second task hands every matched transfer to the
/// [`PaymentReconciler`].
#[derive(Debug)]
pub struct ChainWatcher<S, I, C, R> {
    chain_id: u64,
    config: WatcherConfig,
    client: C,
    processor: BlockProcessor<S, C>,
    reconciler: PaymentReconciler<I, C, R>,
    watched: Arc<WatchedAddresses>,
    matched: mpsc::Receiver<MatchedTransaction>,
}

impl<S, I, C, R> ChainWatcher<S, I, C, R>
where
    S: SettingsStore + Send + Sync + 'static,
    I: InvoiceStore + Send + Sync + 'static,
    C: ChainClient + Clone + 'static,
    R: AddressReserver + 'static,
{
    /// Creates a watcher for the chain of `currencies`.
    pub fn new(
        currencies: ChainCurrencies,
        config: WatcherConfig,
        settings: Arc<S>,
        invoices: Arc<I>,
        client: C,
        reserver: R,
        events: broadcast::Sender<InvoiceEvent>,
    ) -> Self {
        let chain_id = currencies.chain_id;
        let currencies = Arc::new(currencies);
        let watched = Arc::new(WatchedAddresses::new());
        let (sender, matched) = mpsc::channel(config.match_buffer.max(1));

        let matcher = TransferMatcher::new(currencies.clone(), watched.clone(), sender);
        let processor =
            BlockProcessor::new(&currencies, settings, client.clone(), matcher, &config);
        let reconciler = PaymentReconciler::new(
            currencies,
            invoices,
            client.clone(),
            reserver,
            watched.clone(),
            events,
        );

        Self { chain_id, config, client, processor, reconciler, watched, matched }
    }

    /// Enables reorg and payment metrics.
    pub fn with_metrics(mut self) -> Self {
        self.processor = self.processor.with_metrics();
        self.reconciler = self.reconciler.with_metrics();
        self
    }

    /// The addresses this watcher matches transfers against.
    pub fn watched(&self) -> Arc<WatchedAddresses> {
        self.watched.clone()
    }

    /// Starts the polling and the reconciling task. Both stop when `cancellation` is cancelled.
    pub fn spawn(self, cancellation: CancellationToken) -> WatcherHandle {
        let Self { chain_id, config, client, processor, reconciler, watched, matched } = self;
        let reconciler = Arc::new(reconciler);
        let (state, state_rx) = watch::channel(WatcherState::CatchingUp);

        let consumer = tokio::spawn(consume(
            chain_id,
            reconciler.clone(),
            matched,
            cancellation.clone(),
        ));

        let poller = PollLoop { chain_id, config, client, processor, reconciler, state };
        let poller = tokio::spawn(poller.run(cancellation.clone()));

        info!(target: "paywatch::watcher", chain_id, "Chain watcher started");
        WatcherHandle::new(chain_id, state_rx, watched, cancellation, vec![poller, consumer])
    }
}

async fn consume<I, C, R>(
    chain_id: u64,
    reconciler: Arc<PaymentReconciler<I, C, R>>,
    mut matched: mpsc::Receiver<MatchedTransaction>,
    cancellation: CancellationToken,
) where
    I: InvoiceStore + Send + Sync,
    C: ChainClient,
    R: AddressReserver,
{
    loop {
        let transaction = tokio::select! {
            _ = cancellation.cancelled() => break,
            next = matched.recv() => match next {
                Some(transaction) => transaction,
                None => break,
            },
        };
        // a pending reservation is abandoned on cancellation
        tokio::select! {
            _ = cancellation.cancelled() => break,
            result = reconciler.handle_match(transaction) => {
                if let Err(err) = result {
                    warn!(target: "paywatch::watcher", chain_id, %err, "Failed to record matched transfer");
                }
            }
        }
    }
    debug!(target: "paywatch::watcher", chain_id, "Match consumer stopped");
}

struct PollLoop<S, I, C, R> {
    chain_id: u64,
    config: WatcherConfig,
    client: C,
    processor: BlockProcessor<S, C>,
    reconciler: Arc<PaymentReconciler<I, C, R>>,
    state: watch::Sender<WatcherState>,
}

impl<S, I, C, R> PollLoop<S, I, C, R>
where
    S: SettingsStore + Send + Sync,
    I: InvoiceStore + Send + Sync,
    C: ChainClient + Clone,
    R: AddressReserver,
{
    async fn run(self, cancellation: CancellationToken) {
        tokio::select! {
            _ = cancellation.cancelled() => {}
            _ = self.watch(&cancellation) => {}
        }
        self.state.send_replace(WatcherState::Stopped);
        info!(target: "paywatch::watcher", chain_id = self.chain_id, "Chain watcher stopped");
    }

    async fn watch(&self, cancellation: &CancellationToken) {
        self.state.send_replace(WatcherState::CatchingUp);
        while let Err(err) = self.catch_up().await {
            warn!(target: "paywatch::watcher", chain_id = self.chain_id, %err, "Catch-up failed, retrying");
            if !self.pause(cancellation).await {
                return;
            }
        }

        self.state.send_replace(WatcherState::Live);
        info!(target: "paywatch::watcher", chain_id = self.chain_id, "Caught up, following the chain tip");
        self.sweep().await;

        loop {
            if !self.pause(cancellation).await {
                return;
            }
            if let Err(err) = self.poll().await {
                warn!(target: "paywatch::watcher", chain_id = self.chain_id, %err, "Watcher cycle failed");
            }
        }
    }

    /// Sleeps for one poll interval. Returns `false` if cancelled meanwhile.
    async fn pause(&self, cancellation: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancellation.cancelled() => false,
            _ = tokio::time::sleep(self.config.poll_interval) => true,
        }
    }

    async fn catch_up(&self) -> Result<(), WatcherError> {
        self.sweep().await;
        let tip = self.client.block_number().await?;
        let target = tip.saturating_sub(self.config.confirmation_margin);
        debug!(target: "paywatch::watcher", chain_id = self.chain_id, tip, target, "Catching up");
        self.processor.process_until(target).await
    }

    /// Processes new blocks up to the tip, then sweeps even if processing failed.
    async fn poll(&self) -> Result<(), WatcherError> {
        let processed = match self.client.block_number().await {
            Ok(tip) => self.processor.process_until(tip).await,
            Err(err) => Err(err.into()),
        };
        self.sweep().await;
        processed
    }

    async fn sweep(&self) {
        if let Err(err) = self.reconciler.sweep().await {
            warn!(target: "paywatch::watcher", chain_id = self.chain_id, %err, "Payment sweep failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        progress::BlockFetchRetry,
        test_utils::{FakeChain, MockReserver},
    };
    use alloy_primitives::{Address, B256, U256};
    use paywatch_storage::{MemoryInvoiceStore, MemorySettings, SettingsStoreExt};
    use paywatch_types::{Invoice, InvoicePaymentMethod, InvoiceStatus, NativeTransfer};
    use std::{collections::HashMap, time::Duration};

    const DEPOSIT: Address = Address::repeat_byte(0xbb);

    fn config() -> WatcherConfig {
        WatcherConfig {
            poll_interval: Duration::from_secs(5),
            block_fetch_retry: BlockFetchRetry { attempts: 1, delay: Duration::from_millis(1) },
            ..Default::default()
        }
    }

    fn invoice() -> Invoice {
        Invoice {
            id: "inv".to_string(),
            store_id: "store".to_string(),
            status: InvoiceStatus::New,
            payment_methods: vec![InvoicePaymentMethod {
                currency: "ETH".to_string(),
                deposit_address: DEPOSIT,
                index: 0,
                amount: U256::from(1_000),
            }],
            ..Default::default()
        }
    }

    type Watcher = ChainWatcher<MemorySettings, MemoryInvoiceStore, Arc<FakeChain>, MockReserver>;

    fn watcher(
        chain: &Arc<FakeChain>,
        settings: &Arc<MemorySettings>,
        invoices: &Arc<MemoryInvoiceStore>,
    ) -> (Watcher, broadcast::Receiver<InvoiceEvent>) {
        let currencies =
            ChainCurrencies { chain_id: 1, native: Some("ETH".to_string()), tokens: HashMap::new() };
        let mut reserver = MockReserver::new();
        reserver.expect_reserve().times(0);
        let (events, receiver) = broadcast::channel(16);
        let watcher = ChainWatcher::new(
            currencies,
            config(),
            settings.clone(),
            invoices.clone(),
            chain.clone(),
            reserver,
            events,
        );
        (watcher, receiver)
    }

    #[tokio::test(start_paused = true)]
    async fn test_catches_up_then_records_live_payments() {
        let chain = Arc::new(FakeChain::with_tip(100));
        let settings = Arc::new(MemorySettings::new());
        let invoices = Arc::new(MemoryInvoiceStore::with_invoices([invoice()]).unwrap());
        let (watcher, mut events) = watcher(&chain, &settings, &invoices);

        let mut handle = watcher.spawn(CancellationToken::new());
        let mut state = handle.subscribe();
        state.wait_for(|state| *state == WatcherState::Live).await.unwrap();

        let progress = settings.chain_progress(1, false).unwrap().unwrap();
        assert_eq!(progress.last_block_number(), Some(88));
        assert!(handle.watched().contains(&DEPOSIT));
        assert!(!handle.is_catching_up());

        chain.set_tip(101);
        chain.add_native_transfer(
            101,
            NativeTransfer {
                hash: B256::repeat_byte(1),
                from: Address::repeat_byte(0xcc),
                to: Some(DEPOSIT),
                value: U256::from(1_000),
                block_number: None,
            },
            true,
        );

        let event = events.recv().await.unwrap();
        assert!(matches!(event, InvoiceEvent::PaymentReceived { ref invoice_id, .. } if invoice_id == "inv"));
        let stored = invoices.invoice("inv").unwrap().unwrap();
        assert_eq!(stored.payments.len(), 1);
        assert_eq!(stored.payments[0].data.confirmation_count, 0);

        handle.stop().await;
        assert_eq!(handle.state(), WatcherState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeps_after_failed_cycle() {
        let chain = Arc::new(FakeChain::with_tip(100));
        let settings = Arc::new(MemorySettings::new());
        let invoices = Arc::new(MemoryInvoiceStore::with_invoices([invoice()]).unwrap());
        let (watcher, _events) = watcher(&chain, &settings, &invoices);

        let mut handle = watcher.spawn(CancellationToken::new());
        handle.subscribe().wait_for(|state| *state == WatcherState::Live).await.unwrap();

        chain.make_unavailable(89);
        let late = Address::repeat_byte(0xdd);
        let mut created = invoice();
        created.id = "late".to_string();
        created.payment_methods[0].deposit_address = late;
        invoices.insert(created).unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert!(handle.watched().contains(&late));
        assert_eq!(
            settings.chain_progress(1, false).unwrap().unwrap().last_block_number(),
            Some(88)
        );
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_catch_up_until_chain_is_reachable() {
        let chain = Arc::new(FakeChain::with_tip(50));
        chain.set_offline(true);
        let settings = Arc::new(MemorySettings::new());
        let invoices = Arc::new(MemoryInvoiceStore::new());
        let (watcher, _events) = watcher(&chain, &settings, &invoices);

        let mut handle = watcher.spawn(CancellationToken::new());
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert!(handle.is_catching_up());
        assert!(settings.chain_progress(1, false).unwrap().is_none());

        chain.set_offline(false);
        handle.subscribe().wait_for(|state| *state == WatcherState::Live).await.unwrap();
        assert_eq!(
            settings.chain_progress(1, false).unwrap().unwrap().last_block_number(),
            Some(38)
        );

        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_follows_cancellation() {
        let chain = Arc::new(FakeChain::with_tip(10));
        let settings = Arc::new(MemorySettings::new());
        let invoices = Arc::new(MemoryInvoiceStore::new());
        let (watcher, _events) = watcher(&chain, &settings, &invoices);

        let cancellation = CancellationToken::new();
        let mut handle = watcher.spawn(cancellation.child_token());
        handle.stop().await;
        handle.stop().await;
        assert_eq!(handle.state(), WatcherState::Stopped);
        assert!(!cancellation.is_cancelled());
    }
}
