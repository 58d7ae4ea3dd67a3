/// Realtime/websocket ingestion
///
/// Subscribes to lamport-balance changes on every watched address and turns
/// balance deltas into ledger events. A delta alone only gives direction, so
/// each notification resolves the newest signature on the address and runs
/// the full classifier over its body; the direction-based guess stands in
/// only when no parsed body is available yet. Disconnects reconnect with
/// bounded exponential backoff plus jitter, and every reconnect replays the
/// signatures missed while offline.
use crate::classifier::{classify, ClassifiedEvent, FeeEventType};
use crate::chain::PohChainManager;
use crate::detector::FeeSourceDetector;
use crate::errors::FeeWatchError;
use crate::fetcher::ChainDataSource;
use crate::ledger::{FeeStore, Ledger};
use crate::logger::{self, LogTag};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::batch::MintTarget;

// =============================================================================
// CONFIGURATION
// =============================================================================

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub ws_url: String,
    /// Consecutive failed connection attempts before giving up
    pub max_reconnect_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Bounded memory of recently handled signatures
    pub recent_signature_cap: usize,
    /// Signatures replayed per address after a reconnect
    pub gap_recovery_limit: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            ws_url: String::new(),
            max_reconnect_attempts: 10,
            base_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            recent_signature_cap: 512,
            gap_recovery_limit: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// One subscribed address and the token it belongs to
#[derive(Debug, Clone)]
struct WatchedAddress {
    address: String,
    mint: String,
    creator_wallet: String,
    vault_address: String,
    chain_label: String,
}

/// FIFO set with a hard cap; membership checks dedup notifications that
/// arrive for both watched addresses of the same transaction
struct RecentSignatures {
    order: VecDeque<String>,
    seen: HashSet<String>,
    cap: usize,
}

impl RecentSignatures {
    fn new(cap: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(cap),
            seen: HashSet::with_capacity(cap),
            cap: cap.max(1),
        }
    }

    fn contains(&self, signature: &str) -> bool {
        self.seen.contains(signature)
    }

    /// Returns false when the signature was already present
    fn insert(&mut self, signature: &str) -> bool {
        if !self.seen.insert(signature.to_string()) {
            return false;
        }
        self.order.push_back(signature.to_string());
        while self.order.len() > self.cap {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }
}

// =============================================================================
// MONITOR
// =============================================================================

pub struct RealtimeMonitor {
    source: Arc<dyn ChainDataSource>,
    store: Arc<dyn FeeStore>,
    detector: Arc<FeeSourceDetector>,
    ledger: Ledger,
    config: RealtimeConfig,
    state: Mutex<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    recent: Mutex<RecentSignatures>,
    last_balances: Mutex<HashMap<String, u64>>,
    /// Newest handled signature per address, the `until` cursor for gap replay
    last_signatures: Mutex<HashMap<String, String>>,
    chains: Mutex<HashMap<String, PohChainManager>>,
}

impl RealtimeMonitor {
    pub fn new(
        source: Arc<dyn ChainDataSource>,
        store: Arc<dyn FeeStore>,
        detector: Arc<FeeSourceDetector>,
        config: RealtimeConfig,
    ) -> Self {
        let ledger = Ledger::new(store.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let recent = Mutex::new(RecentSignatures::new(config.recent_signature_cap));
        Self {
            source,
            store,
            detector,
            ledger,
            config,
            state: Mutex::new(ConnectionState::Disconnected),
            shutdown_tx,
            shutdown_rx,
            recent,
            last_balances: Mutex::new(HashMap::new()),
            last_signatures: Mutex::new(HashMap::new()),
            chains: Mutex::new(HashMap::new()),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(ConnectionState::Disconnected)
    }

    fn set_state(&self, state: ConnectionState) {
        if let Ok(mut current) = self.state.lock() {
            if *current != state {
                logger::log(
                    LogTag::Realtime,
                    "STATE",
                    &format!("{:?} -> {:?}", *current, state),
                );
                *current = state;
            }
        }
    }

    /// Request a clean stop; `run` returns after the in-flight message
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    fn stopping(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Monitor a set of mints until `stop` is called or reconnect attempts
    /// are exhausted
    pub async fn run(&self, targets: &[MintTarget]) -> Result<(), FeeWatchError> {
        let watches = self.prepare_watches(targets).await?;
        if watches.is_empty() {
            logger::warning(LogTag::Realtime, "NO_TARGETS", "Nothing to watch");
            return Ok(());
        }

        let mut attempts = 0u32;
        let mut delay = self.config.base_backoff_ms;
        let mut ever_connected = false;

        loop {
            if self.stopping() {
                break;
            }

            self.set_state(if ever_connected {
                ConnectionState::Reconnecting
            } else {
                ConnectionState::Connecting
            });

            match self.run_connection(&watches, ever_connected).await {
                Ok(()) => break, // clean shutdown
                Err(e) => {
                    if self.stopping() {
                        break;
                    }
                    attempts += 1;
                    if attempts > self.config.max_reconnect_attempts {
                        self.set_state(ConnectionState::Disconnected);
                        return Err(e);
                    }
                    ever_connected = true;
                    let jittered =
                        delay / 2 + rand::thread_rng().gen_range(0..=delay / 2);
                    logger::warning(
                        LogTag::Realtime,
                        "RECONNECT",
                        &format!(
                            "Connection lost ({}), attempt {}/{} in {}ms",
                            e, attempts, self.config.max_reconnect_attempts, jittered
                        ),
                    );
                    tokio::time::sleep(Duration::from_millis(jittered)).await;
                    delay = (delay * 2).min(self.config.max_backoff_ms);
                }
            }
        }

        self.set_state(ConnectionState::Disconnected);
        Ok(())
    }

    /// Resolve watched addresses, seed balances and signature cursors, and
    /// set up per-mint chain managers
    async fn prepare_watches(
        &self,
        targets: &[MintTarget],
    ) -> Result<Vec<WatchedAddress>, FeeWatchError> {
        let mut watches = Vec::new();

        for target in targets {
            let detection = self
                .detector
                .detect(&target.mint, &target.creator_wallet)
                .await?;
            let vault_address = detection.sources.vault.address.clone();

            self.store
                .upsert_token(&target.mint, &target.creator_wallet, Some(&vault_address))?;

            let mut chain = PohChainManager::new(
                self.store.clone(),
                &target.mint,
                &detection.primary_source,
            );
            chain.initialize()?;
            chain.reconcile(&self.store.events_for_token(&target.mint)?)?;
            if let Ok(mut chains) = self.chains.lock() {
                chains.insert(target.mint.clone(), chain);
            }

            for address in detection.sources.active_addresses() {
                let balance = self.source.balance(&address).await?;
                if let Ok(mut balances) = self.last_balances.lock() {
                    balances.insert(address.clone(), balance);
                }

                let newest = self
                    .source
                    .recent_signatures(&address, 1, None, None)
                    .await?;
                if let Some(info) = newest.first() {
                    if let Ok(mut cursors) = self.last_signatures.lock() {
                        cursors.insert(address.clone(), info.signature.clone());
                    }
                }

                watches.push(WatchedAddress {
                    address,
                    mint: target.mint.clone(),
                    creator_wallet: target.creator_wallet.clone(),
                    vault_address: vault_address.clone(),
                    chain_label: detection.primary_source.clone(),
                });
            }
        }

        logger::log(
            LogTag::Realtime,
            "WATCHING",
            &format!(
                "{} addresses across {} mints",
                watches.len(),
                targets.len()
            ),
        );
        Ok(watches)
    }

    /// One websocket session: subscribe, then pump notifications until the
    /// socket drops or shutdown is requested. Ok(()) means clean shutdown.
    async fn run_connection(
        &self,
        watches: &[WatchedAddress],
        recover_gaps: bool,
    ) -> Result<(), FeeWatchError> {
        let (mut ws, _) = connect_async(self.config.ws_url.as_str())
            .await
            .map_err(|e| FeeWatchError::network_error(format!("websocket connect: {}", e)))?;

        self.set_state(ConnectionState::Connected);
        logger::log(LogTag::Websocket, "CONNECTED", &self.config.ws_url);

        if recover_gaps {
            self.recover_all_gaps(watches).await;
        }

        // Request id -> watch index while subscription confirmations are
        // outstanding, then subscription id -> watch index
        let mut pending: HashMap<u64, usize> = HashMap::new();
        let mut subscriptions: HashMap<u64, usize> = HashMap::new();

        for (index, watch) in watches.iter().enumerate() {
            let id = index as u64 + 1;
            let request = json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": "accountSubscribe",
                "params": [
                    watch.address,
                    {"encoding": "jsonParsed", "commitment": "confirmed"}
                ]
            });
            ws.send(Message::Text(request.to_string()))
                .await
                .map_err(|e| FeeWatchError::network_error(format!("subscribe send: {}", e)))?;
            pending.insert(id, index);
        }

        let mut shutdown = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    let _ = ws.send(Message::Close(None)).await;
                    return Ok(());
                }
                message = ws.next() => {
                    let message = match message {
                        Some(Ok(m)) => m,
                        Some(Err(e)) => {
                            return Err(FeeWatchError::network_error(format!(
                                "websocket read: {}", e
                            )));
                        }
                        None => {
                            return Err(FeeWatchError::network_error(
                                "websocket closed by peer",
                            ));
                        }
                    };

                    match message {
                        Message::Text(text) => {
                            if let Ok(value) = serde_json::from_str::<Value>(&text) {
                                self.handle_message(
                                    &value,
                                    watches,
                                    &mut pending,
                                    &mut subscriptions,
                                )
                                .await;
                            }
                        }
                        Message::Ping(payload) => {
                            let _ = ws.send(Message::Pong(payload)).await;
                        }
                        Message::Close(_) => {
                            return Err(FeeWatchError::network_error(
                                "websocket closed by peer",
                            ));
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    /// Route one inbound frame: subscription confirmation or notification
    async fn handle_message(
        &self,
        value: &Value,
        watches: &[WatchedAddress],
        pending: &mut HashMap<u64, usize>,
        subscriptions: &mut HashMap<u64, usize>,
    ) {
        // Subscription confirmation: {"id": N, "result": <subscription id>}
        if let (Some(id), Some(result)) = (
            value.get("id").and_then(|v| v.as_u64()),
            value.get("result").and_then(|v| v.as_u64()),
        ) {
            if let Some(index) = pending.remove(&id) {
                subscriptions.insert(result, index);
                logger::debug(
                    LogTag::Websocket,
                    "SUBSCRIBED",
                    &format!("{} (subscription {})", watches[index].address, result),
                );
            }
            return;
        }

        if value.get("method").and_then(|v| v.as_str()) != Some("accountNotification") {
            return;
        }

        let params = match value.get("params") {
            Some(p) => p,
            None => return,
        };
        let subscription = match params.get("subscription").and_then(|v| v.as_u64()) {
            Some(s) => s,
            None => return,
        };
        let index = match subscriptions.get(&subscription) {
            Some(i) => *i,
            None => return,
        };

        let lamports = params
            .pointer("/result/value/lamports")
            .and_then(|v| v.as_u64());
        let slot = params
            .pointer("/result/context/slot")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        if let Some(lamports) = lamports {
            if let Err(e) = self
                .handle_balance_change(&watches[index], lamports, slot)
                .await
            {
                logger::error(
                    LogTag::Realtime,
                    "HANDLE_FAILED",
                    &format!("{}: {}", watches[index].address, e),
                );
            }
        }
    }

    /// Turn a balance change into at most one ledger event.
    ///
    /// The delta gives direction only. The newest signature on the address is
    /// fetched and fully reclassified. A body the classifier rejects is
    /// dropped outright - a failed transaction or a creator topping up their
    /// own vault moves the balance without being a fee event, and the delta
    /// never overrides that verdict. Only when no parsed body is available
    /// yet does a direction-based event stand in.
    async fn handle_balance_change(
        &self,
        watch: &WatchedAddress,
        new_balance: u64,
        slot: u64,
    ) -> Result<(), FeeWatchError> {
        let delta = {
            let mut balances = self
                .last_balances
                .lock()
                .map_err(|_| FeeWatchError::storage_error("balance map poisoned"))?;
            let previous = balances.insert(watch.address.clone(), new_balance);
            match previous {
                Some(previous) => new_balance as i128 - previous as i128,
                // First observation carries no direction
                None => 0,
            }
        };

        if delta == 0 {
            return Ok(());
        }

        let newest = self
            .source
            .recent_signatures(&watch.address, 1, None, None)
            .await?;
        let info = match newest.first() {
            Some(info) => info,
            None => {
                logger::warning(
                    LogTag::Realtime,
                    "NO_SIGNATURE",
                    &format!(
                        "Balance moved on {} but no signature resolved; awaiting replay",
                        watch.address
                    ),
                );
                return Ok(());
            }
        };

        {
            let mut recent = self
                .recent
                .lock()
                .map_err(|_| FeeWatchError::storage_error("recent set poisoned"))?;
            if !recent.insert(&info.signature) {
                return Ok(());
            }
        }
        if let Ok(mut cursors) = self.last_signatures.lock() {
            cursors.insert(watch.address.clone(), info.signature.clone());
        }
        if self.store.has_event(&info.signature)? {
            return Ok(());
        }

        let bodies = self.source.transactions(&[info.signature.clone()]).await?;
        let event = match bodies.first() {
            Some(tx) => {
                match classify(tx, &watch.vault_address, &watch.creator_wallet, &watch.mint) {
                    Some(event) => event,
                    None => {
                        // The classifier saw the body and rejected it; the
                        // delta alone is not evidence of a fee event
                        logger::verbose(
                            LogTag::Realtime,
                            "NOT_FEE",
                            &format!(
                                "{} moved the balance on {} but is not a fee event",
                                info.signature, watch.address
                            ),
                        );
                        return Ok(());
                    }
                }
            }
            None => {
                // No parsed body yet; direction-based stand-in
                let event_type = if delta > 0 {
                    FeeEventType::Collect
                } else {
                    FeeEventType::Withdraw
                };
                ClassifiedEvent {
                    event_type,
                    amount_lamports: delta.unsigned_abs() as u64,
                    signature: info.signature.clone(),
                    slot: if info.slot > 0 { info.slot } else { slot },
                    block_time: ClassifiedEvent::block_time_from_unix(info.block_time),
                    burned_token_mint: None,
                    burned_token_amount: None,
                    recovered: false,
                }
            }
        };

        self.record_event(&watch.mint, &watch.chain_label, &event)?;
        Ok(())
    }

    /// Append to ledger and chain, then republish the aggregate
    fn record_event(
        &self,
        mint: &str,
        chain_label: &str,
        event: &ClassifiedEvent,
    ) -> Result<(), FeeWatchError> {
        let inserted = self.ledger.append(mint, event)?;
        if !inserted {
            return Ok(());
        }

        {
            let mut chains = self
                .chains
                .lock()
                .map_err(|_| FeeWatchError::storage_error("chain map poisoned"))?;
            let chain = chains.entry(mint.to_string()).or_insert_with(|| {
                PohChainManager::new(self.store.clone(), mint, chain_label)
            });
            if !chain.is_initialized() {
                chain.initialize()?;
            }
            chain.append(event)?;
        }

        self.ledger.recompute(mint)?;

        logger::log(
            LogTag::Realtime,
            "EVENT",
            &format!(
                "{} {} lamports for {} ({})",
                event.event_type, event.amount_lamports, mint, event.signature
            ),
        );
        Ok(())
    }

    /// Replay what happened on every watched address while disconnected.
    /// Best-effort per address; a failed replay waits for the next reconnect.
    async fn recover_all_gaps(&self, watches: &[WatchedAddress]) {
        // A chain write may have failed after its ledger write landed; bring
        // every chain back up to the ledger before replaying new history
        if let Ok(mut chains) = self.chains.lock() {
            for (mint, chain) in chains.iter_mut() {
                let healed = self
                    .store
                    .events_for_token(mint)
                    .map_err(FeeWatchError::from)
                    .and_then(|events| chain.reconcile(&events));
                if let Err(e) = healed {
                    logger::error(
                        LogTag::Chain,
                        "RECONCILE_FAILED",
                        &format!("{}: {}", mint, e),
                    );
                }
            }
        }

        let mut touched_mints: HashSet<String> = HashSet::new();

        for watch in watches {
            match self.recover_gap(watch).await {
                Ok(recovered) if recovered > 0 => {
                    logger::log(
                        LogTag::Realtime,
                        "GAP_RECOVERED",
                        &format!("{} missed events on {}", recovered, watch.address),
                    );
                    touched_mints.insert(watch.mint.clone());
                }
                Ok(_) => {}
                Err(e) => {
                    logger::warning(
                        LogTag::Realtime,
                        "GAP_FAILED",
                        &format!("Replay for {} failed: {}", watch.address, e),
                    );
                }
            }
        }

        for mint in touched_mints {
            if let Err(e) = self.ledger.recompute(&mint) {
                logger::error(
                    LogTag::Realtime,
                    "RECOMPUTE_FAILED",
                    &format!("{}: {}", mint, e),
                );
            }
        }
    }

    /// Replay signatures newer than the last-seen cursor on one address,
    /// oldest first, marked as recovered
    async fn recover_gap(&self, watch: &WatchedAddress) -> Result<usize, FeeWatchError> {
        let until = self
            .last_signatures
            .lock()
            .ok()
            .and_then(|c| c.get(&watch.address).cloned());

        let mut missed = self
            .source
            .recent_signatures(
                &watch.address,
                self.config.gap_recovery_limit,
                None,
                until.as_deref(),
            )
            .await?;
        if missed.is_empty() {
            return Ok(0);
        }

        // Newest-first from upstream; replay in observation order
        missed.reverse();

        let unseen: Vec<String> = {
            let mut result = Vec::new();
            for info in &missed {
                if !self.store.has_event(&info.signature)? {
                    result.push(info.signature.clone());
                }
            }
            result
        };

        let mut recovered = 0usize;
        if !unseen.is_empty() {
            let mut bodies = self.source.transactions(&unseen).await?;
            bodies.sort_by_key(|tx| (tx.timestamp.unwrap_or(0), tx.slot));

            for tx in &bodies {
                if let Some(mut event) =
                    classify(tx, &watch.vault_address, &watch.creator_wallet, &watch.mint)
                {
                    event.recovered = true;
                    let inserted = self.ledger.append(&watch.mint, &event)?;
                    if inserted {
                        let mut chains = self
                            .chains
                            .lock()
                            .map_err(|_| FeeWatchError::storage_error("chain map poisoned"))?;
                        if let Some(chain) = chains.get_mut(&watch.mint) {
                            chain.append(&event)?;
                        }
                        recovered += 1;
                    }
                }
            }
        }

        if let Some(newest) = missed.last() {
            if let Ok(mut recent) = self.recent.lock() {
                for info in &missed {
                    recent.insert(&info.signature);
                }
            }
            if let Ok(mut cursors) = self.last_signatures.lock() {
                cursors.insert(watch.address.clone(), newest.signature.clone());
            }
        }

        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{NativeTransfer, ParsedTransaction};
    use crate::detector::derive_fee_vault;
    use crate::fetcher::{SignatureInfo, TokenMetadata};
    use crate::ledger::MemoryStore;
    use async_trait::async_trait;

    const MINT: &str = "So11111111111111111111111111111111111111112";
    const WALLET: &str = "Vote111111111111111111111111111111111111111";
    const SENDER: &str = "Stake11111111111111111111111111111111111111";

    struct FakeSource {
        signatures: Mutex<HashMap<String, Vec<SignatureInfo>>>,
        bodies: Mutex<HashMap<String, ParsedTransaction>>,
    }

    impl FakeSource {
        fn new() -> Self {
            Self {
                signatures: Mutex::new(HashMap::new()),
                bodies: Mutex::new(HashMap::new()),
            }
        }

        fn push_transaction(&self, address: &str, tx: ParsedTransaction) {
            self.signatures
                .lock()
                .unwrap()
                .entry(address.to_string())
                .or_default()
                .insert(
                    0,
                    SignatureInfo {
                        signature: tx.signature.clone(),
                        slot: tx.slot,
                        block_time: tx.timestamp,
                    },
                );
            self.bodies
                .lock()
                .unwrap()
                .insert(tx.signature.clone(), tx);
        }

        fn push_signature_only(&self, address: &str, signature: &str, slot: u64) {
            self.signatures
                .lock()
                .unwrap()
                .entry(address.to_string())
                .or_default()
                .insert(
                    0,
                    SignatureInfo {
                        signature: signature.to_string(),
                        slot,
                        block_time: Some(1_700_000_000 + slot as i64),
                    },
                );
        }
    }

    #[async_trait]
    impl ChainDataSource for FakeSource {
        async fn recent_signatures(
            &self,
            address: &str,
            limit: usize,
            _before: Option<&str>,
            until: Option<&str>,
        ) -> Result<Vec<SignatureInfo>, FeeWatchError> {
            let map = self.signatures.lock().unwrap();
            let all = map.get(address).cloned().unwrap_or_default();
            let mut result = Vec::new();
            for info in all {
                if Some(info.signature.as_str()) == until {
                    break;
                }
                result.push(info);
                if result.len() >= limit {
                    break;
                }
            }
            Ok(result)
        }

        async fn transactions(
            &self,
            signatures: &[String],
        ) -> Result<Vec<ParsedTransaction>, FeeWatchError> {
            let bodies = self.bodies.lock().unwrap();
            Ok(signatures
                .iter()
                .filter_map(|s| bodies.get(s).cloned())
                .collect())
        }

        async fn token_metadata(&self, _mint: &str) -> Result<TokenMetadata, FeeWatchError> {
            Ok(TokenMetadata::default())
        }

        async fn balance(&self, _address: &str) -> Result<u64, FeeWatchError> {
            Ok(1_000_000)
        }
    }

    fn collect_tx(signature: &str, slot: u64, vault: &str, amount: u64) -> ParsedTransaction {
        ParsedTransaction {
            signature: signature.to_string(),
            slot,
            timestamp: Some(1_700_000_000 + slot as i64),
            native_transfers: vec![NativeTransfer {
                from_user_account: SENDER.to_string(),
                to_user_account: vault.to_string(),
                amount: serde_json::json!(amount),
            }],
            ..Default::default()
        }
    }

    fn monitor(source: Arc<FakeSource>, store: Arc<MemoryStore>) -> RealtimeMonitor {
        let detector = Arc::new(FeeSourceDetector::new(source.clone()));
        RealtimeMonitor::new(source, store, detector, RealtimeConfig::default())
    }

    fn watch_for(vault: &str) -> WatchedAddress {
        WatchedAddress {
            address: vault.to_string(),
            mint: MINT.to_string(),
            creator_wallet: WALLET.to_string(),
            vault_address: vault.to_string(),
            chain_label: "vault".to_string(),
        }
    }

    #[test]
    fn test_recent_signatures_evicts_oldest() {
        let mut recent = RecentSignatures::new(2);
        assert!(recent.insert("a"));
        assert!(!recent.insert("a"));
        assert!(recent.insert("b"));
        assert!(recent.insert("c"));
        assert!(!recent.contains("a"));
        assert!(recent.contains("b"));
        assert!(recent.contains("c"));
    }

    #[tokio::test]
    async fn test_positive_delta_classified_from_body() {
        let source = Arc::new(FakeSource::new());
        let store = Arc::new(MemoryStore::new());
        store.upsert_token(MINT, WALLET, None).unwrap();
        let vault = derive_fee_vault(MINT).unwrap();
        source.push_transaction(&vault, collect_tx("rt-1", 10, &vault, 5_000));

        let monitor = monitor(source, store.clone());
        let watch = watch_for(&vault);

        monitor
            .last_balances
            .lock()
            .unwrap()
            .insert(vault.clone(), 1_000);
        monitor
            .handle_balance_change(&watch, 6_000, 10)
            .await
            .unwrap();

        let events = store.events_for_token(MINT).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, FeeEventType::Collect);
        assert_eq!(events[0].amount_lamports, 5_000);
        assert!(!events[0].recovered);
    }

    #[tokio::test]
    async fn test_unresolvable_body_falls_back_to_direction() {
        let source = Arc::new(FakeSource::new());
        let store = Arc::new(MemoryStore::new());
        store.upsert_token(MINT, WALLET, None).unwrap();
        let vault = derive_fee_vault(MINT).unwrap();
        // Signature resolves but no parsed body is available yet
        source.push_signature_only(&vault, "rt-raw", 20);

        let monitor = monitor(source, store.clone());
        let watch = watch_for(&vault);

        monitor
            .last_balances
            .lock()
            .unwrap()
            .insert(vault.clone(), 9_000);
        monitor
            .handle_balance_change(&watch, 2_000, 20)
            .await
            .unwrap();

        let events = store.events_for_token(MINT).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, FeeEventType::Withdraw);
        assert_eq!(events[0].amount_lamports, 7_000);
    }

    #[tokio::test]
    async fn test_creator_topup_body_is_not_recorded_from_delta() {
        let source = Arc::new(FakeSource::new());
        let store = Arc::new(MemoryStore::new());
        store.upsert_token(MINT, WALLET, None).unwrap();
        let vault = derive_fee_vault(MINT).unwrap();
        // Creator funding their own vault raises the balance but is excluded
        source.push_transaction(
            &vault,
            ParsedTransaction {
                signature: "rt-topup".to_string(),
                slot: 60,
                timestamp: Some(1_700_000_060),
                native_transfers: vec![NativeTransfer {
                    from_user_account: WALLET.to_string(),
                    to_user_account: vault.clone(),
                    amount: serde_json::json!(5_000u64),
                }],
                ..Default::default()
            },
        );

        let monitor = monitor(source, store.clone());
        let watch = watch_for(&vault);

        monitor
            .last_balances
            .lock()
            .unwrap()
            .insert(vault.clone(), 1_000);
        monitor
            .handle_balance_change(&watch, 6_000, 60)
            .await
            .unwrap();

        assert!(store.events_for_token(MINT).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reconnect_heals_chain_behind_ledger() {
        let source = Arc::new(FakeSource::new());
        let store = Arc::new(MemoryStore::new());
        store.upsert_token(MINT, WALLET, None).unwrap();
        let monitor = monitor(source, store.clone());

        // An event landed in the ledger but its chain write never did
        let event = ClassifiedEvent {
            event_type: FeeEventType::Collect,
            amount_lamports: 900,
            signature: "rt-behind".to_string(),
            slot: 70,
            block_time: ClassifiedEvent::block_time_from_unix(Some(1_700_000_070)),
            burned_token_mint: None,
            burned_token_amount: None,
            recovered: false,
        };
        monitor.ledger.append(MINT, &event).unwrap();
        {
            let mut chains = monitor.chains.lock().unwrap();
            let mut chain = PohChainManager::new(store.clone(), MINT, "vault");
            chain.initialize().unwrap();
            chains.insert(MINT.to_string(), chain);
        }
        assert!(store.poh_records(MINT).unwrap().is_empty());

        monitor.recover_all_gaps(&[]).await;

        let records = store.poh_records(MINT).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].signature, "rt-behind");
    }

    #[tokio::test]
    async fn test_duplicate_notification_handled_once() {
        let source = Arc::new(FakeSource::new());
        let store = Arc::new(MemoryStore::new());
        store.upsert_token(MINT, WALLET, None).unwrap();
        let vault = derive_fee_vault(MINT).unwrap();
        source.push_transaction(&vault, collect_tx("rt-dup", 30, &vault, 100));

        let monitor = monitor(source, store.clone());
        let watch = watch_for(&vault);

        monitor
            .last_balances
            .lock()
            .unwrap()
            .insert(vault.clone(), 0);
        monitor.handle_balance_change(&watch, 100, 30).await.unwrap();
        monitor.handle_balance_change(&watch, 200, 31).await.unwrap();

        assert_eq!(store.events_for_token(MINT).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_delta_ignored() {
        let source = Arc::new(FakeSource::new());
        let store = Arc::new(MemoryStore::new());
        store.upsert_token(MINT, WALLET, None).unwrap();
        let vault = derive_fee_vault(MINT).unwrap();
        source.push_transaction(&vault, collect_tx("rt-zero", 40, &vault, 1));

        let monitor = monitor(source, store.clone());
        let watch = watch_for(&vault);

        monitor
            .last_balances
            .lock()
            .unwrap()
            .insert(vault.clone(), 500);
        monitor.handle_balance_change(&watch, 500, 40).await.unwrap();

        assert!(store.events_for_token(MINT).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_gap_recovery_replays_missed_events_as_recovered() {
        let source = Arc::new(FakeSource::new());
        let store = Arc::new(MemoryStore::new());
        store.upsert_token(MINT, WALLET, None).unwrap();
        let vault = derive_fee_vault(MINT).unwrap();

        source.push_transaction(&vault, collect_tx("gap-0", 50, &vault, 10));

        let monitor = monitor(source.clone(), store.clone());
        let watch = watch_for(&vault);
        monitor
            .last_signatures
            .lock()
            .unwrap()
            .insert(vault.clone(), "gap-0".to_string());
        {
            let mut chains = monitor.chains.lock().unwrap();
            let mut chain = PohChainManager::new(store.clone(), MINT, "vault");
            chain.initialize().unwrap();
            chains.insert(MINT.to_string(), chain);
        }

        // Two events land while offline
        source.push_transaction(&vault, collect_tx("gap-1", 51, &vault, 200));
        source.push_transaction(&vault, collect_tx("gap-2", 52, &vault, 300));

        let recovered = monitor.recover_gap(&watch).await.unwrap();
        assert_eq!(recovered, 2);

        let events = store.events_for_token(MINT).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.recovered));
        // Oldest replayed first
        assert_eq!(events[0].signature, "gap-1");

        // Cursor advanced; a second replay is a no-op
        assert_eq!(monitor.recover_gap(&watch).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stop_before_run_returns_immediately() {
        let source = Arc::new(FakeSource::new());
        let store = Arc::new(MemoryStore::new());
        let monitor = monitor(source, store);

        monitor.stop();
        let targets = vec![MintTarget {
            mint: MINT.to_string(),
            creator_wallet: WALLET.to_string(),
        }];
        monitor.run(&targets).await.unwrap();
        assert_eq!(monitor.state(), ConnectionState::Disconnected);
    }
}
