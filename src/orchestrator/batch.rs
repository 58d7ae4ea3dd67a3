/// Batch/poll ingestion
///
/// For each target mint: detect watched addresses, pull recent signatures,
/// drop the ones already persisted, fetch bodies in bounded chunks, classify,
/// append through ledger and chain in observation order, then recompute the
/// aggregate once per mint. Mints are independent - failures are collected
/// into the summary and never abort the run.
use crate::classifier::classify;
use crate::chain::PohChainManager;
use crate::detector::FeeSourceDetector;
use crate::errors::FeeWatchError;
use crate::fetcher::{ChainDataSource, SignatureInfo};
use crate::ledger::{FeeStore, Ledger};
use crate::logger::{self, LogTag};
use futures_util::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;

// =============================================================================
// CONFIGURATION
// =============================================================================

#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Signatures fetched per watched address per run
    pub signature_limit: usize,
    /// Transaction bodies fetched per upstream call
    pub tx_chunk_size: usize,
    /// Mints ingested concurrently; within one mint everything is serial
    pub max_parallel_mints: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            signature_limit: 100,
            tx_chunk_size: 50,
            max_parallel_mints: 4,
        }
    }
}

/// One token to ingest
#[derive(Debug, Clone)]
pub struct MintTarget {
    pub mint: String,
    pub creator_wallet: String,
}

/// Structured result of a batch run; partial success is the steady state
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub processed: usize,
    pub new_events: usize,
    pub errors: Vec<String>,
}

// =============================================================================
// ORCHESTRATOR
// =============================================================================

pub struct BatchOrchestrator {
    source: Arc<dyn ChainDataSource>,
    store: Arc<dyn FeeStore>,
    detector: Arc<FeeSourceDetector>,
    ledger: Ledger,
    config: BatchConfig,
}

impl BatchOrchestrator {
    pub fn new(
        source: Arc<dyn ChainDataSource>,
        store: Arc<dyn FeeStore>,
        detector: Arc<FeeSourceDetector>,
        config: BatchConfig,
    ) -> Self {
        let ledger = Ledger::new(store.clone());
        Self {
            source,
            store,
            detector,
            ledger,
            config,
        }
    }

    /// Ingest a set of mints, parallel across mints, serial within each
    pub async fn run_batch(&self, targets: &[MintTarget]) -> BatchSummary {
        let mut summary = BatchSummary::default();

        let results: Vec<(String, Result<usize, FeeWatchError>)> = stream::iter(targets)
            .map(|target| async move { (target.mint.clone(), self.ingest_mint(target).await) })
            .buffer_unordered(self.config.max_parallel_mints.max(1))
            .collect()
            .await;

        for (mint, result) in results {
            match result {
                Ok(new_events) => {
                    summary.processed += 1;
                    summary.new_events += new_events;
                }
                Err(e) => {
                    logger::error(LogTag::Batch, "MINT_FAILED", &format!("{}: {}", mint, e));
                    summary.errors.push(format!("{}: {}", mint, e));
                }
            }
        }

        logger::log(
            LogTag::Batch,
            "SUMMARY",
            &format!(
                "Processed {}/{} mints, {} new events, {} errors",
                summary.processed,
                targets.len(),
                summary.new_events,
                summary.errors.len()
            ),
        );

        summary
    }

    /// Full ingestion pass for one mint
    async fn ingest_mint(&self, target: &MintTarget) -> Result<usize, FeeWatchError> {
        let detection = self
            .detector
            .detect(&target.mint, &target.creator_wallet)
            .await?;
        let vault_address = detection.sources.vault.address.clone();

        self.store
            .upsert_token(&target.mint, &target.creator_wallet, Some(&vault_address))?;

        // Metadata is decoration; its failure never blocks ingestion
        match self.source.token_metadata(&target.mint).await {
            Ok(meta) => {
                let _ = self.store.set_token_metadata(
                    &target.mint,
                    meta.name.as_deref(),
                    meta.symbol.as_deref(),
                );
            }
            Err(e) => {
                logger::debug(
                    LogTag::Batch,
                    "METADATA",
                    &format!("Metadata fetch for {} failed: {}", target.mint, e),
                );
            }
        }

        let mut chain =
            PohChainManager::new(self.store.clone(), &target.mint, &detection.primary_source);
        chain.initialize()?;
        // A prior run may have persisted an event whose chain write failed;
        // candidates below are filtered on event presence, so heal here
        chain.reconcile(&self.store.events_for_token(&target.mint)?)?;

        let candidates = self.collect_candidates(&detection.sources.active_addresses()).await?;

        let mut new_events = 0usize;
        for chunk in candidates.chunks(self.config.tx_chunk_size.max(1)) {
            let signatures: Vec<String> = chunk.iter().map(|s| s.signature.clone()).collect();
            let mut bodies = self.source.transactions(&signatures).await?;

            // Upstream body order is unspecified; replay oldest-to-newest
            bodies.sort_by_key(|tx| (tx.timestamp.unwrap_or(0), tx.slot));

            for tx in &bodies {
                let event = match classify(tx, &vault_address, &target.creator_wallet, &target.mint)
                {
                    Some(event) => event,
                    None => continue,
                };

                if tx.timestamp.is_none() {
                    logger::warning(
                        LogTag::Batch,
                        "NO_BLOCKTIME",
                        &format!("{} lacks a block time, recorded at epoch zero", event.signature),
                    );
                }

                if self.ledger.append(&target.mint, &event)? {
                    chain.append(&event)?;
                    new_events += 1;
                }
            }
        }

        // One recompute per mint per batch - recompute is O(all events)
        self.ledger.recompute(&target.mint)?;

        logger::log(
            LogTag::Batch,
            "INGESTED",
            &format!("{}: {} new events", target.mint, new_events),
        );

        Ok(new_events)
    }

    /// Gather unseen candidate signatures across the watched addresses,
    /// deduplicated and ordered oldest-to-newest
    async fn collect_candidates(
        &self,
        addresses: &[String],
    ) -> Result<Vec<SignatureInfo>, FeeWatchError> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates: Vec<SignatureInfo> = Vec::new();

        for address in addresses {
            let signatures = self
                .source
                .recent_signatures(address, self.config.signature_limit, None, None)
                .await?;

            for info in signatures {
                if seen.insert(info.signature.clone()) && !self.store.has_event(&info.signature)? {
                    candidates.push(info);
                }
            }
        }

        candidates.sort_by_key(|s| (s.block_time.unwrap_or(0), s.slot));
        Ok(candidates)
    }
}
