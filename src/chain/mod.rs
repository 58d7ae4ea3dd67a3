//! Proof-of-history chain manager
//!
//! Per-token hash-linked append-only log recording every classified fee
//! event. Appends are single-writer per token; verification is pure and works
//! over any supplied record list, including imported exports. A broken chain
//! is reported, never repaired - this system does not rewrite history.

use crate::classifier::{ClassifiedEvent, FeeEventType};
use crate::errors::{ChainError, FeeWatchError};
use crate::ledger::FeeStore;
use crate::logger::{self, LogTag};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Sentinel prev-hash for the first record of every chain
pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

// =============================================================================
// RECORD
// =============================================================================

/// One link of a token's proof-of-history chain, immutable once written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PohRecord {
    /// 1-based, strictly increasing per token, no gaps
    pub sequence: u64,
    pub hash: String,
    pub prev_hash: String,
    pub timestamp: DateTime<Utc>,
    pub slot: u64,
    pub event_type: FeeEventType,
    pub vault_label: String,
    pub token_mint: String,
    pub amount_lamports: u64,
    pub signature: String,
}

/// Deterministic digest over the fixed field tuple of a record
pub fn compute_record_hash(
    sequence: u64,
    prev_hash: &str,
    timestamp: &DateTime<Utc>,
    slot: u64,
    event_type: FeeEventType,
    vault_label: &str,
    token_mint: &str,
    amount_lamports: u64,
    signature: &str,
) -> String {
    let preimage = format!(
        "{}|{}|{}|{}|{}|{}|{}|{}|{}",
        sequence,
        prev_hash,
        timestamp.timestamp(),
        slot,
        event_type.as_str(),
        vault_label,
        token_mint,
        amount_lamports,
        signature
    );
    let digest = Sha256::digest(preimage.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

impl PohRecord {
    /// Recompute this record's digest from its own fields
    pub fn recompute_hash(&self) -> String {
        compute_record_hash(
            self.sequence,
            &self.prev_hash,
            &self.timestamp,
            self.slot,
            self.event_type,
            &self.vault_label,
            &self.token_mint,
            self.amount_lamports,
            &self.signature,
        )
    }
}

// =============================================================================
// CHAIN MANAGER
// =============================================================================

/// Per-token chain tail state plus append access to the store.
///
/// Not safe for concurrent appends on the same token - the orchestrator
/// serializes ingestion per mint.
pub struct PohChainManager {
    store: Arc<dyn FeeStore>,
    token_mint: String,
    vault_label: String,
    last_sequence: u64,
    last_hash: String,
    initialized: bool,
}

impl PohChainManager {
    pub fn new(store: Arc<dyn FeeStore>, token_mint: &str, vault_label: &str) -> Self {
        Self {
            store,
            token_mint: token_mint.to_string(),
            vault_label: vault_label.to_string(),
            last_sequence: 0,
            last_hash: GENESIS_HASH.to_string(),
            initialized: false,
        }
    }

    /// Load the chain tail from storage; must run before the first append
    pub fn initialize(&mut self) -> Result<(), FeeWatchError> {
        match self
            .store
            .poh_tail(&self.token_mint)
            .map_err(FeeWatchError::from)?
        {
            Some((sequence, hash)) => {
                self.last_sequence = sequence;
                self.last_hash = hash;
            }
            None => {
                self.last_sequence = 0;
                self.last_hash = GENESIS_HASH.to_string();
            }
        }
        self.initialized = true;
        logger::debug(
            LogTag::Chain,
            "INIT",
            &format!(
                "Chain tail for {} at sequence {}",
                self.token_mint, self.last_sequence
            ),
        );
        Ok(())
    }

    /// Append a classified event as the next link of this token's chain
    pub fn append(&mut self, event: &ClassifiedEvent) -> Result<PohRecord, FeeWatchError> {
        if !self.initialized {
            return Err(FeeWatchError::Chain(ChainError::NotInitialized {
                mint: self.token_mint.clone(),
            }));
        }

        let sequence = self.last_sequence + 1;
        let prev_hash = self.last_hash.clone();
        let hash = compute_record_hash(
            sequence,
            &prev_hash,
            &event.block_time,
            event.slot,
            event.event_type,
            &self.vault_label,
            &self.token_mint,
            event.amount_lamports,
            &event.signature,
        );

        let record = PohRecord {
            sequence,
            hash: hash.clone(),
            prev_hash,
            timestamp: event.block_time,
            slot: event.slot,
            event_type: event.event_type,
            vault_label: self.vault_label.clone(),
            token_mint: self.token_mint.clone(),
            amount_lamports: event.amount_lamports,
            signature: event.signature.clone(),
        };

        self.store
            .insert_poh_record_if_new(&record)
            .map_err(FeeWatchError::from)?;

        // Advance in-memory tail only after the record is durable
        self.last_sequence = sequence;
        self.last_hash = hash;

        Ok(record)
    }

    /// Append any persisted events this chain has no record for yet.
    ///
    /// `events` must be the token's full event log in insertion order - the
    /// same order chain appends were attempted in - so the current tail
    /// indexes directly into it. Heals the case where a ledger write landed
    /// but the matching chain write failed.
    pub fn reconcile(&mut self, events: &[ClassifiedEvent]) -> Result<usize, FeeWatchError> {
        if !self.initialized {
            return Err(FeeWatchError::Chain(ChainError::NotInitialized {
                mint: self.token_mint.clone(),
            }));
        }

        let missing = events.get(self.last_sequence as usize..).unwrap_or(&[]);
        let mut appended = 0usize;
        for event in missing {
            self.append(event)?;
            appended += 1;
        }

        if appended > 0 {
            logger::log(
                LogTag::Chain,
                "RECONCILED",
                &format!(
                    "Re-appended {} missing records for {}",
                    appended, self.token_mint
                ),
            );
        }
        Ok(appended)
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

// =============================================================================
// VERIFICATION
// =============================================================================

/// Result of a full-chain verification pass
#[derive(Debug, Clone, PartialEq)]
pub struct ChainVerification {
    pub valid: bool,
    /// Index (into the sequence-sorted record list) of the first failure
    pub invalid_at: Option<usize>,
    pub error: Option<String>,
}

impl ChainVerification {
    fn ok() -> Self {
        Self {
            valid: true,
            invalid_at: None,
            error: None,
        }
    }

    fn fail(index: usize, error: String) -> Self {
        Self {
            valid: false,
            invalid_at: Some(index),
            error: Some(error),
        }
    }
}

/// Verify a full chain: genesis linkage, hash correctness, prev-link
/// correctness and sequence contiguity. Pure - works over any supplied list.
pub fn verify_chain(records: &[PohRecord]) -> ChainVerification {
    if records.is_empty() {
        return ChainVerification::ok();
    }

    let mut sorted: Vec<&PohRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.sequence);

    for (index, record) in sorted.iter().enumerate() {
        if index == 0 {
            if record.sequence != 1 {
                return ChainVerification::fail(
                    index,
                    format!("chain starts at sequence {} instead of 1", record.sequence),
                );
            }
            if record.prev_hash != GENESIS_HASH {
                return ChainVerification::fail(
                    index,
                    "first record does not link to the genesis sentinel".to_string(),
                );
            }
        } else {
            let prev = sorted[index - 1];
            if record.sequence != prev.sequence + 1 {
                return ChainVerification::fail(
                    index,
                    format!(
                        "sequence gap: {} follows {}",
                        record.sequence, prev.sequence
                    ),
                );
            }
            if record.prev_hash != prev.hash {
                return ChainVerification::fail(
                    index,
                    format!("broken link at sequence {}", record.sequence),
                );
            }
        }

        if record.hash != record.recompute_hash() {
            return ChainVerification::fail(
                index,
                format!("hash mismatch at sequence {}", record.sequence),
            );
        }
    }

    ChainVerification::ok()
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

/// Wire form of a record: integer amounts as base-10 digit strings to avoid
/// precision loss, timestamps as RFC 3339
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExportedRecord {
    sequence: u64,
    hash: String,
    prev_hash: String,
    timestamp: String,
    slot: u64,
    event_type: String,
    vault_label: String,
    token_mint: String,
    amount_lamports: String,
    signature: String,
}

/// Serialize records to the external chain-export format
pub fn export_chain(records: &[PohRecord]) -> Result<String, FeeWatchError> {
    let exported: Vec<ExportedRecord> = records
        .iter()
        .map(|r| ExportedRecord {
            sequence: r.sequence,
            hash: r.hash.clone(),
            prev_hash: r.prev_hash.clone(),
            timestamp: r.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            slot: r.slot,
            event_type: r.event_type.as_str().to_string(),
            vault_label: r.vault_label.clone(),
            token_mint: r.token_mint.clone(),
            amount_lamports: r.amount_lamports.to_string(),
            signature: r.signature.clone(),
        })
        .collect();

    serde_json::to_string_pretty(&exported).map_err(FeeWatchError::from)
}

/// Exact inverse of `export_chain`; round-trips losslessly
pub fn import_chain(text: &str) -> Result<Vec<PohRecord>, FeeWatchError> {
    let exported: Vec<ExportedRecord> = serde_json::from_str(text)?;

    exported
        .into_iter()
        .map(|r| {
            let timestamp = DateTime::parse_from_rfc3339(&r.timestamp)
                .map_err(|e| FeeWatchError::parse_error("timestamp", e.to_string()))?
                .with_timezone(&Utc);
            let amount_lamports = r
                .amount_lamports
                .parse::<u64>()
                .map_err(|e| FeeWatchError::parse_error("amount_lamports", e.to_string()))?;
            let event_type = FeeEventType::from_str(&r.event_type).ok_or_else(|| {
                FeeWatchError::parse_error("event_type", format!("unknown type '{}'", r.event_type))
            })?;

            Ok(PohRecord {
                sequence: r.sequence,
                hash: r.hash,
                prev_hash: r.prev_hash,
                timestamp,
                slot: r.slot,
                event_type,
                vault_label: r.vault_label,
                token_mint: r.token_mint,
                amount_lamports,
                signature: r.signature,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassifiedEvent;
    use crate::ledger::MemoryStore;
    use chrono::TimeZone;

    const MINT: &str = "Mint1111111111111111111111111111111111111111";

    fn event(signature: &str, amount: u64, slot: u64) -> ClassifiedEvent {
        ClassifiedEvent {
            event_type: FeeEventType::Collect,
            amount_lamports: amount,
            signature: signature.to_string(),
            slot,
            block_time: Utc.timestamp_opt(1_700_000_000 + slot as i64, 0).single().unwrap(),
            burned_token_mint: None,
            burned_token_amount: None,
            recovered: false,
        }
    }

    fn build_chain(n: u64) -> (Arc<MemoryStore>, Vec<PohRecord>) {
        let store = Arc::new(MemoryStore::new());
        let mut manager = PohChainManager::new(store.clone(), MINT, "vault");
        manager.initialize().unwrap();
        let records: Vec<PohRecord> = (1..=n)
            .map(|i| manager.append(&event(&format!("sig-{}", i), i * 100, i)).unwrap())
            .collect();
        (store, records)
    }

    #[test]
    fn test_append_links_and_sequences() {
        let (_, records) = build_chain(3);
        assert_eq!(records[0].sequence, 1);
        assert_eq!(records[0].prev_hash, GENESIS_HASH);
        assert_eq!(records[1].prev_hash, records[0].hash);
        assert_eq!(records[2].prev_hash, records[1].hash);
        assert_eq!(records[2].sequence, 3);
    }

    #[test]
    fn test_append_requires_initialize() {
        let store = Arc::new(MemoryStore::new());
        let mut manager = PohChainManager::new(store, MINT, "vault");
        assert!(manager.append(&event("sig-1", 1, 1)).is_err());
    }

    #[test]
    fn test_initialize_resumes_from_stored_tail() {
        let (store, records) = build_chain(2);
        let mut manager = PohChainManager::new(store, MINT, "vault");
        manager.initialize().unwrap();
        let next = manager.append(&event("sig-3", 300, 3)).unwrap();
        assert_eq!(next.sequence, 3);
        assert_eq!(next.prev_hash, records[1].hash);
    }

    #[test]
    fn test_reconcile_appends_events_past_the_tail() {
        let store = Arc::new(MemoryStore::new());
        let mut manager = PohChainManager::new(store.clone(), MINT, "vault");
        manager.initialize().unwrap();

        let events: Vec<ClassifiedEvent> = (1..=3u64)
            .map(|i| event(&format!("sig-{}", i), i * 100, i))
            .collect();
        manager.append(&events[0]).unwrap();

        assert_eq!(manager.reconcile(&events).unwrap(), 2);
        assert_eq!(manager.last_sequence(), 3);

        let records = store.poh_records(MINT).unwrap();
        assert_eq!(records.len(), 3);
        assert!(verify_chain(&records).valid);
        assert_eq!(records[2].signature, "sig-3");

        // Already level with the ledger; nothing to re-append
        assert_eq!(manager.reconcile(&events).unwrap(), 0);
    }

    #[test]
    fn test_reconcile_requires_initialize() {
        let store = Arc::new(MemoryStore::new());
        let mut manager = PohChainManager::new(store, MINT, "vault");
        assert!(manager.reconcile(&[event("sig-1", 1, 1)]).is_err());
    }

    #[test]
    fn test_empty_chain_is_valid() {
        assert!(verify_chain(&[]).valid);
    }

    #[test]
    fn test_full_chain_verifies() {
        let (_, records) = build_chain(5);
        let result = verify_chain(&records);
        assert!(result.valid);
        assert!(result.invalid_at.is_none());
    }

    #[test]
    fn test_verification_is_order_insensitive() {
        let (_, mut records) = build_chain(4);
        records.reverse();
        assert!(verify_chain(&records).valid);
    }

    #[test]
    fn test_mutated_hash_detected() {
        let (_, mut records) = build_chain(4);
        records[2].hash = "deadbeef".repeat(8);
        let result = verify_chain(&records);
        assert!(!result.valid);
        assert_eq!(result.invalid_at, Some(2));
    }

    #[test]
    fn test_mutated_prev_hash_detected() {
        let (_, mut records) = build_chain(4);
        records[1].prev_hash = "deadbeef".repeat(8);
        let result = verify_chain(&records);
        assert!(!result.valid);
        assert_eq!(result.invalid_at, Some(1));
    }

    #[test]
    fn test_mutated_sequence_detected() {
        let (_, mut records) = build_chain(4);
        records[3].sequence = 9;
        let result = verify_chain(&records);
        assert!(!result.valid);
        assert!(result.invalid_at.unwrap() <= 3);
    }

    #[test]
    fn test_mutated_amount_detected_via_hash() {
        let (_, mut records) = build_chain(3);
        records[1].amount_lamports += 1;
        let result = verify_chain(&records);
        assert!(!result.valid);
        assert_eq!(result.invalid_at, Some(1));
    }

    #[test]
    fn test_broken_genesis_detected() {
        let (_, mut records) = build_chain(2);
        records[0].prev_hash = "ff".repeat(32);
        let result = verify_chain(&records);
        assert!(!result.valid);
        assert_eq!(result.invalid_at, Some(0));
    }

    #[test]
    fn test_export_import_round_trip() {
        let (_, records) = build_chain(4);
        let text = export_chain(&records).unwrap();
        let imported = import_chain(&text).unwrap();
        assert_eq!(imported, records);
        assert!(verify_chain(&imported).valid);
    }

    #[test]
    fn test_export_renders_amounts_as_digit_strings() {
        let (_, records) = build_chain(1);
        let text = export_chain(&records).unwrap();
        assert!(text.contains("\"amount_lamports\": \"100\""));
    }
}
