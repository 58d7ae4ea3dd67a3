/// In-memory `FeeStore` for tests and dry runs
///
/// Same contract as the sqlite store, including signature dedup and ordered
/// chain records. Supports write-failure injection to exercise the partial
/// failure paths of the ledger and orchestrator.
use super::store::{FeeStore, TokenAccount};
use crate::chain::PohRecord;
use crate::classifier::{calculate_event_stats, ClassifiedEvent, EventStats};
use anyhow::{bail, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    tokens: HashMap<String, TokenAccount>,
    /// (mint, event) pairs in insertion order
    events: Vec<(String, ClassifiedEvent)>,
    signatures: HashSet<String>,
    poh: HashMap<String, Vec<PohRecord>>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, to simulate a storage outage
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("Simulated storage failure");
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FeeStore for MemoryStore {
    fn upsert_token(&self, mint: &str, creator_wallet: &str, vault: Option<&str>) -> Result<()> {
        self.check_writable()?;
        let mut inner = self.lock();
        inner
            .tokens
            .entry(mint.to_string())
            .and_modify(|t| {
                t.creator_wallet = creator_wallet.to_string();
                t.vault_address = vault.map(|v| v.to_string());
            })
            .or_insert_with(|| TokenAccount::new(mint, creator_wallet, vault));
        Ok(())
    }

    fn set_token_metadata(
        &self,
        mint: &str,
        name: Option<&str>,
        symbol: Option<&str>,
    ) -> Result<()> {
        self.check_writable()?;
        let mut inner = self.lock();
        if let Some(token) = inner.tokens.get_mut(mint) {
            if name.is_some() {
                token.name = name.map(|n| n.to_string());
            }
            if symbol.is_some() {
                token.symbol = symbol.map(|s| s.to_string());
            }
        }
        Ok(())
    }

    fn insert_event_if_new(&self, mint: &str, event: &ClassifiedEvent) -> Result<bool> {
        self.check_writable()?;
        let mut inner = self.lock();
        if inner.signatures.contains(&event.signature) {
            return Ok(false);
        }
        inner.signatures.insert(event.signature.clone());
        inner.events.push((mint.to_string(), event.clone()));
        Ok(true)
    }

    fn has_event(&self, signature: &str) -> Result<bool> {
        Ok(self.lock().signatures.contains(signature))
    }

    fn events_for_token(&self, mint: &str) -> Result<Vec<ClassifiedEvent>> {
        Ok(self
            .lock()
            .events
            .iter()
            .filter(|(m, _)| m == mint)
            .map(|(_, e)| e.clone())
            .collect())
    }

    fn sum_events_by_type(&self, mint: &str) -> Result<EventStats> {
        let events = self.events_for_token(mint)?;
        Ok(calculate_event_stats(&events))
    }

    fn save_aggregates(&self, account: &TokenAccount) -> Result<()> {
        self.check_writable()?;
        let mut inner = self.lock();
        inner.tokens.insert(account.mint.clone(), account.clone());
        Ok(())
    }

    fn load_token(&self, mint: &str) -> Result<Option<TokenAccount>> {
        Ok(self.lock().tokens.get(mint).cloned())
    }

    fn insert_poh_record_if_new(&self, record: &PohRecord) -> Result<bool> {
        self.check_writable()?;
        let mut inner = self.lock();
        let records = inner.poh.entry(record.token_mint.clone()).or_default();
        if records.iter().any(|r| r.sequence == record.sequence) {
            return Ok(false);
        }
        records.push(record.clone());
        records.sort_by_key(|r| r.sequence);
        Ok(true)
    }

    fn poh_records(&self, mint: &str) -> Result<Vec<PohRecord>> {
        Ok(self.lock().poh.get(mint).cloned().unwrap_or_default())
    }

    fn poh_tail(&self, mint: &str) -> Result<Option<(u64, String)>> {
        Ok(self
            .lock()
            .poh
            .get(mint)
            .and_then(|records| records.last())
            .map(|r| (r.sequence, r.hash.clone())))
    }
}
