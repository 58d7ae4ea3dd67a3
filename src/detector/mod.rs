//! Fee-source model detector
//!
//! Decides, per token, whether fees flow to the program-derived vault, the
//! creator's wallet, or both, and which addresses ingestion must watch. The
//! heuristic works over transaction counts and balance snapshots, not
//! transaction content. Read-only; results are cached per mint and refreshed
//! only on explicit request.

use crate::constants::{FEE_VAULT_SEED, PUMP_FEE_PROGRAM_ID};
use crate::errors::FeeWatchError;
use crate::fetcher::ChainDataSource;
use crate::logger::{self, LogTag};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// How many recent signatures to sample per address
const DETECTION_SIGNATURE_SAMPLE: usize = 20;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeSourceModel {
    VaultPda,
    CreatorWallet,
    Hybrid,
    Unknown,
}

impl FeeSourceModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeSourceModel::VaultPda => "vault_pda",
            FeeSourceModel::CreatorWallet => "creator_wallet",
            FeeSourceModel::Hybrid => "hybrid",
            FeeSourceModel::Unknown => "unknown",
        }
    }
}

/// One authoritative fee destination and whether ingestion watches it
#[derive(Debug, Clone, PartialEq)]
pub struct WatchedSource {
    pub address: String,
    pub active: bool,
}

/// Per-token fee-source configuration consumed by the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct FeeSourceConfig {
    pub vault: WatchedSource,
    pub wallet: WatchedSource,
}

impl FeeSourceConfig {
    /// Addresses the ingestion pipeline must subscribe to
    pub fn active_addresses(&self) -> Vec<String> {
        let mut addresses = Vec::new();
        if self.vault.active {
            addresses.push(self.vault.address.clone());
        }
        if self.wallet.active {
            addresses.push(self.wallet.address.clone());
        }
        addresses
    }
}

/// Raw observations backing a detection decision
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionEvidence {
    pub vault_signature_count: usize,
    pub wallet_signature_count: usize,
    pub vault_balance_lamports: u64,
    pub wallet_balance_lamports: u64,
    pub vault_last_seen: Option<i64>,
    pub wallet_last_seen: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub model: FeeSourceModel,
    pub primary_source: String,
    pub evidence: DetectionEvidence,
    pub recommendation: String,
    pub sources: FeeSourceConfig,
}

// =============================================================================
// VAULT DERIVATION
// =============================================================================

/// Derive the program-derived fee vault address for a mint
pub fn derive_fee_vault(mint: &str) -> Result<String, FeeWatchError> {
    let mint_key = Pubkey::from_str(mint)
        .map_err(|e| FeeWatchError::invalid_address(mint, e.to_string()))?;
    let program = Pubkey::from_str(PUMP_FEE_PROGRAM_ID)
        .map_err(|e| FeeWatchError::invalid_address(PUMP_FEE_PROGRAM_ID, e.to_string()))?;

    let (vault, _bump) =
        Pubkey::find_program_address(&[FEE_VAULT_SEED, mint_key.as_ref()], &program);
    Ok(vault.to_string())
}

// =============================================================================
// DETECTOR
// =============================================================================

pub struct FeeSourceDetector {
    source: Arc<dyn ChainDataSource>,
    cache: Mutex<HashMap<String, DetectionResult>>,
}

impl FeeSourceDetector {
    pub fn new(source: Arc<dyn ChainDataSource>) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Detect the fee-source model for a token, serving from cache when seen
    /// before. Use `refresh` to re-run the heuristic (e.g. after a migration).
    pub async fn detect(
        &self,
        mint: &str,
        creator_wallet: &str,
    ) -> Result<DetectionResult, FeeWatchError> {
        if let Some(cached) = self.cache.lock().ok().and_then(|c| c.get(mint).cloned()) {
            return Ok(cached);
        }
        self.run_detection(mint, creator_wallet).await
    }

    /// Drop the cached result and re-run detection
    pub async fn refresh(
        &self,
        mint: &str,
        creator_wallet: &str,
    ) -> Result<DetectionResult, FeeWatchError> {
        if let Ok(mut cache) = self.cache.lock() {
            cache.remove(mint);
        }
        self.run_detection(mint, creator_wallet).await
    }

    async fn run_detection(
        &self,
        mint: &str,
        creator_wallet: &str,
    ) -> Result<DetectionResult, FeeWatchError> {
        let vault_address = derive_fee_vault(mint)?;

        let vault_signatures = self
            .source
            .recent_signatures(&vault_address, DETECTION_SIGNATURE_SAMPLE, None, None)
            .await?;
        let wallet_signatures = self
            .source
            .recent_signatures(creator_wallet, DETECTION_SIGNATURE_SAMPLE, None, None)
            .await?;
        let vault_balance = self.source.balance(&vault_address).await?;
        let wallet_balance = self.source.balance(creator_wallet).await?;

        let vault_last_seen = vault_signatures.first().and_then(|s| s.block_time);
        let wallet_last_seen = wallet_signatures.first().and_then(|s| s.block_time);

        let evidence = DetectionEvidence {
            vault_signature_count: vault_signatures.len(),
            wallet_signature_count: wallet_signatures.len(),
            vault_balance_lamports: vault_balance,
            wallet_balance_lamports: wallet_balance,
            vault_last_seen,
            wallet_last_seen,
        };

        let vault_active = !vault_signatures.is_empty();
        let wallet_active = !wallet_signatures.is_empty();

        let (model, primary_source, recommendation) = match (vault_active, wallet_active) {
            (true, false) => (
                FeeSourceModel::VaultPda,
                "vault".to_string(),
                "Watch the derived vault address".to_string(),
            ),
            (false, true) => (
                FeeSourceModel::CreatorWallet,
                "wallet".to_string(),
                "Watch the creator wallet directly".to_string(),
            ),
            (true, true) => {
                // Primary is whichever saw the more recent transaction
                let primary = if wallet_last_seen.unwrap_or(0) > vault_last_seen.unwrap_or(0) {
                    "wallet"
                } else {
                    "vault"
                };
                (
                    FeeSourceModel::Hybrid,
                    primary.to_string(),
                    "Watch both vault and creator wallet".to_string(),
                )
            }
            (false, false) => (
                FeeSourceModel::Unknown,
                "none".to_string(),
                "No activity observed; watch both addresses".to_string(),
            ),
        };

        // Unknown falls back to watching both
        let watch_both = matches!(model, FeeSourceModel::Hybrid | FeeSourceModel::Unknown);
        let sources = FeeSourceConfig {
            vault: WatchedSource {
                address: vault_address,
                active: vault_active || watch_both,
            },
            wallet: WatchedSource {
                address: creator_wallet.to_string(),
                active: wallet_active || watch_both,
            },
        };

        let result = DetectionResult {
            model,
            primary_source,
            evidence,
            recommendation,
            sources,
        };

        logger::log(
            LogTag::Detector,
            "DETECT",
            &format!(
                "{}: model={} primary={} (vault sigs={}, wallet sigs={})",
                mint,
                result.model.as_str(),
                result.primary_source,
                result.evidence.vault_signature_count,
                result.evidence.wallet_signature_count
            ),
        );

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(mint.to_string(), result.clone());
        }

        Ok(result)
    }
}
