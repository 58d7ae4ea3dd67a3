//! TOML configuration
//!
//! Loaded once at startup. A missing file is written out with defaults so a
//! fresh checkout produces an editable template instead of an error.

use crate::fetcher::RetryPolicy;
use crate::logger::{self, LogTag};
use crate::orchestrator::{BatchConfig, RealtimeConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "feewatch.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON-RPC endpoint for signatures and balances
    pub rpc_url: String,
    /// Websocket endpoint for account subscriptions
    pub ws_url: String,
    /// Enhanced-transaction REST API base URL
    pub api_url: String,
    pub api_key: String,
    pub database_path: String,
    pub batch: BatchSettings,
    pub realtime: RealtimeSettings,
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub signature_limit: usize,
    pub tx_chunk_size: usize,
    pub max_parallel_mints: usize,
}

/// Retry tuning for the two upstream call classes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub rpc_max_retries: u32,
    pub rpc_base_delay_ms: u64,
    pub rpc_max_delay_ms: u64,
    pub rest_max_retries: u32,
    pub rest_base_delay_ms: u64,
    pub rest_max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let rpc = RetryPolicy::rpc();
        let rest = RetryPolicy::rest();
        Self {
            rpc_max_retries: rpc.max_retries,
            rpc_base_delay_ms: rpc.base_delay_ms,
            rpc_max_delay_ms: rpc.max_delay_ms,
            rest_max_retries: rest.max_retries,
            rest_base_delay_ms: rest.base_delay_ms,
            rest_max_delay_ms: rest.max_delay_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeSettings {
    pub max_reconnect_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub recent_signature_cap: usize,
    pub gap_recovery_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            ws_url: "wss://api.mainnet-beta.solana.com".to_string(),
            api_url: "https://api.helius.xyz".to_string(),
            api_key: String::new(),
            database_path: "feewatch.db".to_string(),
            batch: BatchSettings::default(),
            realtime: RealtimeSettings::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        let defaults = BatchConfig::default();
        Self {
            signature_limit: defaults.signature_limit,
            tx_chunk_size: defaults.tx_chunk_size,
            max_parallel_mints: defaults.max_parallel_mints,
        }
    }
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        let defaults = RealtimeConfig::default();
        Self {
            max_reconnect_attempts: defaults.max_reconnect_attempts,
            base_backoff_ms: defaults.base_backoff_ms,
            max_backoff_ms: defaults.max_backoff_ms,
            recent_signature_cap: defaults.recent_signature_cap,
            gap_recovery_limit: defaults.gap_recovery_limit,
        }
    }
}

impl Config {
    /// Load from `path`, writing a default template when the file is missing
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Config::default();
            config.save(path)?;
            logger::log(
                LogTag::Config,
                "CREATED",
                &format!("Wrote default configuration to {}", path.display()),
            );
            return Ok(config);
        }

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config =
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        logger::debug(
            LogTag::Config,
            "LOADED",
            &format!("Configuration from {}", path.display()),
        );
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).context("serializing configuration")?;
        std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            signature_limit: self.batch.signature_limit,
            tx_chunk_size: self.batch.tx_chunk_size,
            max_parallel_mints: self.batch.max_parallel_mints,
        }
    }

    pub fn rpc_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.rpc_max_retries,
            base_delay_ms: self.retry.rpc_base_delay_ms,
            max_delay_ms: self.retry.rpc_max_delay_ms,
        }
    }

    pub fn rest_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry.rest_max_retries,
            base_delay_ms: self.retry.rest_base_delay_ms,
            max_delay_ms: self.retry.rest_max_delay_ms,
        }
    }

    pub fn realtime_config(&self) -> RealtimeConfig {
        RealtimeConfig {
            ws_url: self.ws_url.clone(),
            max_reconnect_attempts: self.realtime.max_reconnect_attempts,
            base_backoff_ms: self.realtime.base_backoff_ms,
            max_backoff_ms: self.realtime.max_backoff_ms,
            recent_signature_cap: self.realtime.recent_signature_cap,
            gap_recovery_limit: self.realtime.gap_recovery_limit,
        }
    }
}
