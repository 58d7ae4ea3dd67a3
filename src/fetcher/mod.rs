//! Upstream chain-data access
//!
//! `ChainDataSource` is the seam to the RPC node and the enhanced-transaction
//! REST API. Every call carries a timeout and is retried with bounded
//! exponential backoff plus jitter when the failure is transient.

mod http;
mod retry;

pub use http::HttpDataSource;
pub use retry::{with_retry, RetryPolicy};

use crate::classifier::ParsedTransaction;
use crate::errors::FeeWatchError;
use async_trait::async_trait;
use serde::Deserialize;

/// One signature entry from transaction history, newest-first
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    #[serde(default)]
    pub slot: u64,
    #[serde(default)]
    pub block_time: Option<i64>,
}

/// Token metadata as far as the dashboard needs it
#[derive(Debug, Clone, Default)]
pub struct TokenMetadata {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub creator_authority: Option<String>,
}

#[async_trait]
pub trait ChainDataSource: Send + Sync {
    /// Recent transaction signatures for an address, newest-first.
    /// `before` pages backwards; `until` stops at a known signature.
    async fn recent_signatures(
        &self,
        address: &str,
        limit: usize,
        before: Option<&str>,
        until: Option<&str>,
    ) -> Result<Vec<SignatureInfo>, FeeWatchError>;

    /// Fetch parsed transaction bodies; result order is not guaranteed to
    /// match the input order
    async fn transactions(
        &self,
        signatures: &[String],
    ) -> Result<Vec<ParsedTransaction>, FeeWatchError>;

    async fn token_metadata(&self, mint: &str) -> Result<TokenMetadata, FeeWatchError>;

    /// Current lamport balance of an address
    async fn balance(&self, address: &str) -> Result<u64, FeeWatchError>;
}
