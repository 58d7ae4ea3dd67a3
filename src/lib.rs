//! feewatch - creator-fee disposition tracking for pump.fun tokens
//!
//! Ingests a token's fee-related transactions, classifies each one as a
//! collect, withdraw or burn, keeps per-token aggregates consistent with the
//! persisted event log, and records every event on a hash-linked
//! proof-of-history chain that can be exported and verified offline.

pub mod badges;
pub mod chain;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod detector;
pub mod errors;
pub mod fetcher;
pub mod ledger;
pub mod logger;
pub mod orchestrator;

pub use config::Config;
pub use errors::FeeWatchError;
