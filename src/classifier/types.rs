/// Types for fee-event classification
///
/// `ParsedTransaction` mirrors the enhanced-transaction payload shape the
/// upstream API returns: native transfers, token transfers, invoked programs
/// and optional human-readable annotations. All amount fields stay as raw
/// JSON values until they pass through the safe coercion in `amounts.rs`.
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// FEE EVENT TYPES
// =============================================================================

/// Closed set of fee-event kinds - unclassifiable transactions produce no event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeEventType {
    Collect,
    Withdraw,
    Burn,
}

impl FeeEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeEventType::Collect => "collect",
            FeeEventType::Withdraw => "withdraw",
            FeeEventType::Burn => "burn",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "collect" => Some(FeeEventType::Collect),
            "withdraw" => Some(FeeEventType::Withdraw),
            "burn" => Some(FeeEventType::Burn),
            _ => None,
        }
    }
}

impl std::fmt::Display for FeeEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// CLASSIFIED EVENT
// =============================================================================

/// The atomic unit of fee accounting, created once by the classifier and
/// immutable thereafter. `signature` is the sole deduplication key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEvent {
    pub event_type: FeeEventType,
    pub amount_lamports: u64,
    pub signature: String,
    pub slot: u64,
    /// Finalization time; epoch zero when the source transaction lacks one
    pub block_time: DateTime<Utc>,
    /// Which token was destroyed - burn events only
    pub burned_token_mint: Option<String>,
    /// How much of it was destroyed - burn events only
    pub burned_token_amount: Option<u64>,
    /// Set when the event was replayed by gap recovery after a reconnect
    pub recovered: bool,
}

impl ClassifiedEvent {
    /// Convert an optional unix block time, degrading to epoch zero
    pub fn block_time_from_unix(block_time: Option<i64>) -> DateTime<Utc> {
        block_time
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap_or_default())
    }
}

// =============================================================================
// PARSED TRANSACTION INPUT
// =============================================================================

/// Fully-parsed transaction as returned by the enhanced-transaction API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParsedTransaction {
    pub signature: String,
    pub slot: u64,
    pub timestamp: Option<i64>,
    /// Explicit error marker - failed transactions produce no event
    pub transaction_error: Option<serde_json::Value>,
    /// Human-readable description, when the upstream API provides one
    pub description: Option<String>,
    pub native_transfers: Vec<NativeTransfer>,
    pub token_transfers: Vec<TokenTransfer>,
    pub instructions: Vec<InstructionInfo>,
    pub events: Option<TransactionEvents>,
}

/// Native-currency transfer inside a transaction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NativeTransfer {
    pub from_user_account: String,
    pub to_user_account: String,
    /// Raw upstream value - coerced, never trusted
    pub amount: serde_json::Value,
}

/// SPL token transfer inside a transaction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenTransfer {
    pub from_user_account: String,
    pub to_user_account: String,
    pub mint: String,
    pub token_amount: serde_json::Value,
}

/// Invoked program plus optional parsed instruction annotations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstructionInfo {
    pub program_id: String,
    pub instruction_name: Option<String>,
    pub mint: Option<String>,
    pub amount: serde_json::Value,
}

/// Optional event annotations attached by the upstream parser
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionEvents {
    pub burn: Option<BurnAnnotation>,
}

/// Explicit burn-amount annotation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BurnAnnotation {
    pub mint: String,
    pub amount: serde_json::Value,
}
