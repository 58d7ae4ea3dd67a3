/// Structured error types for feewatch
///
/// Every upstream and storage failure is represented here so the retry policy
/// can distinguish transient failures (retried with backoff) from permanent
/// ones (surfaced immediately, attributed to the mint being processed).

// =============================================================================
// MAIN ERROR TYPE
// =============================================================================

#[derive(Debug, Clone)]
pub enum FeeWatchError {
    // Network connectivity errors
    Network(NetworkError),

    // RPC / REST provider issues
    Rpc(RpcError),

    // Data parsing & validation errors
    Data(DataError),

    // Persistence failures
    Storage(StorageError),

    // Proof-of-history chain integrity failures
    Chain(ChainError),

    // Configuration errors
    Config(ConfigError),
}

impl std::fmt::Display for FeeWatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeeWatchError::Network(e) => write!(f, "Network Error: {}", e),
            FeeWatchError::Rpc(e) => write!(f, "RPC Error: {}", e),
            FeeWatchError::Data(e) => write!(f, "Data Error: {}", e),
            FeeWatchError::Storage(e) => write!(f, "Storage Error: {}", e),
            FeeWatchError::Chain(e) => write!(f, "Chain Error: {}", e),
            FeeWatchError::Config(e) => write!(f, "Configuration Error: {}", e),
        }
    }
}

impl std::error::Error for FeeWatchError {}

// =============================================================================
// NETWORK ERROR TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub enum NetworkError {
    ConnectionTimeout { endpoint: String, timeout_ms: u64 },
    ConnectionReset { endpoint: String, reason: String },
    WebsocketClosed { reason: String },
    Generic { message: String },
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkError::ConnectionTimeout {
                endpoint,
                timeout_ms,
            } => {
                write!(f, "Connection timeout to {} after {}ms", endpoint, timeout_ms)
            }
            NetworkError::ConnectionReset { endpoint, reason } => {
                write!(f, "Connection to {} reset: {}", endpoint, reason)
            }
            NetworkError::WebsocketClosed { reason } => {
                write!(f, "Websocket closed: {}", reason)
            }
            NetworkError::Generic { message } => write!(f, "{}", message),
        }
    }
}

// =============================================================================
// RPC / PROVIDER ERROR TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub enum RpcError {
    RateLimitExceeded { endpoint: String },
    ServerError { endpoint: String, status: u16 },
    ClientError { endpoint: String, status: u16, body: String },
    MalformedResponse { endpoint: String, detail: String },
    Generic { message: String },
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcError::RateLimitExceeded { endpoint } => {
                write!(f, "Rate limit exceeded at {}", endpoint)
            }
            RpcError::ServerError { endpoint, status } => {
                write!(f, "HTTP {} from {}", status, endpoint)
            }
            RpcError::ClientError {
                endpoint,
                status,
                body,
            } => {
                write!(f, "HTTP {} from {}: {}", status, endpoint, body)
            }
            RpcError::MalformedResponse { endpoint, detail } => {
                write!(f, "Malformed response from {}: {}", endpoint, detail)
            }
            RpcError::Generic { message } => write!(f, "{}", message),
        }
    }
}

// =============================================================================
// DATA ERROR TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub enum DataError {
    ParseError { data_type: String, error: String },
    InvalidAddress { address: String, error: String },
    Generic { message: String },
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::ParseError { data_type, error } => {
                write!(f, "Failed to parse {}: {}", data_type, error)
            }
            DataError::InvalidAddress { address, error } => {
                write!(f, "Invalid address '{}': {}", address, error)
            }
            DataError::Generic { message } => write!(f, "{}", message),
        }
    }
}

// =============================================================================
// STORAGE ERROR TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub enum StorageError {
    WriteFailed { operation: String, error: String },
    ReadFailed { operation: String, error: String },
    Generic { message: String },
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::WriteFailed { operation, error } => {
                write!(f, "Write failed during {}: {}", operation, error)
            }
            StorageError::ReadFailed { operation, error } => {
                write!(f, "Read failed during {}: {}", operation, error)
            }
            StorageError::Generic { message } => write!(f, "{}", message),
        }
    }
}

// =============================================================================
// CHAIN ERROR TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub enum ChainError {
    NotInitialized { mint: String },
    IntegrityViolation { mint: String, sequence: u64, detail: String },
    Generic { message: String },
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainError::NotInitialized { mint } => {
                write!(f, "Chain manager for {} used before initialize()", mint)
            }
            ChainError::IntegrityViolation {
                mint,
                sequence,
                detail,
            } => {
                write!(f, "Chain integrity violation for {} at sequence {}: {}", mint, sequence, detail)
            }
            ChainError::Generic { message } => write!(f, "{}", message),
        }
    }
}

// =============================================================================
// CONFIGURATION ERROR TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub enum ConfigError {
    InvalidConfig { field: String, reason: String },
    FileError { path: String, error: String },
    Generic { message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidConfig { field, reason } => {
                write!(f, "Invalid config field '{}': {}", field, reason)
            }
            ConfigError::FileError { path, error } => {
                write!(f, "Config file '{}': {}", path, error)
            }
            ConfigError::Generic { message } => write!(f, "{}", message),
        }
    }
}

// =============================================================================
// RETRYABILITY
// =============================================================================

impl FeeWatchError {
    /// Whether the failure is transient and worth retrying with backoff
    ///
    /// Timeouts, resets, rate limits and 5xx responses are retryable.
    /// Malformed data, other 4xx responses and storage/chain failures
    /// propagate immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            FeeWatchError::Network(_) => true,
            FeeWatchError::Rpc(e) => matches!(
                e,
                RpcError::RateLimitExceeded { .. } | RpcError::ServerError { .. }
            ),
            FeeWatchError::Data(_) => false,
            FeeWatchError::Storage(_) => false,
            FeeWatchError::Chain(_) => false,
            FeeWatchError::Config(_) => false,
        }
    }
}

// =============================================================================
// CONVERSIONS FROM LIBRARY ERROR TYPES
// =============================================================================

impl From<reqwest::Error> for FeeWatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return FeeWatchError::Network(NetworkError::ConnectionTimeout {
                endpoint: err
                    .url()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                timeout_ms: 0,
            });
        }
        FeeWatchError::Network(NetworkError::Generic {
            message: format!("HTTP request failed: {}", err),
        })
    }
}

impl From<serde_json::Error> for FeeWatchError {
    fn from(err: serde_json::Error) -> Self {
        FeeWatchError::Data(DataError::ParseError {
            data_type: "JSON".to_string(),
            error: err.to_string(),
        })
    }
}

impl From<rusqlite::Error> for FeeWatchError {
    fn from(err: rusqlite::Error) -> Self {
        FeeWatchError::Storage(StorageError::Generic {
            message: err.to_string(),
        })
    }
}

impl From<anyhow::Error> for FeeWatchError {
    fn from(err: anyhow::Error) -> Self {
        FeeWatchError::Storage(StorageError::Generic {
            message: err.to_string(),
        })
    }
}

// =============================================================================
// STRUCTURED ERROR BUILDERS
// =============================================================================

impl FeeWatchError {
    pub fn network_error(message: impl Into<String>) -> Self {
        FeeWatchError::Network(NetworkError::Generic {
            message: message.into(),
        })
    }

    pub fn rpc_error(message: impl Into<String>) -> Self {
        FeeWatchError::Rpc(RpcError::Generic {
            message: message.into(),
        })
    }

    pub fn parse_error(data_type: impl Into<String>, error: impl Into<String>) -> Self {
        FeeWatchError::Data(DataError::ParseError {
            data_type: data_type.into(),
            error: error.into(),
        })
    }

    pub fn invalid_address(address: impl Into<String>, error: impl Into<String>) -> Self {
        FeeWatchError::Data(DataError::InvalidAddress {
            address: address.into(),
            error: error.into(),
        })
    }

    pub fn storage_error(message: impl Into<String>) -> Self {
        FeeWatchError::Storage(StorageError::Generic {
            message: message.into(),
        })
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        FeeWatchError::Config(ConfigError::Generic {
            message: message.into(),
        })
    }
}
