/// HTTP implementation of `ChainDataSource`
///
/// JSON-RPC against the configured node for signatures and balances, and the
/// enhanced-transaction REST API for parsed transaction bodies and token
/// metadata.
use super::retry::{with_retry, RetryPolicy};
use super::{ChainDataSource, SignatureInfo, TokenMetadata};
use crate::classifier::ParsedTransaction;
use crate::errors::{FeeWatchError, RpcError};
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// Per-request timeout; every upstream call is a suspension point
const REQUEST_TIMEOUT_SECS: u64 = 20;

pub struct HttpDataSource {
    client: reqwest::Client,
    rpc_url: String,
    api_url: String,
    api_key: String,
    rpc_retry: RetryPolicy,
    rest_retry: RetryPolicy,
}

impl HttpDataSource {
    pub fn new(rpc_url: &str, api_url: &str, api_key: &str) -> Result<Self, FeeWatchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(FeeWatchError::from)?;

        Ok(Self {
            client,
            rpc_url: rpc_url.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            rpc_retry: RetryPolicy::rpc(),
            rest_retry: RetryPolicy::rest(),
        })
    }

    /// Override the default retry tuning
    pub fn with_retry_policies(mut self, rpc: RetryPolicy, rest: RetryPolicy) -> Self {
        self.rpc_retry = rpc;
        self.rest_retry = rest;
        self
    }

    /// Map an HTTP status into the retryable/permanent error split
    fn status_error(endpoint: &str, status: u16, body: String) -> FeeWatchError {
        if status == 429 {
            FeeWatchError::Rpc(RpcError::RateLimitExceeded {
                endpoint: endpoint.to_string(),
            })
        } else if status >= 500 {
            FeeWatchError::Rpc(RpcError::ServerError {
                endpoint: endpoint.to_string(),
                status,
            })
        } else {
            FeeWatchError::Rpc(RpcError::ClientError {
                endpoint: endpoint.to_string(),
                status,
                body,
            })
        }
    }

    /// One JSON-RPC call; returns the `result` field
    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, FeeWatchError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(&self.rpc_url, status, body));
        }

        let body: Value = response.json().await?;
        if let Some(error) = body.get("error") {
            return Err(FeeWatchError::rpc_error(format!(
                "{} returned error: {}",
                method, error
            )));
        }

        body.get("result").cloned().ok_or_else(|| {
            FeeWatchError::Rpc(RpcError::MalformedResponse {
                endpoint: self.rpc_url.clone(),
                detail: format!("{} response missing result", method),
            })
        })
    }

    /// One REST call against the enhanced API
    async fn rest_post(&self, path: &str, payload: Value) -> Result<Value, FeeWatchError> {
        let url = format!("{}{}?api-key={}", self.api_url, path, self.api_key);

        let response = self.client.post(&url).json(&payload).send().await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(&self.api_url, status, body));
        }

        response.json().await.map_err(FeeWatchError::from)
    }
}

#[async_trait]
impl ChainDataSource for HttpDataSource {
    async fn recent_signatures(
        &self,
        address: &str,
        limit: usize,
        before: Option<&str>,
        until: Option<&str>,
    ) -> Result<Vec<SignatureInfo>, FeeWatchError> {
        let mut options = json!({
            "limit": limit,
            "commitment": "confirmed",
        });
        if let Some(before) = before {
            options["before"] = json!(before);
        }
        if let Some(until) = until {
            options["until"] = json!(until);
        }

        let result = with_retry(&self.rpc_retry, "getSignaturesForAddress", || {
            self.rpc_call("getSignaturesForAddress", json!([address, options]))
        })
        .await?;

        let signatures: Vec<SignatureInfo> = serde_json::from_value(result)?;
        logger::debug(
            LogTag::Rpc,
            "SIGNATURES",
            &format!("Fetched {} signatures for {}", signatures.len(), address),
        );
        Ok(signatures)
    }

    async fn transactions(
        &self,
        signatures: &[String],
    ) -> Result<Vec<ParsedTransaction>, FeeWatchError> {
        if signatures.is_empty() {
            return Ok(Vec::new());
        }

        let payload = json!({ "transactions": signatures });
        let result = with_retry(&self.rest_retry, "parsed transactions", || {
            self.rest_post("/v0/transactions", payload.clone())
        })
        .await?;

        let transactions: Vec<ParsedTransaction> = serde_json::from_value(result)?;
        logger::debug(
            LogTag::Rpc,
            "BODIES",
            &format!(
                "Fetched {} parsed bodies for {} signatures",
                transactions.len(),
                signatures.len()
            ),
        );
        Ok(transactions)
    }

    async fn token_metadata(&self, mint: &str) -> Result<TokenMetadata, FeeWatchError> {
        let payload = json!({ "mintAccounts": [mint] });
        let result = with_retry(&self.rest_retry, "token metadata", || {
            self.rest_post("/v0/tokens/metadata", payload.clone())
        })
        .await?;

        // Response shape varies across providers; pull fields defensively
        let entry = result.get(0).cloned().unwrap_or(Value::Null);
        let read = |keys: &[&str]| -> Option<String> {
            keys.iter().find_map(|k| {
                entry
                    .get(k)
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
            })
        };

        Ok(TokenMetadata {
            name: read(&["name", "onChainName"]),
            symbol: read(&["symbol", "onChainSymbol"]),
            creator_authority: read(&["updateAuthority", "authority"]),
        })
    }

    async fn balance(&self, address: &str) -> Result<u64, FeeWatchError> {
        let result = with_retry(&self.rpc_retry, "getBalance", || {
            self.rpc_call("getBalance", json!([address, {"commitment": "confirmed"}]))
        })
        .await?;

        result
            .get("value")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| {
                FeeWatchError::Rpc(RpcError::MalformedResponse {
                    endpoint: self.rpc_url.clone(),
                    detail: "getBalance response missing value".to_string(),
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_signature_list_deserialization() {
        let raw = json!([
            {"signature": "sig-a", "slot": 100, "blockTime": 1_700_000_000},
            {"signature": "sig-b", "slot": 99, "blockTime": null}
        ]);
        let parsed: Vec<SignatureInfo> = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].signature, "sig-a");
        assert_eq!(parsed[0].block_time, Some(1_700_000_000));
        assert!(parsed[1].block_time.is_none());
    }

    #[test]
    fn test_status_mapping() {
        assert!(HttpDataSource::status_error("rpc", 429, String::new()).is_retryable());
        assert!(HttpDataSource::status_error("rpc", 503, String::new()).is_retryable());
        assert!(!HttpDataSource::status_error("rpc", 404, String::new()).is_retryable());
    }

    #[test]
    fn test_parsed_transaction_deserialization_tolerates_missing_fields() {
        let raw = json!([{
            "signature": "sig-x",
            "slot": 5,
            "nativeTransfers": [
                {"fromUserAccount": "A", "toUserAccount": "B", "amount": 123}
            ]
        }]);
        let parsed: Vec<ParsedTransaction> = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed[0].signature, "sig-x");
        assert_eq!(parsed[0].native_transfers.len(), 1);
        assert!(parsed[0].timestamp.is_none());
        assert!(parsed[0].events.is_none());
    }
}
