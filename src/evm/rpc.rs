use alloy_primitives::{Address, Bytes, B256};
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed RPC response: {0}")]
    Decode(String),
}

impl RpcError {
    /// Whether this failure looks like a flaky public endpoint rather than a
    /// malformed call. Only transient failures are worth a provider rotation.
    pub fn is_transient(&self) -> bool {
        lazy_static! {
            static ref TRANSIENT_RE: Regex = Regex::new(
                r"(?i)timeout|timed out|rate.?limit|too many requests|429|busy|temporarily|connect|network|unreachable|reset|fetch"
            )
            .unwrap();
        }

        match self {
            // reqwest failures are connectivity problems by definition
            RpcError::Transport(_) => true,
            RpcError::Rpc { code, message } => {
                // -32005 is the conventional "limit exceeded" code
                *code == -32005 || TRANSIENT_RE.is_match(message)
            }
            RpcError::Decode(_) => false,
        }
    }
}

/// Transaction receipt, reduced to the fields the client reads
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_hash: B256,
    pub status: Option<String>,
    pub block_number: Option<String>,
}

impl TxReceipt {
    pub fn succeeded(&self) -> bool {
        matches!(self.status.as_deref(), Some("0x1"))
    }
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    result: Option<Value>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// A single JSON-RPC endpoint handle
pub struct RpcClient {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            http: reqwest::Client::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send a raw JSON-RPC request and decode the `result` field
    pub async fn request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<R, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let envelope: RpcEnvelope = response
            .json()
            .await
            .map_err(|e| RpcError::Decode(e.to_string()))?;

        if let Some(err) = envelope.error {
            return Err(RpcError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        // Some wallet verbs (wallet_switchEthereumChain) return a null result
        let result = envelope.result.unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(|e| RpcError::Decode(e.to_string()))
    }

    /// `eth_call` against the latest block
    pub async fn eth_call(&self, to: Address, data: &Bytes) -> Result<Bytes, RpcError> {
        self.request("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await
    }

    pub async fn chain_id(&self) -> Result<u64, RpcError> {
        let hex: String = self.request("eth_chainId", json!([])).await?;
        parse_hex_u64(&hex)
    }

    /// `eth_getTransactionReceipt`; `None` while the transaction is pending
    pub async fn transaction_receipt(&self, hash: B256) -> Result<Option<TxReceipt>, RpcError> {
        self.request("eth_getTransactionReceipt", json!([hash])).await
    }
}

/// Parse a "0x"-prefixed quantity into a u64
pub fn parse_hex_u64(s: &str) -> Result<u64, RpcError> {
    let stripped = s.trim().trim_start_matches("0x");
    u64::from_str_radix(stripped, 16)
        .map_err(|_| RpcError::Decode(format!("bad hex quantity: {}", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_transient_failures() {
        let rate_limited = RpcError::Rpc {
            code: -32000,
            message: "rate limit exceeded".to_string(),
        };
        assert!(rate_limited.is_transient());

        let limit_code = RpcError::Rpc {
            code: -32005,
            message: "limit exceeded".to_string(),
        };
        assert!(limit_code.is_transient());

        let revert = RpcError::Rpc {
            code: 3,
            message: "execution reverted".to_string(),
        };
        assert!(!revert.is_transient());

        assert!(!RpcError::Decode("bad json".to_string()).is_transient());
        assert!(RpcError::Transport("connection refused".to_string()).is_transient());
    }

    #[test]
    fn parses_hex_quantities() {
        assert_eq!(parse_hex_u64("0xaa36a7").unwrap(), 11155111);
        assert_eq!(parse_hex_u64("0x1").unwrap(), 1);
        assert!(parse_hex_u64("nope").is_err());
    }
}
