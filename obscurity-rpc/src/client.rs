//! JSON-RPC client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use obscurity_core::error::{ObscurityError, Result};
use obscurity_core::traits::NodeRpc;
use obscurity_core::types::NodeStatus;

use crate::config::RpcConfig;

/// Node client speaking JSON-RPC 1.0 over HTTP with basic auth.
pub struct RpcClient {
    config: RpcConfig,
    http_client: reqwest::Client,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Creates a client for `config`.
    pub fn new(config: RpcConfig) -> Result<Self> {
        if config.timeout_seconds == 0 {
            return Err(ObscurityError::ConfigError("RPC timeout must be positive".into()));
        }
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ObscurityError::ConfigError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
            next_id: AtomicU64::new(1),
        })
    }

    /// Client configuration.
    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Checks the node is reachable and the credentials are accepted.
    #[instrument(skip(self), fields(url = %self.config.url))]
    pub async fn test_connection(&self) -> Result<NodeStatus> {
        let started = Instant::now();
        let info = self.blockchain_info().await?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let status = NodeStatus {
            chain: info
                .get("chain")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            blocks: info.get("blocks").and_then(Value::as_u64).ok_or_else(|| {
                ObscurityError::InvalidChainData("getblockchaininfo has no block count".into())
            })?,
            latency_ms,
        };

        info!(chain = %status.chain, blocks = status.blocks, latency_ms, "Node reachable");
        Ok(status)
    }

    fn map_send_error(&self, e: reqwest::Error) -> ObscurityError {
        if e.is_timeout() {
            ObscurityError::ConnectionTimeout(format!(
                "{} after {}s",
                self.config.url, self.config.timeout_seconds
            ))
        } else {
            ObscurityError::HttpError(e.to_string())
        }
    }
}

#[async_trait]
impl NodeRpc for RpcClient {
    #[instrument(skip(self, params))]
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "1.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut builder = self.http_client.post(&self.config.url).json(&request);
        if let Some(user) = &self.config.user {
            builder = builder.basic_auth(user, self.config.password.as_deref());
        }

        let response = builder.send().await.map_err(|e| self.map_send_error(e))?;
        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            warn!(%status, "Node rejected credentials");
            return Err(ObscurityError::RpcAuthFailed);
        }

        // Nodes report RPC errors with a 4xx/5xx status and a JSON body
        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(ObscurityError::HttpError(format!("node answered {}", status)))
            }
            Err(e) => return Err(self.map_send_error(e)),
        };

        if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            debug!(code, %message, "RPC error");
            return Err(ObscurityError::Rpc { code, message });
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| ObscurityError::InvalidChainData(format!("{} returned no result", method)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ok(result: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "result": result, "error": null, "id": 1 }))
    }

    async fn client(server: &MockServer) -> RpcClient {
        RpcClient::new(RpcConfig::new(server.uri()).with_auth("user", "pass")).unwrap()
    }

    #[tokio::test]
    async fn test_call_sends_auth_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Basic dXNlcjpwYXNz"))
            .and(body_partial_json(json!({ "jsonrpc": "1.0", "method": "getbestblockhash" })))
            .respond_with(ok(json!("00aa")))
            .expect(1)
            .mount(&server)
            .await;

        let rpc = client(&server).await;
        assert_eq!(rpc.best_block_hash().await.unwrap(), "00aa");
    }

    #[tokio::test]
    async fn test_raw_transaction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "getrawtransaction", "params": ["ab12", true] })))
            .respond_with(ok(json!({
                "txid": "ab12",
                "vout": [
                    { "n": 0, "scriptPubKey": { "hex": "0014aa" } },
                    { "n": 1, "scriptPubKey": { "hex": "21ffac" } }
                ]
            })))
            .mount(&server)
            .await;

        let tx = client(&server).await.raw_transaction("ab12").await.unwrap();
        assert_eq!(tx.txid, "ab12");
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[1].script_hex, "21ffac");
    }

    #[tokio::test]
    async fn test_rpc_error_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "result": null,
                "error": { "code": -5, "message": "No such mempool or blockchain transaction" },
                "id": 1
            })))
            .mount(&server)
            .await;

        let err = client(&server).await.raw_transaction("00").await.unwrap_err();
        assert!(matches!(err, ObscurityError::Rpc { code: -5, .. }));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client(&server).await.best_block_hash().await.unwrap_err();
        assert!(matches!(err, ObscurityError::RpcAuthFailed));
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn test_non_json_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
            .mount(&server)
            .await;

        let err = client(&server).await.best_block_hash().await.unwrap_err();
        assert!(matches!(err, ObscurityError::HttpError(_)));
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ok(json!("late")).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let rpc = RpcClient::new(RpcConfig::new(server.uri()).with_timeout(1)).unwrap();
        let err = rpc.best_block_hash().await.unwrap_err();
        assert!(matches!(err, ObscurityError::ConnectionTimeout(_)));
    }

    #[tokio::test]
    async fn test_connection_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": "getblockchaininfo" })))
            .respond_with(ok(json!({ "chain": "regtest", "blocks": 101 })))
            .mount(&server)
            .await;

        let status = client(&server).await.test_connection().await.unwrap();
        assert_eq!(status.chain, "regtest");
        assert_eq!(status.blocks, 101);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(RpcClient::new(RpcConfig::default().with_timeout(0)).is_err());
    }
}
