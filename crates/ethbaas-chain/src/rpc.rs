//! Geth JSON-RPC over HTTP
//!
//! Only the handful of `admin_`, `eth_` and `net_` methods the tooling needs
//! are exposed, through the [`NodeRpc`] trait so clustering and status logic
//! can be tested without a running chain.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::trace;

#[cfg(test)]
use mockall::automock;

use ethbaas_common::{Error, Result};

/// Default timeout for a single RPC call
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON-RPC 2.0 request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version, always "2.0"
    pub jsonrpc: String,
    /// Request id echoed in the response
    pub id: u64,
    /// Method name
    pub method: String,
    /// Positional parameters
    pub params: Vec<Value>,
}

impl JsonRpcRequest {
    /// Create a request
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version
    pub jsonrpc: String,
    /// Id of the request this answers
    pub id: Option<Value>,
    /// Result on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i64,
    /// Error message
    pub message: String,
    /// Additional data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// `admin_nodeInfo` result (fields the tooling reads)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// enode URI (`enode://<id>@<host>:<port>`)
    pub enode: String,
    /// Node id
    #[serde(default)]
    pub id: String,
    /// Client name and version
    #[serde(default)]
    pub name: String,
}

/// Block sync progress reported by `eth_syncing`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncProgress {
    /// Block the node has imported
    pub current_block: u64,
    /// Highest block the node has seen announced
    pub highest_block: u64,
}

/// RPC surface of one chain node
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NodeRpc: Send + Sync {
    /// Where the node is reached (for error context)
    fn endpoint(&self) -> String;

    /// `admin_nodeInfo`
    async fn node_info(&self) -> Result<NodeInfo>;

    /// `admin_addPeer`; whether the node accepted the peer
    async fn add_peer(&self, enode: &str) -> Result<bool>;

    /// `net_version`
    async fn network_id(&self) -> Result<String>;

    /// `eth_blockNumber`
    async fn block_number(&self) -> Result<u64>;

    /// `net_peerCount`
    async fn peer_count(&self) -> Result<u64>;

    /// `eth_syncing`; `None` when the node is not syncing
    async fn sync_progress(&self) -> Result<Option<SyncProgress>>;

    /// Difficulty of block `number`, from `eth_getBlockByNumber`
    async fn block_difficulty(&self, number: u64) -> Result<u128>;
}

/// Opens RPC connections to a project's nodes by external port
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NodeDialer: Send + Sync {
    /// Connect to the node exposed on `port`
    async fn dial(&self, port: u16) -> Result<Box<dyn NodeRpc>>;
}

/// Dials nodes over HTTP at `<rpc_url>:<port>`
#[derive(Clone, Debug)]
pub struct HttpDialer {
    rpc_url: String,
    timeout: Duration,
}

impl HttpDialer {
    /// Create a dialer for nodes reachable at `rpc_url` (e.g. `http://127.0.0.1`)
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_RPC_TIMEOUT,
        }
    }

    /// Override the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Endpoint for a port
    pub fn endpoint(&self, port: u16) -> String {
        format!("{}:{}", self.rpc_url, port)
    }
}

#[async_trait]
impl NodeDialer for HttpDialer {
    async fn dial(&self, port: u16) -> Result<Box<dyn NodeRpc>> {
        Ok(Box::new(HttpNodeRpc::new(self.endpoint(port), self.timeout)?))
    }
}

/// JSON-RPC client for one node
pub struct HttpNodeRpc {
    client: reqwest::Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl HttpNodeRpc {
    /// Create a client for `endpoint`
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            next_id: AtomicU64::new(1),
        })
    }

    /// Call a method and decode its result
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> Result<T> {
        let request = JsonRpcRequest::new(self.next_id.fetch_add(1, Ordering::Relaxed), method, params);
        trace!(endpoint = %self.endpoint, method = %method, id = request.id, "rpc call");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.error(method, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.error(method, format!("HTTP {}", status)));
        }

        let body: JsonRpcResponse = response.json().await.map_err(|e| self.error(method, e))?;
        if let Some(err) = body.error {
            return Err(self.error(method, format!("{} (code {})", err.message, err.code)));
        }
        let result = body
            .result
            .ok_or_else(|| self.error(method, "response has no result"))?;
        serde_json::from_value(result).map_err(|e| self.error(method, e))
    }

    fn error(&self, method: &str, message: impl std::fmt::Display) -> Error {
        Error::rpc(&self.endpoint, format!("{}: {}", method, message))
    }
}

#[async_trait]
impl NodeRpc for HttpNodeRpc {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    async fn node_info(&self) -> Result<NodeInfo> {
        self.call("admin_nodeInfo", Vec::new()).await
    }

    async fn add_peer(&self, enode: &str) -> Result<bool> {
        self.call("admin_addPeer", vec![json!(enode)]).await
    }

    async fn network_id(&self) -> Result<String> {
        self.call("net_version", Vec::new()).await
    }

    async fn block_number(&self) -> Result<u64> {
        let hex: String = self.call("eth_blockNumber", Vec::new()).await?;
        parse_quantity(&hex).map_err(|e| self.error("eth_blockNumber", e))
    }

    async fn peer_count(&self) -> Result<u64> {
        let hex: String = self.call("net_peerCount", Vec::new()).await?;
        parse_quantity(&hex).map_err(|e| self.error("net_peerCount", e))
    }

    async fn sync_progress(&self) -> Result<Option<SyncProgress>> {
        let value: Value = self.call("eth_syncing", Vec::new()).await?;
        parse_sync_progress(&value).map_err(|e| self.error("eth_syncing", e))
    }

    async fn block_difficulty(&self, number: u64) -> Result<u128> {
        const METHOD: &str = "eth_getBlockByNumber";
        let block: Value = self
            .call(METHOD, vec![json!(format!("{:#x}", number)), json!(false)])
            .await?;
        let difficulty = block
            .get("difficulty")
            .and_then(Value::as_str)
            .ok_or_else(|| self.error(METHOD, format!("block {} has no difficulty", number)))?;
        parse_big_quantity(difficulty).map_err(|e| self.error(METHOD, e))
    }
}

/// Parse a hex quantity (`0x1a`)
pub fn parse_quantity(hex: &str) -> std::result::Result<u64, String> {
    let digits = hex
        .strip_prefix("0x")
        .ok_or_else(|| format!("quantity {:?} is not 0x-prefixed", hex))?;
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid quantity {:?}: {}", hex, e))
}

/// Parse a hex quantity that may exceed 64 bits, such as a block difficulty
pub fn parse_big_quantity(hex: &str) -> std::result::Result<u128, String> {
    let digits = hex
        .strip_prefix("0x")
        .ok_or_else(|| format!("quantity {:?} is not 0x-prefixed", hex))?;
    u128::from_str_radix(digits, 16).map_err(|e| format!("invalid quantity {:?}: {}", hex, e))
}

fn parse_sync_progress(value: &Value) -> std::result::Result<Option<SyncProgress>, String> {
    match value {
        Value::Bool(false) => Ok(None),
        Value::Object(fields) => {
            let block = |key: &str| {
                fields
                    .get(key)
                    .and_then(Value::as_str)
                    .ok_or_else(|| format!("missing {}", key))
                    .and_then(parse_quantity)
            };
            Ok(Some(SyncProgress {
                current_block: block("currentBlock")?,
                highest_block: block("highestBlock")?,
            }))
        }
        other => Err(format!("unexpected eth_syncing result {}", other)),
    }
}
