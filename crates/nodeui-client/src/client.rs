//! Node telemetry source over the node's REST API.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use nodeui_core::{NetworkInfo, NodeStatusSnapshot, PRIMARY_ASSET, Round};
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;

use crate::config::{NodeEndpoint, catchpoint_url, escape_catchpoint};
use crate::error::ClientError;

const TOKEN_HEADER: &str = "X-Algo-API-Token";

/// Everything the dashboard reads from or asks of a node.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn status(&self) -> Result<NodeStatusSnapshot, ClientError>;

    /// Long-poll until a round later than `round` exists. The node answers
    /// with its current status when its own wait expires first; a request that
    /// outlives the client-side limit fails with [`ClientError::Timeout`].
    async fn status_after_round(&self, round: Round) -> Result<NodeStatusSnapshot, ClientError>;

    async fn versions(&self) -> Result<NetworkInfo, ClientError>;

    /// Balances keyed by asset id, the primary asset under 0.
    async fn account_info(&self, address: &str) -> Result<BTreeMap<u64, u64>, ClientError>;

    /// Undecoded block bytes in the given wire format.
    async fn block_raw(&self, round: Round, format: &str) -> Result<Vec<u8>, ClientError>;

    /// Latest published catchpoint label for a network.
    async fn latest_catchpoint(&self, network: &str) -> Result<String, ClientError>;

    async fn start_catchup(&self, catchpoint: &str) -> Result<String, ClientError>;

    async fn stop_catchup(&self, catchpoint: &str) -> Result<String, ClientError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct StatusResponse {
    last_round: u64,
    #[serde(default)]
    time_since_last_round: u64,
    #[serde(default)]
    catchup_time: u64,
    #[serde(default)]
    last_version: String,
    #[serde(default)]
    next_version: String,
    #[serde(default)]
    next_version_round: u64,
    #[serde(default)]
    next_version_supported: bool,
    #[serde(default)]
    catchpoint: Option<String>,
    #[serde(default)]
    catchpoint_total_accounts: u64,
    #[serde(default)]
    catchpoint_processed_accounts: u64,
    #[serde(default)]
    catchpoint_verified_accounts: u64,
    #[serde(default)]
    catchpoint_total_blocks: u64,
    #[serde(default)]
    catchpoint_acquired_blocks: u64,
}

impl From<StatusResponse> for NodeStatusSnapshot {
    fn from(r: StatusResponse) -> Self {
        NodeStatusSnapshot {
            last_round: r.last_round,
            time_since_last_round: Duration::from_nanos(r.time_since_last_round),
            catchup_time: Duration::from_nanos(r.catchup_time),
            last_version: r.last_version,
            next_version: r.next_version,
            next_version_round: r.next_version_round,
            next_version_supported: r.next_version_supported,
            catchpoint: r.catchpoint.unwrap_or_default(),
            catchpoint_total_accounts: r.catchpoint_total_accounts,
            catchpoint_processed_accounts: r.catchpoint_processed_accounts,
            catchpoint_verified_accounts: r.catchpoint_verified_accounts,
            catchpoint_total_blocks: r.catchpoint_total_blocks,
            catchpoint_acquired_blocks: r.catchpoint_acquired_blocks,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BuildVersion {
    major: u64,
    minor: u64,
    build_number: u64,
    commit_hash: String,
    channel: String,
}

#[derive(Debug, Deserialize)]
struct VersionsResponse {
    #[serde(default)]
    build: BuildVersion,
    genesis_id: String,
    genesis_hash_b64: String,
}

impl TryFrom<VersionsResponse> for NetworkInfo {
    type Error = ClientError;

    fn try_from(r: VersionsResponse) -> Result<Self, Self::Error> {
        let bytes = STANDARD
            .decode(r.genesis_hash_b64.as_bytes())
            .map_err(|e| ClientError::InvalidData(format!("genesis hash: {}", e)))?;
        let genesis_hash: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            ClientError::InvalidData(format!(
                "unexpected genesis hash, wrong number of bytes: {}",
                bytes.len()
            ))
        })?;
        let b = r.build;
        Ok(NetworkInfo {
            genesis_id: r.genesis_id,
            genesis_hash,
            node_version: format!(
                "{} {}.{}.{} ({})",
                b.channel, b.major, b.minor, b.build_number, b.commit_hash
            ),
        })
    }
}

#[derive(Debug, Deserialize)]
struct AssetHolding {
    amount: u64,
    #[serde(rename = "asset-id")]
    asset_id: u64,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    amount: u64,
    #[serde(default)]
    assets: Vec<AssetHolding>,
}

impl From<AccountResponse> for BTreeMap<u64, u64> {
    fn from(r: AccountResponse) -> Self {
        let mut balances: BTreeMap<u64, u64> = r
            .assets
            .into_iter()
            .map(|h| (h.asset_id, h.amount))
            .collect();
        balances.insert(PRIMARY_ASSET, r.amount);
        balances
    }
}

/// REST client for one node.
#[derive(Debug, Clone)]
pub struct AlgodClient {
    http: reqwest::Client,
    endpoint: NodeEndpoint,
    long_poll_timeout: Duration,
}

impl AlgodClient {
    pub fn new(endpoint: NodeEndpoint, long_poll_timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            endpoint,
            long_poll_timeout,
        })
    }

    pub fn endpoint(&self) -> &NodeEndpoint {
        &self.endpoint
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.endpoint.url, path))
            .header(TOKEN_HEADER, &self.endpoint.token)
    }

    /// Send and map non-success statuses to [`ClientError::Status`].
    async fn send(request: RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let response = request.send().await.map_err(ClientError::transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Status {
            code: status.as_u16(),
            body: body.trim().to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        timeout: Option<Duration>,
    ) -> Result<T, ClientError> {
        let mut request = self.request(Method::GET, path);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let bytes = Self::send(request)
            .await?
            .bytes()
            .await
            .map_err(ClientError::transport)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn catchup(&self, method: Method, catchpoint: &str) -> Result<String, ClientError> {
        let admin = self.endpoint.require_admin_token()?;
        let path = format!("/v2/catchup/{}", escape_catchpoint(catchpoint));
        let request = self
            .http
            .request(method, format!("{}{}", self.endpoint.url, path))
            .header(TOKEN_HEADER, admin)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        let body = Self::send(request).await?.text().await?;
        Ok(body.trim().to_string())
    }
}

#[async_trait]
impl TelemetrySource for AlgodClient {
    async fn status(&self) -> Result<NodeStatusSnapshot, ClientError> {
        let status: StatusResponse = self.get_json("/v2/status", None).await?;
        Ok(status.into())
    }

    async fn status_after_round(&self, round: Round) -> Result<NodeStatusSnapshot, ClientError> {
        let path = format!("/v2/status/wait-for-block-after/{}", round);
        let status: StatusResponse = self
            .get_json(&path, Some(self.long_poll_timeout))
            .await?;
        Ok(status.into())
    }

    async fn versions(&self) -> Result<NetworkInfo, ClientError> {
        let versions: VersionsResponse = self.get_json("/versions", None).await?;
        versions.try_into()
    }

    async fn account_info(&self, address: &str) -> Result<BTreeMap<u64, u64>, ClientError> {
        let path = format!("/v2/accounts/{}", address);
        let account: AccountResponse = self.get_json(&path, None).await?;
        Ok(account.into())
    }

    async fn block_raw(&self, round: Round, format: &str) -> Result<Vec<u8>, ClientError> {
        let path = format!("/v2/blocks/{}?format={}", round, format);
        let bytes = Self::send(self.request(Method::GET, &path)).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn latest_catchpoint(&self, network: &str) -> Result<String, ClientError> {
        let url = catchpoint_url(network);
        tracing::debug!("Fetching latest catchpoint from {}", url);
        let label = Self::send(self.http.get(&url)).await?.text().await?;
        let label = label.trim();
        if label.is_empty() {
            return Err(ClientError::InvalidData(format!(
                "no catchpoint published for {}",
                network
            )));
        }
        Ok(label.to_string())
    }

    async fn start_catchup(&self, catchpoint: &str) -> Result<String, ClientError> {
        self.catchup(Method::POST, catchpoint).await
    }

    async fn stop_catchup(&self, catchpoint: &str) -> Result<String, ClientError> {
        self.catchup(Method::DELETE, catchpoint).await
    }
}
