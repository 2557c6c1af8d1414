//! Beacon API HTTP Client
//!
//! Implements [`DataSource`] over the standard Beacon node REST API.

use crate::hash::{parse_hex32, to_hex, Node};
use crate::source::{BlockId, DataSource, HeaderInfo};
use crate::types::{BeaconBlockHeader, BeaconState, STATE_FORK};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from beacon API operations
#[derive(Debug, Error)]
pub enum BeaconClientError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("SSZ decoding failed: {0}")]
    Ssz(String),

    #[error("State is from fork {0:?}, only {STATE_FORK} states can be decoded")]
    UnsupportedFork(String),
}

/// Response header naming the fork of a versioned Beacon API payload
const CONSENSUS_VERSION_HEADER: &str = "Eth-Consensus-Version";

/// Client for interacting with the Beacon API
#[derive(Debug, Clone)]
pub struct BeaconClient {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct DataResponse<T> {
    data: T,
}

#[derive(Deserialize)]
struct HeaderData {
    root: String,
    #[serde(default)]
    canonical: bool,
    header: SignedHeader,
}

#[derive(Deserialize)]
struct SignedHeader {
    message: BeaconBlockHeaderJson,
}

#[derive(Deserialize)]
struct BeaconBlockHeaderJson {
    slot: String,
    proposer_index: String,
    parent_root: String,
    state_root: String,
    body_root: String,
}

#[derive(Deserialize)]
struct GenesisData {
    genesis_time: String,
}

impl HeaderData {
    fn into_info(self) -> Result<HeaderInfo, BeaconClientError> {
        let msg = self.header.message;
        Ok(HeaderInfo {
            root: hex32(&self.root)?,
            canonical: self.canonical,
            header: BeaconBlockHeader {
                slot: parse_u64("slot", &msg.slot)?,
                proposer_index: parse_u64("proposer_index", &msg.proposer_index)?,
                parent_root: hex32(&msg.parent_root)?,
                state_root: hex32(&msg.state_root)?,
                body_root: hex32(&msg.body_root)?,
            },
        })
    }
}

impl BeaconClient {
    /// Create a new beacon client
    ///
    /// # Arguments
    /// * `base_url` - Base URL of the beacon node (e.g., `http://localhost:5052`)
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create a client whose requests give up after `timeout`.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BeaconClientError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        what: impl FnOnce() -> String,
    ) -> Result<T, BeaconClientError> {
        let url = format!("{}{path}", self.base_url);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(BeaconClientError::NotFound(what()));
        }
        if !response.status().is_success() {
            return Err(BeaconClientError::InvalidResponse(format!(
                "Unexpected status {} from {path}",
                response.status()
            )));
        }

        let body: DataResponse<T> = response.json().await?;
        Ok(body.data)
    }

    /// Fetch beacon state as SSZ bytes
    ///
    /// # Arguments
    /// * `state_id` - State identifier (slot number, state root, "head", "finalized", etc.)
    ///
    /// # Errors
    /// Returns error if the request fails, the state is not found, or the
    /// node reports a fork other than the one [`BeaconState`] describes.
    /// A response without a version header is passed through.
    #[instrument(skip(self), fields(state_id = %state_id))]
    pub async fn get_state_ssz(&self, state_id: &BlockId) -> Result<Vec<u8>, BeaconClientError> {
        let url = format!("{}/eth/v2/debug/beacon/states/{state_id}", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/octet-stream")
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(BeaconClientError::NotFound(format!("State {state_id}")));
        }

        if !response.status().is_success() {
            return Err(BeaconClientError::InvalidResponse(format!(
                "Unexpected status: {}",
                response.status()
            )));
        }

        if let Some(version) = response.headers().get(CONSENSUS_VERSION_HEADER) {
            let version = version.to_str().unwrap_or_default().trim();
            if !version.eq_ignore_ascii_case(STATE_FORK) {
                return Err(BeaconClientError::UnsupportedFork(version.to_string()));
            }
        }

        let bytes = response.bytes().await?.to_vec();
        debug!(bytes = bytes.len(), "fetched state");
        Ok(bytes)
    }

    /// Fetch beacon block header
    ///
    /// # Errors
    /// Returns error if the request fails or header is not found
    #[instrument(skip(self), fields(block_id = %block_id))]
    pub async fn get_header(&self, block_id: &BlockId) -> Result<HeaderInfo, BeaconClientError> {
        let data: HeaderData = self
            .get_json(&format!("/eth/v1/beacon/headers/{block_id}"), || {
                format!("Block {block_id}")
            })
            .await?;
        data.into_info()
    }

    /// Fetch the headers of all blocks whose parent is `parent_root`
    ///
    /// # Errors
    /// Returns error if the request fails
    #[instrument(skip(self), fields(parent_root = %to_hex(parent_root)))]
    pub async fn get_headers_by_parent(
        &self,
        parent_root: &Node,
    ) -> Result<Vec<HeaderInfo>, BeaconClientError> {
        let path = format!("/eth/v1/beacon/headers?parent_root={}", to_hex(parent_root));
        let data: Vec<HeaderData> = match self.get_json(&path, String::new).await {
            Ok(data) => data,
            // Some nodes answer 404 rather than an empty list
            Err(BeaconClientError::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        data.into_iter().map(HeaderData::into_info).collect()
    }

    /// Fetch genesis time
    ///
    /// # Errors
    /// Returns error if the request fails
    pub async fn get_genesis_time(&self) -> Result<u64, BeaconClientError> {
        let data: GenesisData = self
            .get_json("/eth/v1/beacon/genesis", || "Genesis".to_string())
            .await?;
        parse_u64("genesis_time", &data.genesis_time)
    }

    /// Fetch `SECONDS_PER_SLOT` from the node's chain spec
    ///
    /// # Errors
    /// Returns error if the request fails or the value is missing
    pub async fn get_seconds_per_slot(&self) -> Result<u64, BeaconClientError> {
        let spec: HashMap<String, serde_json::Value> = self
            .get_json("/eth/v1/config/spec", || "Chain spec".to_string())
            .await?;
        match spec.get("SECONDS_PER_SLOT") {
            Some(serde_json::Value::String(s)) => parse_u64("SECONDS_PER_SLOT", s),
            Some(serde_json::Value::Number(n)) => n.as_u64().ok_or_else(|| {
                BeaconClientError::InvalidResponse(format!("Invalid SECONDS_PER_SLOT: {n}"))
            }),
            _ => Err(BeaconClientError::InvalidResponse(
                "SECONDS_PER_SLOT missing from chain spec".to_string(),
            )),
        }
    }

    /// Get current head slot
    ///
    /// # Errors
    /// Returns error if the request fails
    pub async fn get_head_slot(&self) -> Result<u64, BeaconClientError> {
        let header = self.get_header(&BlockId::Head).await?;
        Ok(header.header.slot)
    }
}

impl DataSource for BeaconClient {
    type Error = BeaconClientError;

    async fn block_header(&self, block_id: &BlockId) -> Result<HeaderInfo, Self::Error> {
        self.get_header(block_id).await
    }

    async fn state(&self, state_id: &BlockId) -> Result<BeaconState, Self::Error> {
        let bytes = self.get_state_ssz(state_id).await?;
        ssz_rs::deserialize(&bytes).map_err(|e| BeaconClientError::Ssz(format!("{e:?}")))
    }

    async fn headers_by_parent(&self, parent_root: &Node) -> Result<Vec<HeaderInfo>, Self::Error> {
        self.get_headers_by_parent(parent_root).await
    }

    async fn genesis_time(&self) -> Result<u64, Self::Error> {
        self.get_genesis_time().await
    }

    async fn seconds_per_slot(&self) -> Result<u64, Self::Error> {
        self.get_seconds_per_slot().await
    }
}

fn hex32(s: &str) -> Result<[u8; 32], BeaconClientError> {
    parse_hex32(s).map_err(BeaconClientError::InvalidResponse)
}

fn parse_u64(field: &str, s: &str) -> Result<u64, BeaconClientError> {
    s.parse()
        .map_err(|e| BeaconClientError::InvalidResponse(format!("Invalid {field}: {e}")))
}
