// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use dfs_namespace::EditRecord;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::*;
use crate::errors::{NodeError, NodeResult};
use crate::registry::{NodeId, NodeInfo};

/// Typed client for the Primary's RPC surface.
#[derive(Debug, Clone)]
pub struct NameNodeClient {
    base_url: String,
    client: Client,
}

impl NameNodeClient {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            base_url: url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn mkdir(&self, path: &str) -> NodeResult<bool> {
        let resp: MutationResponse = self
            .post("/v1/namespace/mkdir", &MkdirRequest { path: path.to_string() })
            .await?;
        Ok(resp.success)
    }

    pub async fn create_file(&self, path: &str) -> NodeResult<bool> {
        let resp: MutationResponse = self
            .post("/v1/namespace/create", &CreateFileRequest { path: path.to_string() })
            .await?;
        Ok(resp.success)
    }

    pub async fn digest(&self) -> NodeResult<DigestResponse> {
        self.get("/v1/namespace/digest").await
    }

    pub async fn register(&self, id: &NodeId) -> NodeResult<bool> {
        let resp: DataNodeResponse = self.post("/v1/datanode/register", id).await?;
        Ok(resp.success)
    }

    /// `Err(NotRegistered)` when the Primary does not know (or evicted) `id`.
    pub async fn heartbeat(&self, id: &NodeId) -> NodeResult<bool> {
        let resp: DataNodeResponse = self.post("/v1/datanode/heartbeat", id).await?;
        Ok(resp.success)
    }

    pub async fn allocate_replica_targets(&self, file_name: &str, size_bytes: u64) -> NodeResult<Vec<NodeInfo>> {
        let req = AllocateRequest {
            file_name: file_name.to_string(),
            size_bytes,
        };
        let resp: AllocateResponse = self.post("/v1/datanode/allocate", &req).await?;
        Ok(resp.targets)
    }

    pub async fn fetch_edits(&self, after_txid: u64) -> NodeResult<Vec<EditRecord>> {
        let resp: FetchEditsResponse = self
            .get(&format!("/v1/replication/edits?after_txid={}", after_txid))
            .await?;
        Ok(resp.records)
    }

    pub async fn update_checkpoint_txid(&self, txid: u64) -> NodeResult<u64> {
        let resp: CheckpointResponse = self.post("/v1/replication/checkpoint", &CheckpointRequest { txid }).await?;
        Ok(resp.checkpoint_txid)
    }

    pub async fn shutdown(&self) -> NodeResult<ShutdownResponse> {
        self.post("/v1/admin/shutdown", &serde_json::json!({})).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> NodeResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| NodeError::Network(e.to_string()))?;
        Self::decode(resp).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> NodeResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| NodeError::Network(e.to_string()))?;
        Self::decode(resp).await
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> NodeResult<T> {
        let status = resp.status();
        if status.is_success() {
            return resp.json().await.map_err(|e| NodeError::Network(e.to_string()));
        }

        let message = resp
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or_else(|| status.to_string());

        Err(match status {
            StatusCode::NOT_FOUND => NodeError::NotRegistered(message),
            StatusCode::BAD_REQUEST => NodeError::InvalidInput(message),
            _ => NodeError::Network(format!("Request failed ({}): {}", status, message)),
        })
    }
}
