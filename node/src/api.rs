// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use dfs_namespace::EditRecord;
use serde::{Deserialize, Serialize};

use crate::registry::{NodeId, NodeInfo};

#[derive(Debug, Serialize, Deserialize)]
pub struct MkdirRequest {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateFileRequest {
    pub path: String,
}

/// `success` is false for duplicates and for mutations rejected during
/// shutdown.
#[derive(Debug, Serialize, Deserialize)]
pub struct MutationResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DigestResponse {
    pub txid: u64,
    pub digest: String,
    pub directories: u64,
    pub files: u64,
}

/// Register and heartbeat both identify the node by `(ip, hostname)`.
pub type DataNodeRequest = NodeId;

#[derive(Debug, Serialize, Deserialize)]
pub struct DataNodeResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AllocateRequest {
    pub file_name: String,
    pub size_bytes: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AllocateResponse {
    pub targets: Vec<NodeInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FetchEditsParams {
    pub after_txid: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FetchEditsResponse {
    pub records: Vec<EditRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckpointRequest {
    pub txid: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckpointResponse {
    /// The Primary's checkpoint txid after the update.
    pub checkpoint_txid: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShutdownResponse {
    pub last_txid: u64,
    pub checkpoint_txid: u64,
}
