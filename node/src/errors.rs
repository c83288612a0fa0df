// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dfs_namespace::NamespaceError;
use serde_json::json;
use thiserror::Error;

use crate::wal_writer::WalError;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Namespace error: {0}")]
    Namespace(#[from] NamespaceError),
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Node not registered: {0}")]
    NotRegistered(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type NodeResult<T> = Result<T, NodeError>;

impl NodeError {
    /// Errors worth retrying on the next loop iteration. Everything else is a
    /// logical failure that retrying will not fix.
    pub fn is_transient(&self) -> bool {
        match self {
            NodeError::Io(_) | NodeError::Network(_) => true,
            NodeError::Wal(WalError::Io(_)) => true,
            _ => false,
        }
    }
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let status = match &self {
            NodeError::Namespace(NamespaceError::NotADirectory(_)) => StatusCode::CONFLICT,
            NodeError::Namespace(NamespaceError::Codec(_)) => StatusCode::BAD_REQUEST,
            NodeError::NotRegistered(_) => StatusCode::NOT_FOUND,
            NodeError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            NodeError::Network(_) => StatusCode::BAD_GATEWAY,
            NodeError::Wal(_) | NodeError::Io(_) | NodeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
