// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Edit records: the mutation language of the namespace.
//!
//! Every namespace change is expressed as an `EditOp` tagged with the txid the
//! single writer assigned to it. On disk and on the wire a record is one line
//! of JSON text:
//!
//! ```text
//! {"txid":7,"op":"MKDIR","path":"/usr/warehouse"}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditOp {
    Mkdir { path: String },
    Create { path: String },
}

impl EditOp {
    pub fn mkdir(path: impl Into<String>) -> Self {
        EditOp::Mkdir { path: path.into() }
    }

    pub fn create(path: impl Into<String>) -> Self {
        EditOp::Create { path: path.into() }
    }

    pub fn path(&self) -> &str {
        match self {
            EditOp::Mkdir { path } | EditOp::Create { path } => path,
        }
    }

    pub fn op_name(&self) -> &'static str {
        match self {
            EditOp::Mkdir { .. } => "MKDIR",
            EditOp::Create { .. } => "CREATE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRecord {
    pub txid: u64,
    #[serde(flatten)]
    pub op: EditOp,
}

impl EditRecord {
    pub fn new(txid: u64, op: EditOp) -> Self {
        Self { txid, op }
    }

    /// Encode as a single line of text, without the trailing separator.
    pub fn to_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_line(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }
}
