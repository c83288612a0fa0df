// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NamespaceError {
    /// A path component that must be a directory resolves to a file.
    #[error("not a directory: {0}")]
    NotADirectory(String),
    /// Image or edit record text could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),
}

pub type Result<T> = core::result::Result<T, NamespaceError>;

impl From<serde_json::Error> for NamespaceError {
    fn from(e: serde_json::Error) -> Self {
        NamespaceError::Codec(e.to_string())
    }
}
