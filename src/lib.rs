// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! dfs-namespace: the in-memory namespace kernel of the metadata service.
//!
//! Holds the directory tree, the edit record language that mutates it and the
//! image codec used for checkpoints. Nothing in this crate performs I/O; the
//! node crate owns durability, replication and locking.

pub mod error;
pub mod path;
pub mod inode;
pub mod directory;
pub mod edit;
pub mod snapshot;

pub use directory::{FsDirectory, NamespaceStats};
pub use edit::{EditOp, EditRecord};
pub use error::{NamespaceError, Result};
pub use inode::{INode, INodeKind};
pub use snapshot::NamespaceImage;
