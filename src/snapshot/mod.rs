// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Namespace images.
//!
//! An image is the checkpoint unit: the whole tree as JSON text plus the
//! highest txid it incorporates. Nodes are listed flat in pre-order, each
//! naming its parent's position, so tree depth never becomes nesting depth.
//!
//! ```text
//! {"txid":42,"entries":[
//!   {"name":"/","kind":"directory"},
//!   {"parent":0,"name":"usr","kind":"directory"},
//!   {"parent":1,"name":"part-0000","kind":"file"}]}
//! ```

pub mod encode;
pub mod decode;
pub mod blake3;

use crate::directory::FsDirectory;
use crate::inode::INode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceImage {
    pub txid: u64,
    pub root: INode,
}

impl NamespaceImage {
    pub fn into_directory(self) -> crate::error::Result<(u64, FsDirectory)> {
        let directory = FsDirectory::from_root(self.root)?;
        Ok((self.txid, directory))
    }
}
