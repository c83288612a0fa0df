// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! BLAKE3 namespace digest.
//!
//! Same tree => same digest. Used to confirm that a Backup has converged on
//! the Primary's namespace.
//!
//! # Hash Input Structure
//! ```text
//! Pre-order walk, children in insertion order. For each node:
//!   kind (u8: 0 = directory, 1 = file)
//!   name length (u64 LE)
//!   name bytes (UTF-8)
//!   child count (u64 LE)
//! ```

use crate::inode::{INode, INodeKind};

pub fn hash_namespace(root: &INode) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    feed(&mut hasher, root);
    *hasher.finalize().as_bytes()
}

/// Hex form of [`hash_namespace`].
pub fn namespace_digest_hex(root: &INode) -> String {
    blake3::Hash::from(hash_namespace(root)).to_hex().to_string()
}

fn feed(hasher: &mut blake3::Hasher, root: &INode) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let kind: u8 = match node.kind() {
            INodeKind::Directory => 0,
            INodeKind::File => 1,
        };
        hasher.update(&[kind]);
        hasher.update(&(node.name().len() as u64).to_le_bytes());
        hasher.update(node.name().as_bytes());
        hasher.update(&(node.children().len() as u64).to_le_bytes());
        stack.extend(node.children().iter().rev());
    }
}
