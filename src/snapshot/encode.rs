// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use serde::Serialize;

use crate::error::Result;
use crate::inode::{INode, INodeKind};

#[derive(Serialize)]
struct ImageRef<'a> {
    txid: u64,
    entries: Vec<EntryRef<'a>>,
}

#[derive(Serialize)]
struct EntryRef<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<usize>,
    name: &'a str,
    kind: INodeKind,
}

/// Encode the tree rooted at `root` as an image covering `txid`.
///
/// Borrows the tree, so callers can encode under a read lock without cloning.
pub fn encode_image(txid: u64, root: &INode) -> Result<Vec<u8>> {
    let mut entries = Vec::new();
    let mut stack: Vec<(&INode, Option<usize>)> = vec![(root, None)];
    while let Some((node, parent)) = stack.pop() {
        let position = entries.len();
        entries.push(EntryRef {
            parent,
            name: node.name(),
            kind: node.kind(),
        });
        // Reversed so the first child is popped next.
        for child in node.children().iter().rev() {
            stack.push((child, Some(position)));
        }
    }
    Ok(serde_json::to_vec(&ImageRef { txid, entries })?)
}
