// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use serde::Deserialize;

use crate::error::{NamespaceError, Result};
use crate::inode::{INode, INodeKind, ROOT_NAME};
use crate::snapshot::NamespaceImage;

#[derive(Deserialize)]
struct ImageOwned {
    txid: u64,
    entries: Vec<Entry>,
}

#[derive(Deserialize)]
struct Entry {
    #[serde(default)]
    parent: Option<usize>,
    name: String,
    kind: INodeKind,
}

/// Decode and validate an image.
///
/// The first entry must be the `/` directory and every other entry must name
/// an earlier entry as its parent. Names must be unique per directory and
/// files must be childless.
pub fn decode_image(bytes: &[u8]) -> Result<NamespaceImage> {
    let ImageOwned { txid, entries } = serde_json::from_slice(bytes)?;
    let root_ok = entries
        .first()
        .is_some_and(|e| e.parent.is_none() && e.name == ROOT_NAME && e.kind == INodeKind::Directory);
    if !root_ok {
        return Err(NamespaceError::Codec(format!(
            "image root must be the {:?} directory, found {:?}",
            ROOT_NAME,
            entries.first().map(|e| e.name.as_str())
        )));
    }

    // Children point backwards, so walking the entries in reverse finishes
    // every subtree before its parent is attached.
    let mut pending: Vec<Vec<INode>> = Vec::with_capacity(entries.len());
    pending.resize_with(entries.len(), Vec::new);
    let mut root = None;
    for (position, entry) in entries.into_iter().enumerate().rev() {
        let mut node = INode::new(entry.name, entry.kind);
        for child in std::mem::take(&mut pending[position]).into_iter().rev() {
            node.push_child(child)?;
        }
        if position == 0 {
            root = Some(node);
            break;
        }
        match entry.parent {
            Some(parent) if parent < position => {
                if node.name().is_empty() || node.name().contains('/') {
                    return Err(NamespaceError::Codec(format!("invalid entry name {:?}", node.name())));
                }
                pending[parent].push(node);
            }
            _ => {
                return Err(NamespaceError::Codec(format!(
                    "entry {} ({:?}) has no earlier parent",
                    position,
                    node.name()
                )))
            }
        }
    }
    let root = root.ok_or_else(|| NamespaceError::Codec("image has no root".to_string()))?;
    Ok(NamespaceImage { txid, root })
}
