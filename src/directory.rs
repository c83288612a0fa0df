// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! The namespace tree.
//!
//! `FsDirectory` is a plain data structure: callers provide the locking. The
//! node crate wraps it in a read/write lock so that images are taken while no
//! structural write is in flight.

use serde::Serialize;

use crate::edit::EditOp;
use crate::error::{NamespaceError, Result};
use crate::inode::INode;
use crate::path;
use crate::snapshot::blake3::namespace_digest_hex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsDirectory {
    root: INode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NamespaceStats {
    pub directories: u64,
    pub files: u64,
}

impl FsDirectory {
    pub fn new() -> Self {
        Self { root: INode::root() }
    }

    /// Adopt a decoded tree. The root must be a directory.
    pub fn from_root(root: INode) -> Result<Self> {
        if !root.is_directory() {
            return Err(NamespaceError::NotADirectory(root.name().to_string()));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &INode {
        &self.root
    }

    /// Create every missing directory along `path`.
    ///
    /// Idempotent: re-applying an existing path is a no-op. Returns whether
    /// anything was created.
    pub fn mkdir(&mut self, path: &str) -> Result<bool> {
        let components = path::components(path);
        let mut created = false;
        let mut current = &mut self.root;
        for name in components {
            let (next, was_created) = descend_or_create(current, name, path)?;
            created |= was_created;
            current = next;
        }
        Ok(created)
    }

    /// Create a childless file node, creating missing parent directories.
    ///
    /// Returns `Ok(false)` when an entry with the same name already exists in
    /// the parent (or the path names no entry at all).
    pub fn create_file(&mut self, path: &str) -> Result<bool> {
        let Some((parents, name)) = path::split_parent(path) else {
            return Ok(false);
        };
        let mut parent = &mut self.root;
        for component in parents {
            let (next, _) = descend_or_create(parent, component, path)?;
            parent = next;
        }
        if parent.child_position(name).is_some() {
            return Ok(false);
        }
        parent.push_child(INode::file(name))?;
        Ok(true)
    }

    /// Dispatch an edit operation to the matching tree mutation.
    pub fn apply(&mut self, op: &EditOp) -> Result<bool> {
        match op {
            EditOp::Mkdir { path } => self.mkdir(path),
            EditOp::Create { path } => self.create_file(path),
        }
    }

    /// Resolve a path to its node. The empty path resolves to the root.
    pub fn lookup(&self, path: &str) -> Option<&INode> {
        let mut current = &self.root;
        for name in path::components(path) {
            current = Self::lookup_child(current, name)?;
        }
        Some(current)
    }

    pub fn lookup_child<'a>(dir: &'a INode, name: &str) -> Option<&'a INode> {
        dir.child(name)
    }

    /// BLAKE3 digest of the tree, hex encoded.
    pub fn digest(&self) -> String {
        namespace_digest_hex(&self.root)
    }

    pub fn stats(&self) -> NamespaceStats {
        let mut stats = NamespaceStats::default();
        count(&self.root, &mut stats);
        stats
    }
}

impl Default for FsDirectory {
    fn default() -> Self {
        Self::new()
    }
}

fn count(root: &INode, stats: &mut NamespaceStats) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_file() {
            stats.files += 1;
        } else {
            stats.directories += 1;
        }
        stack.extend(node.children().iter());
    }
}

/// Step into the directory `name` below `parent`, creating it when missing.
fn descend_or_create<'a>(parent: &'a mut INode, name: &str, path: &str) -> Result<(&'a mut INode, bool)> {
    if parent.is_file() {
        return Err(NamespaceError::NotADirectory(path.to_string()));
    }
    let (position, created) = match parent.child_position(name) {
        Some(position) => (position, false),
        None => (parent.push_child(INode::directory(name))?, true),
    };
    let child = parent.child_at_mut(position);
    if child.is_file() {
        return Err(NamespaceError::NotADirectory(path.to_string()));
    }
    Ok((child, created))
}
