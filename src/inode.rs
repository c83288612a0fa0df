// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Namespace tree nodes.
//!
//! A parent exclusively owns its children. Children keep their insertion order
//! (images and digests walk them in that order) and are additionally indexed by
//! name so a lookup is O(1) instead of a scan over the fan-out.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{NamespaceError, Result};

pub const ROOT_NAME: &str = "/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum INodeKind {
    Directory,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct INode {
    name: String,
    kind: INodeKind,
    children: Vec<INode>,
    /// name -> position in `children`.
    index: FxHashMap<String, usize>,
}

impl INode {
    pub fn directory(name: impl Into<String>) -> Self {
        Self::new(name, INodeKind::Directory)
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self::new(name, INodeKind::File)
    }

    pub fn root() -> Self {
        Self::directory(ROOT_NAME)
    }

    pub fn new(name: impl Into<String>, kind: INodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            children: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> INodeKind {
        self.kind
    }

    pub fn is_file(&self) -> bool {
        self.kind == INodeKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind == INodeKind::Directory
    }

    /// Children in insertion order.
    pub fn children(&self) -> &[INode] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&INode> {
        self.index.get(name).map(|&i| &self.children[i])
    }

    pub(crate) fn child_position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn child_at_mut(&mut self, position: usize) -> &mut INode {
        &mut self.children[position]
    }

    /// Attach a new child and return its position.
    ///
    /// Files never admit children and names are unique within a directory.
    pub(crate) fn push_child(&mut self, child: INode) -> Result<usize> {
        if self.is_file() {
            return Err(NamespaceError::NotADirectory(self.name.clone()));
        }
        if self.index.contains_key(child.name()) {
            return Err(NamespaceError::Codec(format!(
                "duplicate child {:?} under {:?}",
                child.name(),
                self.name
            )));
        }
        let position = self.children.len();
        self.index.insert(child.name.clone(), position);
        self.children.push(child);
        Ok(position)
    }
}
