// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Metadata service: the namespace tree plus its edit log.
//!
//! Every mutation takes the tree write lock, applies to the tree and appends
//! to the WAL before releasing it, so readers of either never observe one
//! without the other. Images are taken under the read lock.

use dfs_namespace::snapshot::encode::encode_image;
use dfs_namespace::{EditOp, EditRecord, FsDirectory, NamespaceImage, NamespaceStats};
use parking_lot::RwLock;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::NodeResult;
use crate::recovery::{replay_floor, replay_segments};
use crate::wal_writer::{EditLog, WalError};

pub struct Namesystem {
    directory: RwLock<FsDirectory>,
    edit_log: Arc<EditLog>,
    running: AtomicBool,
}

impl Namesystem {
    /// An empty namespace over an existing edit log.
    pub fn new(edit_log: Arc<EditLog>) -> Self {
        Self {
            directory: RwLock::new(FsDirectory::new()),
            edit_log,
            running: AtomicBool::new(true),
        }
    }

    /// Rebuild the namespace from an optional image plus the segments in
    /// `edits_dir`, then open the edit log positioned after the last
    /// recovered txid.
    pub fn recover(
        edits_dir: &Path,
        segment_size_bytes: usize,
        image: Option<NamespaceImage>,
        checkpoint_txid: u64,
    ) -> NodeResult<Self> {
        let floor = replay_floor(image.as_ref().map(|i| i.txid), checkpoint_txid);
        let (image_txid, mut directory) = match image {
            Some(image) => image.into_directory()?,
            None => (0, FsDirectory::new()),
        };

        let outcome = replay_segments(&mut directory, edits_dir, floor)?;

        let edit_log = EditLog::open(edits_dir, segment_size_bytes)?;
        // Segments may be purged up to the image; continue numbering after it.
        edit_log.advance_to(image_txid.max(outcome.last_txid));

        let stats = directory.stats();
        tracing::info!(
            "Namespace recovered at txid {} ({} directories, {} files)",
            edit_log.last_txid(),
            stats.directories,
            stats.files
        );

        Ok(Self {
            directory: RwLock::new(directory),
            edit_log: Arc::new(edit_log),
            running: AtomicBool::new(true),
        })
    }

    pub fn edit_log(&self) -> &Arc<EditLog> {
        &self.edit_log
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop accepting mutations. Idempotent.
    pub fn shutdown(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            tracing::info!("Namesystem stopped accepting mutations");
        }
    }

    /// Highest txid applied to the tree and appended to the WAL.
    pub fn applied_txid(&self) -> u64 {
        self.edit_log.last_txid()
    }

    /// Create a directory and every missing parent.
    ///
    /// Returns `Ok(false)` without touching anything once shutdown has begun.
    pub fn mkdir(&self, path: &str) -> NodeResult<bool> {
        if !self.accepting("mkdir", path) {
            return Ok(false);
        }
        let mut directory = self.directory.write();
        directory.mkdir(path)?;
        if !dfs_namespace::path::components(path).is_empty() {
            self.edit_log.log_edit(EditOp::mkdir(path))?;
        }
        Ok(true)
    }

    /// Create a file. Duplicates return `Ok(false)` and are not logged.
    pub fn create_file(&self, path: &str) -> NodeResult<bool> {
        if !self.accepting("create", path) {
            return Ok(false);
        }
        let mut directory = self.directory.write();
        if !directory.create_file(path)? {
            tracing::debug!("File {} already exists", path);
            return Ok(false);
        }
        self.edit_log.log_edit(EditOp::create(path))?;
        Ok(true)
    }

    /// Apply a record shipped from elsewhere, keeping its txid.
    ///
    /// Records at or below the applied txid are skipped, so re-applying a
    /// batch after a retry is harmless. A record that would leave a gap is
    /// rejected before the tree is touched. Returns whether it was applied.
    pub fn apply(&self, record: &EditRecord) -> NodeResult<bool> {
        let mut directory = self.directory.write();
        let applied = self.edit_log.last_txid();
        if record.txid <= applied {
            return Ok(false);
        }
        if record.txid != applied + 1 {
            return Err(WalError::OutOfOrder {
                expected: applied + 1,
                found: record.txid,
            }
            .into());
        }
        if let Err(e) = directory.apply(&record.op) {
            // The record is still logged so the local WAL mirrors the source.
            tracing::warn!("Record {} did not apply cleanly: {}", record.txid, e);
        }
        self.edit_log.append(record.clone())?;
        Ok(true)
    }

    /// Encode the tree as an image tagged with the txid it covers.
    pub fn snapshot(&self) -> NodeResult<(u64, Vec<u8>)> {
        let directory = self.directory.read();
        let txid = self.edit_log.last_txid();
        let bytes = encode_image(txid, directory.root())?;
        Ok((txid, bytes))
    }

    /// Tree digest and the txid it covers, taken atomically.
    pub fn digest(&self) -> (u64, String) {
        let directory = self.directory.read();
        (self.edit_log.last_txid(), directory.digest())
    }

    pub fn stats(&self) -> NamespaceStats {
        self.directory.read().stats()
    }

    /// Run `f` against the tree under the read lock.
    pub fn with_directory<R>(&self, f: impl FnOnce(&FsDirectory) -> R) -> R {
        f(&self.directory.read())
    }

    fn accepting(&self, op: &str, path: &str) -> bool {
        if self.is_running() {
            return true;
        }
        tracing::warn!("Rejecting {} {}: namesystem is shutting down", op, path);
        false
    }
}
