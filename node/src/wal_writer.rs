// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Double-buffered, segment-rotating write-ahead log.
//!
//! # Buffers
//! - **active** receives every new record.
//! - **sealing** holds a frozen set of records while they are flushed.
//!
//! `rotate()` moves the active buffer into the sealing slot under the append
//! lock (O(1), no copy). `flush()` then writes the sealing buffer to
//! `{start}_{end}.log` and fsyncs it while appends keep landing in the new
//! active buffer. The sealing buffer is shared behind an `Arc`, so readers of
//! the buffered records never wait for the fsync either.
//!
//! # Invariants
//! - Flushed segments ∪ sealing ∪ active contain every appended record exactly
//!   once, with contiguous txids.
//! - Segments are non-overlapping and ordered by start txid.
//! - A record moves from the active buffer to a segment exactly once.
//!
//! Lock order: flushing -> sealing -> active, sealing -> segments.

use dfs_namespace::{EditOp, EditRecord, NamespaceError};
use parking_lot::{Mutex, RwLock};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::wal_buffer::EditBuffer;
use crate::wal_reader::{list_segments, read_segment, SegmentRange};

#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Out of order append: expected txid {expected}, found {found}")]
    OutOfOrder { expected: u64, found: u64 },

    #[error("Previous segment has not been flushed yet")]
    FlushPending,
}

impl From<NamespaceError> for WalError {
    fn from(e: NamespaceError) -> Self {
        WalError::Serialization(e.to_string())
    }
}

pub type WalResult<T> = Result<T, WalError>;

struct ActiveBuffer {
    buffer: EditBuffer,
    /// Highest txid ever appended (buffered or flushed).
    last_txid: u64,
}

struct SegmentIndex {
    ranges: Vec<SegmentRange>,
    last_flushed_txid: u64,
}

pub struct EditLog {
    dir: PathBuf,
    segment_size_bytes: usize,
    active: Mutex<ActiveBuffer>,
    /// Frozen records awaiting flush. Replaced, never mutated in place.
    sealing: Mutex<Arc<EditBuffer>>,
    /// Serializes rotation and flushing.
    flushing: Mutex<()>,
    segments: RwLock<SegmentIndex>,
}

impl EditLog {
    /// Open the log rooted at `dir`, picking up any segments already on disk.
    pub fn open<P: AsRef<Path>>(dir: P, segment_size_bytes: usize) -> WalResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let ranges = list_segments(&dir)?;
        let last_flushed_txid = ranges.last().map(|r| r.end_txid).unwrap_or(0);
        if !ranges.is_empty() {
            tracing::info!(
                "Edit log at {:?}: {} sealed segments, last flushed txid {}",
                dir,
                ranges.len(),
                last_flushed_txid
            );
        }

        Ok(Self {
            dir,
            segment_size_bytes,
            active: Mutex::new(ActiveBuffer {
                buffer: EditBuffer::new(),
                last_txid: last_flushed_txid,
            }),
            sealing: Mutex::new(Arc::new(EditBuffer::new())),
            flushing: Mutex::new(()),
            segments: RwLock::new(SegmentIndex {
                ranges,
                last_flushed_txid,
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Assign the next txid to `op` and append it. Single-writer path.
    pub fn log_edit(&self, op: EditOp) -> WalResult<EditRecord> {
        let mut active = self.active.lock();
        let record = EditRecord::new(active.last_txid + 1, op);
        active.buffer.write(record.clone())?;
        active.last_txid = record.txid;
        metrics::counter!("dfs_edits_appended_total", 1);
        Ok(record)
    }

    /// Append a record that already carries its txid (replay path).
    ///
    /// Only `last_txid + 1` is accepted, so the log never gains gaps or
    /// duplicates.
    pub fn append(&self, record: EditRecord) -> WalResult<()> {
        let mut active = self.active.lock();
        let expected = active.last_txid + 1;
        if record.txid != expected {
            return Err(WalError::OutOfOrder {
                expected,
                found: record.txid,
            });
        }
        active.last_txid = record.txid;
        active.buffer.write(record)?;
        metrics::counter!("dfs_edits_appended_total", 1);
        Ok(())
    }

    /// Move the log forward to `txid` without writing records, e.g. after a
    /// checkpoint image covering txids that are no longer in any segment.
    ///
    /// No-op when the log is already at or past `txid`.
    pub fn advance_to(&self, txid: u64) {
        let _flushing = self.flushing.lock();
        let sealing = self.sealing.lock();
        let mut active = self.active.lock();
        if txid <= active.last_txid {
            return;
        }
        if !sealing.is_empty() || !active.buffer.is_empty() {
            tracing::warn!("Refusing to advance edit log to {} with buffered records", txid);
            return;
        }
        active.last_txid = txid;
        let mut segments = self.segments.write();
        segments.last_flushed_txid = segments.last_flushed_txid.max(txid);
    }

    pub fn last_txid(&self) -> u64 {
        self.active.lock().last_txid
    }

    pub fn last_flushed_txid(&self) -> u64 {
        self.segments.read().last_flushed_txid
    }

    /// True once the active buffer reaches the segment size threshold.
    pub fn should_rotate(&self) -> bool {
        self.active.lock().buffer.size() >= self.segment_size_bytes
    }

    /// Seal the active buffer.
    ///
    /// Fails with `FlushPending` while the previous sealing buffer still holds
    /// unflushed records.
    pub fn rotate(&self) -> WalResult<()> {
        let _flushing = self.flushing.lock();
        self.rotate_locked()
    }

    fn rotate_locked(&self) -> WalResult<()> {
        let mut sealing = self.sealing.lock();
        if !sealing.is_empty() {
            return Err(WalError::FlushPending);
        }
        let mut active = self.active.lock();
        *sealing = Arc::new(std::mem::take(&mut active.buffer));
        tracing::debug!("Rotated edit buffer: {} records sealed", sealing.len());
        Ok(())
    }

    /// Persist the sealing buffer as a new segment.
    ///
    /// Returns the new range, or `None` when there was nothing to flush.
    /// Neither appends nor buffered reads are blocked while the segment is
    /// written.
    pub fn flush(&self) -> WalResult<Option<SegmentRange>> {
        let _flushing = self.flushing.lock();
        self.flush_sealed()
    }

    /// Flush everything buffered, regardless of size. Used at shutdown.
    ///
    /// Holds the flushing lock throughout so a concurrent rotate cannot slip
    /// in between the two flushes.
    pub fn force_sync(&self) -> WalResult<Option<SegmentRange>> {
        let _flushing = self.flushing.lock();
        self.flush_sealed()?;
        self.rotate_locked()?;
        self.flush_sealed()
    }

    /// Rotate and flush in one step, for the background flusher. A sealing
    /// buffer left over from a failed flush is flushed first.
    pub fn roll(&self) -> WalResult<Option<SegmentRange>> {
        let _flushing = self.flushing.lock();
        match self.rotate_locked() {
            Ok(()) => self.flush_sealed(),
            Err(WalError::FlushPending) => {
                tracing::warn!("Retrying flush of previously sealed edits");
                self.flush_sealed()
            }
            Err(e) => Err(e),
        }
    }

    /// Caller holds `flushing`, so the sealing slot cannot change underneath.
    fn flush_sealed(&self) -> WalResult<Option<SegmentRange>> {
        let sealed = self.sealing.lock().clone();
        let Some(end_txid) = sealed.max_txid() else {
            return Ok(None);
        };
        let start_txid = self.segments.read().last_flushed_txid + 1;
        if sealed.first_txid() != Some(start_txid) {
            tracing::warn!(
                "Sealing buffer starts at {:?} but last flushed txid is {}",
                sealed.first_txid(),
                start_txid - 1
            );
        }
        let range = SegmentRange::new(start_txid, end_txid);

        let started = Instant::now();
        if let Err(e) = self.write_segment(&range, sealed.bytes()) {
            tracing::error!("Failed to flush edit log segment {}: {}", range.file_name(), e);
            return Err(e);
        }

        {
            let mut sealing = self.sealing.lock();
            let mut segments = self.segments.write();
            segments.ranges.push(range);
            segments.last_flushed_txid = end_txid;
            *sealing = Arc::new(EditBuffer::new());
        }

        metrics::counter!("dfs_segments_flushed_total", 1);
        metrics::histogram!("dfs_segment_flush_duration_seconds", started.elapsed().as_secs_f64());
        tracing::info!("Flushed edit log segment {}", range.file_name());
        Ok(Some(range))
    }

    /// Sealed segments, ascending.
    pub fn flushed_ranges(&self) -> Vec<SegmentRange> {
        self.segments.read().ranges.clone()
    }

    /// Records currently in the active buffer.
    pub fn active_records(&self) -> Vec<EditRecord> {
        self.active.lock().buffer.records().to_vec()
    }

    /// Every record not yet in a segment: sealing first, then active.
    pub fn buffered_records(&self) -> Vec<EditRecord> {
        let sealing = self.sealing.lock();
        let active = self.active.lock();
        let mut records = Vec::with_capacity(sealing.len() + active.buffer.len());
        records.extend_from_slice(sealing.records());
        records.extend_from_slice(active.buffer.records());
        records
    }

    pub fn segment_path(&self, range: &SegmentRange) -> PathBuf {
        self.dir.join(range.file_name())
    }

    pub fn read_segment(&self, range: &SegmentRange) -> WalResult<Vec<EditRecord>> {
        read_segment(self.segment_path(range))
    }

    /// Delete sealed segments entirely covered by `txid`. Returns how many
    /// were removed.
    pub fn purge_segments_through(&self, txid: u64) -> WalResult<usize> {
        let mut segments = self.segments.write();
        let mut purged = 0;
        while let Some(range) = segments.ranges.first().copied() {
            if range.end_txid > txid {
                break;
            }
            match std::fs::remove_file(self.segment_path(&range)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(WalError::Io(e)),
            }
            segments.ranges.remove(0);
            purged += 1;
        }
        if purged > 0 {
            tracing::info!("Purged {} edit log segments through txid {}", purged, txid);
        }
        Ok(purged)
    }

    fn write_segment(&self, range: &SegmentRange, bytes: &[u8]) -> WalResult<()> {
        let path = self.segment_path(range);
        let tmp_path = path.with_extension("log.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}
