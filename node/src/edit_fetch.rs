// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Primary-side log shipping.
//!
//! Serves `fetch(after_txid)` from, in order of preference:
//! 1. the cached segment, when it contains `after_txid + 1`
//! 2. the sealed segment containing `after_txid + 1` (loaded into the cache)
//! 3. the in-memory buffers (sealing, then active)
//!
//! The result always starts exactly at `after_txid + 1`, is contiguous, and is
//! capped at the batch size. Empty means nothing newer is available yet.

use dfs_namespace::EditRecord;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::wal_reader::SegmentRange;
use crate::wal_writer::{EditLog, WalResult};

struct SegmentCache {
    range: SegmentRange,
    records: Arc<Vec<EditRecord>>,
}

pub struct EditFetcher {
    edit_log: Arc<EditLog>,
    batch_size: usize,
    cache: Mutex<Option<SegmentCache>>,
}

impl EditFetcher {
    pub fn new(edit_log: Arc<EditLog>, batch_size: usize) -> Self {
        Self {
            edit_log,
            batch_size: batch_size.max(1),
            cache: Mutex::new(None),
        }
    }

    pub fn fetch(&self, after_txid: u64) -> WalResult<Vec<EditRecord>> {
        let Some(next) = after_txid.checked_add(1) else {
            return Ok(Vec::new());
        };

        let mut batch = match self.segment_records(next)? {
            Some(records) => take_batch(&records, next, self.batch_size),
            None => take_batch(&self.edit_log.buffered_records(), next, self.batch_size),
        };

        // A flush may have moved `next` from the buffers into a segment
        // between the two lookups.
        if batch.is_empty() && next <= self.edit_log.last_flushed_txid() {
            if let Some(records) = self.segment_records(next)? {
                batch = take_batch(&records, next, self.batch_size);
            }
        }

        if !batch.is_empty() {
            metrics::counter!("dfs_edits_fetched_total", batch.len() as u64);
            tracing::debug!("Serving {} edits after txid {}", batch.len(), after_txid);
        }
        Ok(batch)
    }

    /// Records of the sealed segment containing `txid`, via the cache.
    fn segment_records(&self, txid: u64) -> WalResult<Option<Arc<Vec<EditRecord>>>> {
        let mut cache = self.cache.lock();
        if let Some(cached) = cache.as_ref() {
            if cached.range.contains(txid) {
                return Ok(Some(cached.records.clone()));
            }
        }

        let Some(range) = self.edit_log.flushed_ranges().into_iter().find(|r| r.contains(txid)) else {
            return Ok(None);
        };
        let records = Arc::new(self.edit_log.read_segment(&range)?);
        tracing::debug!("Cached segment {} for log fetching", range.file_name());
        *cache = Some(SegmentCache {
            range,
            records: records.clone(),
        });
        Ok(Some(records))
    }
}

/// Contiguous run starting at `next`, at most `limit` long.
fn take_batch(records: &[EditRecord], next: u64, limit: usize) -> Vec<EditRecord> {
    let Some(start) = records.iter().position(|r| r.txid == next) else {
        return Vec::new();
    };
    records[start..]
        .iter()
        .zip(next..)
        .take_while(|(record, expected)| record.txid == *expected)
        .take(limit)
        .map(|(record, _)| record.clone())
        .collect()
}
