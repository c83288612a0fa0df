// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! In-memory edit buffer, one half of the WAL's double buffer.
//!
//! Holds the newline-delimited text exactly as it will land in a segment file,
//! plus the decoded records so readers can be served without re-parsing.

use dfs_namespace::EditRecord;

use crate::wal_writer::WalResult;

pub const RECORD_SEPARATOR: u8 = b'\n';

#[derive(Debug, Default)]
pub struct EditBuffer {
    bytes: Vec<u8>,
    records: Vec<EditRecord>,
}

impl EditBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record plus the record separator.
    pub fn write(&mut self, record: EditRecord) -> WalResult<()> {
        let line = record.to_line()?;
        self.bytes.extend_from_slice(line.as_bytes());
        self.bytes.push(RECORD_SEPARATOR);
        self.records.push(record);
        Ok(())
    }

    /// Bytes written so far.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_txid(&self) -> Option<u64> {
        self.records.first().map(|r| r.txid)
    }

    /// Running maximum txid of the buffer.
    pub fn max_txid(&self) -> Option<u64> {
        self.records.last().map(|r| r.txid)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn records(&self) -> &[EditRecord] {
        &self.records
    }

    /// Drop the content but keep the allocations for the next swap.
    pub fn clear(&mut self) {
        self.bytes.clear();
        self.records.clear();
    }
}
