// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! WAL segment reading.
//!
//! A segment is an immutable file named after the txid range it covers,
//! `{start}_{end}.log`, holding one text record per line.

use dfs_namespace::EditRecord;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use crate::wal_writer::{WalError, WalResult};

pub const SEGMENT_EXTENSION: &str = "log";

/// Inclusive txid range `[start_txid, end_txid]` of one sealed segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentRange {
    pub start_txid: u64,
    pub end_txid: u64,
}

impl SegmentRange {
    pub fn new(start_txid: u64, end_txid: u64) -> Self {
        Self { start_txid, end_txid }
    }

    pub fn contains(&self, txid: u64) -> bool {
        txid >= self.start_txid && txid <= self.end_txid
    }

    pub fn file_name(&self) -> String {
        format!("{}_{}.{}", self.start_txid, self.end_txid, SEGMENT_EXTENSION)
    }

    /// Parse `{start}_{end}.log`. Anything else (temp files, images) is `None`.
    pub fn parse_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(SEGMENT_EXTENSION)?.strip_suffix('.')?;
        let (start, end) = stem.split_once('_')?;
        let range = Self::new(start.parse().ok()?, end.parse().ok()?);
        (range.start_txid <= range.end_txid).then_some(range)
    }
}

/// Iterator over the records of one segment file.
pub struct SegmentReader {
    lines: Lines<BufReader<File>>,
}

impl SegmentReader {
    pub fn open<P: AsRef<Path>>(path: P) -> WalResult<Self> {
        let file = File::open(path)?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
        })
    }
}

impl Iterator for SegmentReader {
    type Item = WalResult<EditRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(WalError::Io(e))),
            };
            if line.trim().is_empty() {
                continue;
            }
            return Some(EditRecord::from_line(&line).map_err(WalError::from));
        }
    }
}

pub fn read_segment<P: AsRef<Path>>(path: P) -> WalResult<Vec<EditRecord>> {
    SegmentReader::open(path)?.collect()
}

/// Sealed segments found in `dir`, ascending by start txid.
pub fn list_segments<P: AsRef<Path>>(dir: P) -> WalResult<Vec<SegmentRange>> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut ranges = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        match name.to_str().and_then(SegmentRange::parse_file_name) {
            Some(range) => ranges.push(range),
            None => tracing::debug!("Skipping non-segment file {:?}", name),
        }
    }
    ranges.sort();
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfs_namespace::EditOp;
    use tempfile::tempdir;

    #[test]
    fn test_segment_file_names() {
        let range = SegmentRange::new(391, 782);
        assert_eq!(range.file_name(), "391_782.log");
        assert_eq!(SegmentRange::parse_file_name("391_782.log"), Some(range));
        assert_eq!(SegmentRange::parse_file_name("391_782.log.tmp"), None);
        assert_eq!(SegmentRange::parse_file_name("9_3.log"), None);
        assert_eq!(SegmentRange::parse_file_name("fsimage.json"), None);

        assert!(range.contains(391));
        assert!(range.contains(782));
        assert!(!range.contains(390));
        assert!(!range.contains(783));
    }

    #[test]
    fn test_read_and_list_segments() {
        let dir = tempdir().unwrap();
        let text = "{\"txid\":1,\"op\":\"MKDIR\",\"path\":\"/a\"}\n\n{\"txid\":2,\"op\":\"CREATE\",\"path\":\"/a/f\"}\n";
        std::fs::write(dir.path().join("1_2.log"), text).unwrap();
        std::fs::write(dir.path().join("3_3.log"), "{\"txid\":3,\"op\":\"MKDIR\",\"path\":\"/b\"}\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let ranges = list_segments(dir.path()).unwrap();
        assert_eq!(ranges, vec![SegmentRange::new(1, 2), SegmentRange::new(3, 3)]);

        let records = read_segment(dir.path().join("1_2.log")).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].op, EditOp::create("/a/f"));

        assert!(list_segments(dir.path().join("missing")).unwrap().is_empty());
    }
}
