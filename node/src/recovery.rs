// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Crash Recovery
//!
//! Rebuilds a namespace from:
//! - the latest namespace image (if any)
//! - the sealed WAL segments above the replay floor
//!
//! Missing files are not an error: a node with nothing on disk starts empty.

use dfs_namespace::snapshot::decode::decode_image;
use dfs_namespace::{FsDirectory, NamespaceImage};

use crate::errors::NodeResult;
use crate::wal_reader::{list_segments, SegmentReader};
use crate::wal_writer::WalResult;

use std::path::Path;
use std::time::Instant;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayOutcome {
    /// Records applied to the tree.
    pub applied: usize,
    /// Highest txid seen in the replayed segments, or the floor when none.
    pub last_txid: u64,
    pub segments: usize,
}

/// Load an image file. `Ok(None)` when the file does not exist.
pub fn load_image(path: &Path) -> NodeResult<Option<NamespaceImage>> {
    if !path.exists() {
        tracing::debug!("No namespace image at {:?}", path);
        return Ok(None);
    }
    let bytes = std::fs::read(path)?;
    let image = decode_image(&bytes)?;
    tracing::info!("Loaded namespace image {:?} at txid {}", path, image.txid);
    Ok(Some(image))
}

/// Replay floor for a given image and checkpoint txid.
///
/// A checkpoint id without an image never suppresses replay.
pub fn replay_floor(image_txid: Option<u64>, checkpoint_txid: u64) -> u64 {
    match image_txid {
        Some(image_txid) => image_txid.min(checkpoint_txid),
        None => 0,
    }
}

/// Apply every record with `txid > floor` from the segments in `edits_dir`,
/// in ascending segment order.
///
/// Records that fail to apply (e.g. a path through a file) are logged and
/// skipped, matching live-write behavior where the failed mutation was never
/// logged in the first place.
pub fn replay_segments(directory: &mut FsDirectory, edits_dir: &Path, floor: u64) -> WalResult<ReplayOutcome> {
    let start = Instant::now();
    let mut outcome = ReplayOutcome {
        last_txid: floor,
        ..Default::default()
    };

    for range in list_segments(edits_dir)? {
        if range.end_txid <= floor {
            continue;
        }
        outcome.segments += 1;
        for record in SegmentReader::open(edits_dir.join(range.file_name()))? {
            let record = record?;
            if record.txid <= outcome.last_txid {
                continue;
            }
            if record.txid != outcome.last_txid + 1 {
                tracing::warn!(
                    "Gap in edit log: expected txid {}, found {}",
                    outcome.last_txid + 1,
                    record.txid
                );
            }
            if let Err(e) = directory.apply(&record.op) {
                tracing::warn!("Skipping txid {} during replay: {}", record.txid, e);
            }
            outcome.last_txid = record.txid;
            outcome.applied += 1;
        }
    }

    metrics::histogram!("dfs_replay_duration_seconds", start.elapsed().as_secs_f64());
    tracing::info!(
        "Replayed {} records from {} segments (floor {}, last txid {})",
        outcome.applied,
        outcome.segments,
        floor,
        outcome.last_txid
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal_writer::EditLog;
    use dfs_namespace::snapshot::encode::encode_image;
    use dfs_namespace::EditOp;
    use tempfile::tempdir;

    fn write_history(dir: &Path) {
        let log = EditLog::open(dir, 1024).unwrap();
        log.log_edit(EditOp::mkdir("/a/b")).unwrap();
        log.log_edit(EditOp::create("/a/b/f")).unwrap();
        log.rotate().unwrap();
        log.flush().unwrap();
        log.log_edit(EditOp::mkdir("/c")).unwrap();
        log.log_edit(EditOp::create("/c/g")).unwrap();
        log.rotate().unwrap();
        log.flush().unwrap();
    }

    #[test]
    fn test_replay_from_zero() {
        let dir = tempdir().unwrap();
        write_history(dir.path());

        let mut tree = FsDirectory::new();
        let outcome = replay_segments(&mut tree, dir.path(), 0).unwrap();
        assert_eq!(outcome, ReplayOutcome { applied: 4, last_txid: 4, segments: 2 });
        assert!(tree.lookup("/a/b/f").unwrap().is_file());
        assert!(tree.lookup("/c/g").unwrap().is_file());
    }

    #[test]
    fn test_replay_above_floor_only() {
        let dir = tempdir().unwrap();
        write_history(dir.path());

        let mut tree = FsDirectory::new();
        let outcome = replay_segments(&mut tree, dir.path(), 3).unwrap();
        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.segments, 1);
        assert_eq!(outcome.last_txid, 4);
        // Only txid 4 applied: `/c` is created as an intermediate directory.
        assert!(tree.lookup("/a").is_none());
        assert!(tree.lookup("/c/g").is_some());
    }

    #[test]
    fn test_missing_files_mean_empty_start() {
        let dir = tempdir().unwrap();
        assert!(load_image(&dir.path().join("fsimage.json")).unwrap().is_none());

        let mut tree = FsDirectory::new();
        let outcome = replay_segments(&mut tree, &dir.path().join("edits"), 0).unwrap();
        assert_eq!(outcome, ReplayOutcome::default());
        assert_eq!(tree, FsDirectory::new());
    }

    #[test]
    fn test_load_image_and_floor() {
        let dir = tempdir().unwrap();
        let mut tree = FsDirectory::new();
        tree.mkdir("/warehouse").unwrap();
        let path = dir.path().join("fsimage.json");
        std::fs::write(&path, encode_image(9, tree.root()).unwrap()).unwrap();

        let image = load_image(&path).unwrap().unwrap();
        assert_eq!(image.txid, 9);

        assert_eq!(replay_floor(Some(9), 12), 9);
        assert_eq!(replay_floor(Some(9), 4), 4);
        assert_eq!(replay_floor(None, 12), 0);
    }

    #[test]
    fn test_deep_image_loads() {
        let dir = tempdir().unwrap();
        let deep: String = (0..220).map(|i| format!("/p{}", i)).collect();
        let mut tree = FsDirectory::new();
        tree.mkdir(&deep).unwrap();
        let path = dir.path().join("fsimage-220.json");
        std::fs::write(&path, encode_image(220, tree.root()).unwrap()).unwrap();

        let (txid, restored) = load_image(&path).unwrap().unwrap().into_directory().unwrap();
        assert_eq!(txid, 220);
        assert_eq!(restored.digest(), tree.digest());
        assert!(restored.lookup(&deep).is_some());
    }

    #[test]
    fn test_corrupt_image_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fsimage.json");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(load_image(&path).is_err());
    }
}
