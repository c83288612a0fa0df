// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Checkpoint bookkeeping on disk.
//!
//! Every file here is replaced atomically: written to `*.tmp`, fsynced, then
//! renamed over the target.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::errors::{NodeError, NodeResult};

/// Write `bytes` to `path` via temp file + fsync + rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp_path, path)
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The Primary's checkpoint txid, stored as decimal text.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last persisted txid, `0` when nothing was ever persisted.
    pub fn load(&self) -> NodeResult<u64> {
        if !self.path.exists() {
            return Ok(0);
        }
        let text = std::fs::read_to_string(&self.path)?;
        text.trim()
            .parse()
            .map_err(|e| NodeError::InvalidInput(format!("Bad checkpoint txid in {:?}: {}", self.path, e)))
    }

    pub fn save(&self, txid: u64) -> NodeResult<()> {
        write_atomic(&self.path, txid.to_string().as_bytes())?;
        Ok(())
    }
}

/// The Backup's local checkpoint record: `timestamp_txid_imageFile`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointInfo {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub txid: u64,
    pub image_file: String,
}

impl CheckpointInfo {
    pub fn new(txid: u64, image_file: impl Into<String>) -> Self {
        Self {
            timestamp: now_millis(),
            txid,
            image_file: image_file.into(),
        }
    }

    pub fn to_line(&self) -> String {
        format!("{}_{}_{}", self.timestamp, self.txid, self.image_file)
    }

    pub fn parse(line: &str) -> NodeResult<Self> {
        let mut parts = line.trim().splitn(3, '_');
        let (Some(timestamp), Some(txid), Some(image_file)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(NodeError::InvalidInput(format!("Malformed checkpoint info: {:?}", line)));
        };
        let parse = |field: &str| {
            field
                .parse::<u64>()
                .map_err(|e| NodeError::InvalidInput(format!("Malformed checkpoint info {:?}: {}", line, e)))
        };
        if image_file.is_empty() {
            return Err(NodeError::InvalidInput(format!("Checkpoint info without image file: {:?}", line)));
        }
        Ok(Self {
            timestamp: parse(timestamp)?,
            txid: parse(txid)?,
            image_file: image_file.to_string(),
        })
    }

    /// `Ok(None)` when no checkpoint has been taken yet.
    pub fn load(path: &Path) -> NodeResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text).map(Some)
    }

    pub fn save(&self, path: &Path) -> NodeResult<()> {
        write_atomic(path, self.to_line().as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_checkpoint_store_roundtrip() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("checkpoint-txid.meta"));
        assert_eq!(store.load().unwrap(), 0);

        store.save(42).unwrap();
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "42");
        assert_eq!(store.load().unwrap(), 42);
        assert!(!dir.path().join("checkpoint-txid.tmp").exists());

        std::fs::write(store.path(), "forty-two").unwrap();
        assert!(store.load().is_err());
    }

    #[test]
    fn test_checkpoint_info_line() {
        let info = CheckpointInfo {
            timestamp: 1_700_000_000_000,
            txid: 391,
            image_file: "fsimage-391.json".into(),
        };
        assert_eq!(info.to_line(), "1700000000000_391_fsimage-391.json");
        assert_eq!(CheckpointInfo::parse(&info.to_line()).unwrap(), info);

        // Image file names may themselves contain the separator.
        let odd = CheckpointInfo::parse("5_7_image_v2.json\n").unwrap();
        assert_eq!(odd.image_file, "image_v2.json");

        assert!(CheckpointInfo::parse("5_7").is_err());
        assert!(CheckpointInfo::parse("x_7_f.json").is_err());
        assert!(CheckpointInfo::parse("5_7_").is_err());
    }

    #[test]
    fn test_checkpoint_info_load_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint-info.meta");
        assert_eq!(CheckpointInfo::load(&path).unwrap(), None);

        let info = CheckpointInfo::new(12, "fsimage-12.json");
        info.save(&path).unwrap();
        assert_eq!(CheckpointInfo::load(&path).unwrap(), Some(info));
    }
}
