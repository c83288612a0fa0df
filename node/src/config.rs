// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const EDITS_DIR: &str = "edits";
pub const PRIMARY_IMAGE_FILE: &str = "fsimage.json";
pub const CHECKPOINT_TXID_FILE: &str = "checkpoint-txid.meta";
pub const CHECKPOINT_INFO_FILE: &str = "checkpoint-info.meta";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub data_dir: PathBuf,
    /// Remote-call surface (mutations, registry, log fetching).
    pub rpc_addr: SocketAddr,
    /// Dedicated byte-stream channel for image uploads.
    pub image_addr: SocketAddr,

    /// Active buffer size that triggers a rotate + flush.
    pub segment_size_bytes: usize,
    /// Max records returned by one log fetch.
    pub fetch_batch_size: usize,
    pub purge_checkpointed_segments: bool,

    #[serde(with = "millis")]
    pub flush_check_interval: Duration,
    #[serde(with = "millis")]
    pub fetch_backoff: Duration,
    #[serde(with = "millis")]
    pub checkpoint_interval: Duration,
    #[serde(with = "millis")]
    pub recovery_poll_interval: Duration,

    #[serde(with = "millis")]
    pub heartbeat_timeout: Duration,
    #[serde(with = "millis")]
    pub liveness_check_interval: Duration,
    #[serde(with = "millis")]
    pub heartbeat_interval: Duration,
    pub replica_count: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./dfs-data"),
            rpc_addr: SocketAddr::from(([127, 0, 0, 1], 50070)),
            image_addr: SocketAddr::from(([127, 0, 0, 1], 50080)),
            segment_size_bytes: 25 * 1024,
            fetch_batch_size: 10,
            purge_checkpointed_segments: true,
            flush_check_interval: Duration::from_secs(1),
            fetch_backoff: Duration::from_secs(1),
            checkpoint_interval: Duration::from_secs(60),
            recovery_poll_interval: Duration::from_secs(1),
            heartbeat_timeout: Duration::from_secs(90),
            liveness_check_interval: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(30),
            replica_count: 2,
        }
    }
}

impl NodeConfig {
    /// A config rooted at `data_dir` with every other knob at its default.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    pub fn edits_dir(&self) -> PathBuf {
        self.data_dir.join(EDITS_DIR)
    }

    pub fn primary_image_path(&self) -> PathBuf {
        self.data_dir.join(PRIMARY_IMAGE_FILE)
    }

    pub fn checkpoint_txid_path(&self) -> PathBuf {
        self.data_dir.join(CHECKPOINT_TXID_FILE)
    }

    pub fn checkpoint_info_path(&self) -> PathBuf {
        self.data_dir.join(CHECKPOINT_INFO_FILE)
    }

    /// Backup-local image for a given checkpoint txid.
    pub fn backup_image_path(&self, txid: u64) -> PathBuf {
        self.data_dir.join(backup_image_name(txid))
    }

    pub fn resolve(&self, file_name: &str) -> PathBuf {
        Path::new(&self.data_dir).join(file_name)
    }
}

pub fn backup_image_name(txid: u64) -> String {
    format!("fsimage-{}.json", txid)
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
