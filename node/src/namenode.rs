// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! The Primary: namesystem, log shipping, checkpoint watermark and the
//! storage-node registry behind one handle.

use dfs_namespace::EditRecord;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::DigestResponse;
use crate::config::NodeConfig;
use crate::edit_fetch::EditFetcher;
use crate::errors::{NodeError, NodeResult};
use crate::namesystem::Namesystem;
use crate::persistence::CheckpointStore;
use crate::recovery::load_image;
use crate::registry::{run_liveness_monitor, NodeId, NodeInfo, NodeRegistry};
use crate::wal_writer::EditLog;

pub struct NameNode {
    config: NodeConfig,
    namesystem: Arc<Namesystem>,
    fetcher: EditFetcher,
    registry: Arc<NodeRegistry>,
    checkpoints: CheckpointStore,
    checkpoint_txid: Mutex<u64>,
    shutdown: CancellationToken,
}

impl NameNode {
    /// Recover from `config.data_dir` and return a Primary ready to serve.
    pub fn open(config: NodeConfig) -> NodeResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let checkpoints = CheckpointStore::new(config.checkpoint_txid_path());
        let checkpoint_txid = checkpoints.load()?;
        let image = load_image(&config.primary_image_path())?;
        let namesystem = Namesystem::recover(&config.edits_dir(), config.segment_size_bytes, image, checkpoint_txid)?;

        let fetcher = EditFetcher::new(namesystem.edit_log().clone(), config.fetch_batch_size);
        metrics::gauge!("dfs_checkpoint_txid", checkpoint_txid as f64);
        tracing::info!(
            "Primary opened at {:?}: txid {}, checkpoint txid {}",
            config.data_dir,
            namesystem.applied_txid(),
            checkpoint_txid
        );

        Ok(Self {
            namesystem: Arc::new(namesystem),
            fetcher,
            registry: Arc::new(NodeRegistry::new()),
            checkpoints,
            checkpoint_txid: Mutex::new(checkpoint_txid),
            shutdown: CancellationToken::new(),
            config,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn namesystem(&self) -> &Arc<Namesystem> {
        &self.namesystem
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn mkdir(&self, path: &str) -> NodeResult<bool> {
        self.namesystem.mkdir(path)
    }

    pub fn create_file(&self, path: &str) -> NodeResult<bool> {
        self.namesystem.create_file(path)
    }

    pub fn register(&self, id: NodeId) -> bool {
        self.registry.register(id);
        true
    }

    pub fn heartbeat(&self, id: &NodeId) -> NodeResult<bool> {
        self.registry.heartbeat(id)?;
        Ok(true)
    }

    pub fn allocate_replica_targets(&self, file_name: &str, size_bytes: u64) -> Vec<NodeInfo> {
        let targets = self.registry.allocate(size_bytes, self.config.replica_count);
        tracing::debug!("Placed {} ({} bytes) on {} storage nodes", file_name, size_bytes, targets.len());
        targets
    }

    /// Records after `after_txid`, at most one batch. Empty once shut down.
    pub fn fetch_edits(&self, after_txid: u64) -> NodeResult<Vec<EditRecord>> {
        if !self.namesystem.is_running() {
            return Ok(Vec::new());
        }
        Ok(self.fetcher.fetch(after_txid)?)
    }

    pub fn checkpoint_txid(&self) -> u64 {
        *self.checkpoint_txid.lock()
    }

    /// Record a checkpoint reported by the Backup. Regressions are ignored and
    /// a txid beyond the local log is rejected.
    ///
    /// Returns the checkpoint txid now in effect.
    pub fn update_checkpoint_txid(&self, txid: u64) -> NodeResult<u64> {
        let mut current = self.checkpoint_txid.lock();
        if txid <= *current {
            tracing::debug!("Ignoring checkpoint txid {} (current {})", txid, *current);
            return Ok(*current);
        }
        let applied = self.namesystem.applied_txid();
        if txid > applied {
            tracing::warn!("Rejecting checkpoint txid {} ahead of the local log ({})", txid, applied);
            return Err(NodeError::InvalidInput(format!(
                "Checkpoint txid {} is ahead of the last txid {}",
                txid, applied
            )));
        }

        self.checkpoints.save(txid)?;
        *current = txid;
        metrics::gauge!("dfs_checkpoint_txid", txid as f64);
        tracing::info!("Checkpoint txid advanced to {}", txid);

        if self.config.purge_checkpointed_segments {
            self.namesystem.edit_log().purge_segments_through(txid)?;
        }
        Ok(txid)
    }

    /// Stop accepting mutations, flush the WAL, persist the checkpoint txid
    /// and stop the background tasks.
    pub fn shutdown_close(&self) -> NodeResult<()> {
        self.namesystem.shutdown();
        let flushed = self.namesystem.edit_log().force_sync();
        let saved = self.checkpoints.save(self.checkpoint_txid());
        self.shutdown.cancel();
        if let Some(range) = flushed? {
            tracing::info!("Final edit log segment {}", range.file_name());
        }
        saved?;
        tracing::info!("Primary shut down at txid {}", self.namesystem.applied_txid());
        Ok(())
    }

    pub fn digest(&self) -> DigestResponse {
        let (txid, digest) = self.namesystem.digest();
        let stats = self.namesystem.stats();
        DigestResponse {
            txid,
            digest,
            directories: stats.directories,
            files: stats.files,
        }
    }

    /// Start the WAL flusher and the liveness monitor.
    pub fn spawn_background_tasks(&self) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(run_flusher(
                self.namesystem.edit_log().clone(),
                self.config.flush_check_interval,
                self.shutdown.clone(),
            )),
            tokio::spawn(run_liveness_monitor(
                self.registry.clone(),
                self.config.liveness_check_interval,
                self.config.heartbeat_timeout,
                self.shutdown.clone(),
            )),
        ]
    }
}

/// Rotate and flush the WAL whenever the active buffer reaches its threshold.
pub async fn run_flusher(edit_log: Arc<EditLog>, interval: Duration, token: CancellationToken) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        if !edit_log.should_rotate() {
            continue;
        }
        let log = edit_log.clone();
        match tokio::task::spawn_blocking(move || log.roll()).await {
            Ok(Ok(_)) => {}
            // Sealed records stay buffered; the next tick retries.
            Ok(Err(e)) => tracing::error!("Edit log flush failed: {}", e),
            Err(e) => tracing::error!("Edit log flush task panicked: {}", e),
        }
    }
    tracing::debug!("Edit log flusher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfs_namespace::EditOp;
    use tempfile::tempdir;

    fn open(dir: &std::path::Path) -> NameNode {
        NameNode::open(NodeConfig::with_data_dir(dir)).unwrap()
    }

    #[test]
    fn test_fetch_end_to_end_records() {
        let dir = tempdir().unwrap();
        let nn = open(dir.path());
        nn.mkdir("/a/b").unwrap();
        nn.create_file("/a/b/f").unwrap();

        let records = nn.fetch_edits(0).unwrap();
        assert_eq!(
            records,
            vec![
                EditRecord::new(1, EditOp::mkdir("/a/b")),
                EditRecord::new(2, EditOp::create("/a/b/f")),
            ]
        );
        assert!(nn.fetch_edits(2).unwrap().is_empty());
    }

    #[test]
    fn test_checkpoint_txid_is_monotonic_and_purges() {
        let dir = tempdir().unwrap();
        let nn = open(dir.path());
        for i in 0..4 {
            nn.mkdir(&format!("/d{}", i)).unwrap();
            nn.namesystem().edit_log().roll().unwrap();
        }
        assert_eq!(nn.namesystem().edit_log().flushed_ranges().len(), 4);

        assert_eq!(nn.update_checkpoint_txid(2).unwrap(), 2);
        assert_eq!(nn.update_checkpoint_txid(1).unwrap(), 2);
        assert_eq!(nn.checkpoint_txid(), 2);
        assert_eq!(nn.namesystem().edit_log().flushed_ranges().len(), 2);

        let persisted = std::fs::read_to_string(dir.path().join("checkpoint-txid.meta")).unwrap();
        assert_eq!(persisted, "2");
    }

    #[test]
    fn test_checkpoint_ahead_of_log_is_rejected() {
        let dir = tempdir().unwrap();
        let nn = open(dir.path());
        nn.mkdir("/a").unwrap();
        nn.mkdir("/b").unwrap();
        nn.namesystem().edit_log().roll().unwrap();

        let err = nn.update_checkpoint_txid(1000).unwrap_err();
        assert!(matches!(err, NodeError::InvalidInput(_)));
        assert_eq!(nn.checkpoint_txid(), 0);
        assert_eq!(nn.namesystem().edit_log().flushed_ranges().len(), 1);
        assert!(!dir.path().join("checkpoint-txid.meta").exists());

        nn.shutdown_close().unwrap();
        drop(nn);

        let reopened = open(dir.path());
        assert_eq!(reopened.namesystem().applied_txid(), 2);
        assert!(reopened.namesystem().with_directory(|d| d.lookup("/a").is_some()));
        assert_eq!(reopened.checkpoint_txid(), 0);
    }

    #[test]
    fn test_shutdown_close_flushes_and_rejects() {
        let dir = tempdir().unwrap();
        let nn = open(dir.path());
        nn.mkdir("/kept").unwrap();
        nn.update_checkpoint_txid(1).unwrap();
        nn.shutdown_close().unwrap();

        assert!(nn.shutdown_token().is_cancelled());
        assert!(!nn.mkdir("/late").unwrap());
        assert!(nn.fetch_edits(0).unwrap().is_empty());
        drop(nn);

        let reopened = open(dir.path());
        assert_eq!(reopened.checkpoint_txid(), 1);
        assert_eq!(reopened.namesystem().applied_txid(), 1);
        assert!(reopened.namesystem().with_directory(|d| d.lookup("/kept").is_some()));
    }

    #[test]
    fn test_allocation_uses_replica_count() {
        let dir = tempdir().unwrap();
        let nn = open(dir.path());
        for n in 1..=3 {
            nn.register(NodeId::new(format!("10.0.0.{}", n), format!("dn{}", n)));
        }
        assert_eq!(nn.allocate_replica_targets("part-0", 64).len(), 2);
        assert!(nn.heartbeat(&NodeId::new("10.0.0.9", "ghost")).is_err());
    }

    #[tokio::test]
    async fn test_flusher_rolls_full_buffer() {
        let dir = tempdir().unwrap();
        let mut cfg = NodeConfig::with_data_dir(dir.path());
        cfg.segment_size_bytes = 64;
        cfg.flush_check_interval = Duration::from_millis(10);
        let nn = NameNode::open(cfg).unwrap();
        let handles = nn.spawn_background_tasks();

        for i in 0..4 {
            nn.mkdir(&format!("/dir{}", i)).unwrap();
        }
        let log = nn.namesystem().edit_log().clone();
        for _ in 0..100 {
            if !log.flushed_ranges().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(log.flushed_ranges()[0].start_txid, 1);

        nn.shutdown_close().unwrap();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
