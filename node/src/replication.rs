// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! The Backup: tails the Primary's edit log and ships checkpoints back.
//!
//! Lifecycle: `Recovering` (local image + checkpoint info + local segments)
//! then `Tailing`, where the fetch loop and the checkpoint loop run side by
//! side until shutdown.
//!
//! Log shipping is pull-based and cursor driven: each fetch asks for records
//! after the local applied txid, so a retried or repeated batch is skipped
//! rather than applied twice.

use parking_lot::Mutex;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::{backup_image_name, NodeConfig};
use crate::errors::{NodeError, NodeResult};
use crate::image_transfer::upload_image;
use crate::namenode::run_flusher;
use crate::namesystem::Namesystem;
use crate::network::NameNodeClient;
use crate::persistence::{write_atomic, CheckpointInfo};
use crate::recovery::load_image;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReplicationState {
    Recovering,
    Tailing,
}

pub struct BackupNode {
    config: NodeConfig,
    client: NameNodeClient,
    primary_image_addr: SocketAddr,
    namesystem: OnceLock<Arc<Namesystem>>,
    state: Mutex<ReplicationState>,
    last_checkpoint: Mutex<Option<CheckpointInfo>>,
    shutdown: CancellationToken,
}

impl BackupNode {
    pub fn new(config: NodeConfig, client: NameNodeClient, primary_image_addr: SocketAddr) -> Self {
        Self {
            config,
            client,
            primary_image_addr,
            namesystem: OnceLock::new(),
            state: Mutex::new(ReplicationState::Recovering),
            last_checkpoint: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> ReplicationState {
        *self.state.lock()
    }

    /// The local namesystem, once recovery has finished.
    pub fn namesystem(&self) -> Option<&Arc<Namesystem>> {
        self.namesystem.get()
    }

    pub fn applied_txid(&self) -> u64 {
        self.namesystem().map(|ns| ns.applied_txid()).unwrap_or(0)
    }

    pub fn last_checkpoint(&self) -> Option<CheckpointInfo> {
        self.last_checkpoint.lock().clone()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Rebuild the local namespace and switch to `Tailing`.
    pub fn recover(&self) -> NodeResult<()> {
        std::fs::create_dir_all(&self.config.data_dir)?;

        let info = CheckpointInfo::load(&self.config.checkpoint_info_path())?;
        let image = match &info {
            Some(info) => {
                let image = load_image(&self.config.resolve(&info.image_file))?;
                if image.is_none() {
                    tracing::warn!("Checkpoint image {} is missing; replaying local edits only", info.image_file);
                }
                image
            }
            None => None,
        };
        let checkpoint_txid = info.as_ref().map(|i| i.txid).unwrap_or(0);

        let namesystem = Namesystem::recover(
            &self.config.edits_dir(),
            self.config.segment_size_bytes,
            image,
            checkpoint_txid,
        )?;
        let applied = namesystem.applied_txid();
        if self.namesystem.set(Arc::new(namesystem)).is_err() {
            return Err(NodeError::Internal("Backup recovered twice".to_string()));
        }
        *self.last_checkpoint.lock() = info;
        *self.state.lock() = ReplicationState::Tailing;
        tracing::info!("Backup recovered at txid {}; tailing {}", applied, self.client.base_url());
        Ok(())
    }

    /// Recover, then run the fetch, checkpoint and flush loops until
    /// shutdown.
    pub async fn run(self: Arc<Self>) -> NodeResult<()> {
        let fetcher = tokio::spawn(self.clone().run_fetch_loop());
        let checkpointer = tokio::spawn(self.clone().run_checkpoint_loop());

        let node = self.clone();
        let recovered = tokio::task::spawn_blocking(move || node.recover())
            .await
            .map_err(|e| NodeError::Internal(e.to_string()))?;
        if let Err(e) = recovered {
            tracing::error!("Backup recovery failed: {}", e);
            self.shutdown.cancel();
            return Err(e);
        }

        if let Some(ns) = self.namesystem() {
            tokio::spawn(run_flusher(
                ns.edit_log().clone(),
                self.config.flush_check_interval,
                self.shutdown.clone(),
            ));
        }

        let _ = fetcher.await;
        let _ = checkpointer.await;
        Ok(())
    }

    /// Stop the loops and flush the local WAL.
    pub fn shutdown(&self) -> NodeResult<()> {
        self.shutdown.cancel();
        if let Some(ns) = self.namesystem() {
            ns.shutdown();
            ns.edit_log().force_sync()?;
        }
        tracing::info!("Backup shut down at txid {}", self.applied_txid());
        Ok(())
    }

    /// Fetch and apply one batch. Returns how many records were applied.
    pub async fn fetch_once(&self) -> NodeResult<usize> {
        let Some(ns) = self.tailing_namesystem() else {
            return Ok(0);
        };
        let after = ns.applied_txid();
        let records = self.client.fetch_edits(after).await?;

        let mut applied = 0;
        for record in &records {
            if ns.apply(record)? {
                applied += 1;
            }
        }
        if applied > 0 {
            tracing::debug!("Applied {} edits, now at txid {}", applied, ns.applied_txid());
        }
        Ok(applied)
    }

    /// Take, persist, upload and report one checkpoint.
    ///
    /// Returns the checkpoint txid, or `None` when nothing changed since the
    /// previous checkpoint.
    pub async fn checkpoint_once(&self) -> NodeResult<Option<u64>> {
        let Some(ns) = self.tailing_namesystem() else {
            return Ok(None);
        };
        let (txid, bytes) = ns.snapshot()?;
        let previous = self.last_checkpoint();
        if previous.as_ref().map(|p| p.txid) == Some(txid) {
            tracing::debug!("No new edits since checkpoint {}", txid);
            return Ok(None);
        }

        let image_path = self.config.backup_image_path(txid);
        let image = bytes.clone();
        tokio::task::spawn_blocking(move || write_atomic(&image_path, &image))
            .await
            .map_err(|e| NodeError::Internal(e.to_string()))??;

        upload_image(self.primary_image_addr, &bytes).await?;
        let accepted = self.client.update_checkpoint_txid(txid).await?;

        let info = CheckpointInfo::new(txid, backup_image_name(txid));
        info.save(&self.config.checkpoint_info_path())?;
        *self.last_checkpoint.lock() = Some(info);

        // Only once the new image is referenced by the checkpoint info.
        if let Some(previous) = previous {
            if previous.image_file != backup_image_name(txid) {
                let old = self.config.resolve(&previous.image_file);
                if let Err(e) = std::fs::remove_file(&old) {
                    tracing::warn!("Could not delete old image {:?}: {}", old, e);
                }
            }
        }
        if self.config.purge_checkpointed_segments {
            ns.edit_log().purge_segments_through(txid)?;
        }

        tracing::info!(
            "Checkpoint at txid {} uploaded ({} bytes); Primary checkpoint txid {}",
            txid,
            bytes.len(),
            accepted
        );
        Ok(Some(txid))
    }

    async fn run_fetch_loop(self: Arc<Self>) {
        while !self.shutdown.is_cancelled() {
            if self.tailing_namesystem().is_none() {
                self.pause(self.config.recovery_poll_interval).await;
                continue;
            }
            match self.fetch_once().await {
                Ok(0) => self.pause(self.config.fetch_backoff).await,
                Ok(_) => {}
                Err(e) => {
                    if e.is_transient() {
                        tracing::warn!("Edit fetch failed, retrying: {}", e);
                    } else {
                        tracing::error!("Edit fetch failed: {}", e);
                    }
                    self.pause(self.config.fetch_backoff).await;
                }
            }
        }
        tracing::debug!("Edit fetch loop stopped");
    }

    async fn run_checkpoint_loop(self: Arc<Self>) {
        while !self.shutdown.is_cancelled() {
            if self.tailing_namesystem().is_none() {
                self.pause(self.config.recovery_poll_interval).await;
                continue;
            }
            self.pause(self.config.checkpoint_interval).await;
            if self.shutdown.is_cancelled() {
                break;
            }
            if let Err(e) = self.checkpoint_once().await {
                tracing::error!("Checkpoint failed: {}", e);
            }
        }
        tracing::debug!("Checkpoint loop stopped");
    }

    fn tailing_namesystem(&self) -> Option<&Arc<Namesystem>> {
        match self.state() {
            ReplicationState::Tailing => self.namesystem(),
            ReplicationState::Recovering => None,
        }
    }

    async fn pause(&self, delay: Duration) {
        tokio::select! {
            _ = self.shutdown.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
