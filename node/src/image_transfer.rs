// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Namespace image upload channel (Backup -> Primary).
//!
//! # Wire Format
//! ```text
//! client: [len: u64 BE][image bytes; len]
//! server: "SUCCESS"        (only after the image is durable)
//! ```
//! One upload per connection. Invalid uploads, and images older than the
//! persisted checkpoint txid, are dropped without a reply.

use dfs_namespace::snapshot::decode::decode_image;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::errors::{NodeError, NodeResult};
use crate::persistence::{write_atomic, CheckpointStore};

pub const UPLOAD_ACK: &[u8] = b"SUCCESS";
/// Refuse length prefixes beyond this.
pub const MAX_IMAGE_BYTES: u64 = 1 << 30;

pub struct ImageUploadServer {
    listener: TcpListener,
    image_path: PathBuf,
    checkpoints: CheckpointStore,
}

impl ImageUploadServer {
    pub async fn bind(
        addr: SocketAddr,
        image_path: impl Into<PathBuf>,
        checkpoints: CheckpointStore,
    ) -> NodeResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            image_path: image_path.into(),
            checkpoints,
        })
    }

    pub fn local_addr(&self) -> NodeResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept uploads until `token` is cancelled.
    pub async fn run(self, token: CancellationToken) {
        tracing::info!("Image upload channel listening on {:?}", self.listener.local_addr().ok());
        loop {
            let (stream, peer) = tokio::select! {
                _ = token.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!("Image channel accept failed: {}", e);
                        continue;
                    }
                },
            };
            let image_path = self.image_path.clone();
            let checkpoints = self.checkpoints.clone();
            tokio::spawn(async move {
                match receive_image(stream, &image_path, checkpoints).await {
                    Ok(txid) => tracing::info!("Stored namespace image at txid {} from {}", txid, peer),
                    Err(e) => tracing::error!("Image upload from {} failed: {}", peer, e),
                }
            });
        }
        tracing::info!("Image upload channel stopped");
    }
}

async fn receive_image(
    mut stream: TcpStream,
    image_path: &Path,
    checkpoints: CheckpointStore,
) -> NodeResult<u64> {
    let len = stream.read_u64().await?;
    if len > MAX_IMAGE_BYTES {
        return Err(NodeError::InvalidInput(format!("Image of {} bytes exceeds limit", len)));
    }
    let mut payload = vec![0u8; len as usize];
    stream.read_exact(&mut payload).await?;

    let txid = decode_image(&payload)?.txid;

    let path = image_path.to_path_buf();
    tokio::task::spawn_blocking(move || -> NodeResult<()> {
        let floor = checkpoints.load()?;
        if txid < floor {
            return Err(NodeError::InvalidInput(format!(
                "Image at txid {} is older than checkpoint txid {}",
                txid, floor
            )));
        }
        write_atomic(&path, &payload)?;
        Ok(())
    })
    .await
    .map_err(|e| NodeError::Internal(e.to_string()))??;

    stream.write_all(UPLOAD_ACK).await?;
    stream.flush().await?;
    Ok(txid)
}

/// Send an encoded image to the Primary's upload channel and wait for the ack.
pub async fn upload_image(addr: SocketAddr, bytes: &[u8]) -> NodeResult<()> {
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|e| NodeError::Network(format!("Connect to image channel {} failed: {}", addr, e)))?;

    stream.write_u64(bytes.len() as u64).await?;
    stream.write_all(bytes).await?;
    stream.flush().await?;

    let mut reply = Vec::with_capacity(UPLOAD_ACK.len());
    (&mut stream)
        .take(UPLOAD_ACK.len() as u64)
        .read_to_end(&mut reply)
        .await?;

    if reply != UPLOAD_ACK {
        return Err(NodeError::Network(format!(
            "Image upload not acknowledged (reply {:?})",
            String::from_utf8_lossy(&reply)
        )));
    }
    Ok(())
}
