// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Storage-node agent: keeps one node registered with the Primary.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::errors::NodeError;
use crate::network::NameNodeClient;
use crate::registry::NodeId;

/// Register (retrying until the Primary answers), then heartbeat every
/// `interval`. A heartbeat rejected as unregistered, e.g. after eviction,
/// triggers a fresh registration.
pub async fn run_datanode_agent(client: NameNodeClient, id: NodeId, interval: Duration, token: CancellationToken) {
    let mut registered = false;
    loop {
        if !registered {
            match client.register(&id).await {
                Ok(_) => {
                    tracing::info!("Registered {} with {}", id, client.base_url());
                    registered = true;
                }
                Err(e) => tracing::warn!("Registration of {} failed: {}", id, e),
            }
        } else {
            match client.heartbeat(&id).await {
                Ok(_) => tracing::debug!("Heartbeat from {} accepted", id),
                Err(NodeError::NotRegistered(_)) => {
                    tracing::warn!("{} is no longer registered; registering again", id);
                    registered = false;
                    continue;
                }
                Err(e) => tracing::warn!("Heartbeat from {} failed: {}", id, e),
            }
        }

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    tracing::info!("Storage node agent for {} stopped", id);
}
