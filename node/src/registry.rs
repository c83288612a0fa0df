// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Storage-node membership, liveness and replica placement.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::errors::{NodeError, NodeResult};
use crate::persistence::now_millis;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    pub ip: String,
    pub hostname: String,
}

impl NodeId {
    pub fn new(ip: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            hostname: hostname.into(),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.hostname, self.ip)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub ip: String,
    pub hostname: String,
    /// Milliseconds since the Unix epoch.
    pub last_heartbeat: u64,
    pub stored_bytes: u64,
}

impl NodeInfo {
    pub fn id(&self) -> NodeId {
        NodeId::new(&self.ip, &self.hostname)
    }
}

pub struct NodeRegistry {
    nodes: DashMap<NodeId, NodeInfo>,
    /// Serializes allocations so each one sees the load left by the previous.
    placement: Mutex<()>,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
            placement: Mutex::new(()),
        }
    }

    /// Insert or overwrite a node with zero stored bytes.
    pub fn register(&self, id: NodeId) {
        self.register_at(id, now_millis());
    }

    pub fn register_at(&self, id: NodeId, now_ms: u64) {
        tracing::info!("Storage node {} registered", id);
        let info = NodeInfo {
            ip: id.ip.clone(),
            hostname: id.hostname.clone(),
            last_heartbeat: now_ms,
            stored_bytes: 0,
        };
        self.nodes.insert(id, info);
        metrics::gauge!("dfs_datanodes_live", self.nodes.len() as f64);
    }

    /// Refresh a node's heartbeat. Unknown (or evicted) ids must re-register.
    pub fn heartbeat(&self, id: &NodeId) -> NodeResult<()> {
        self.heartbeat_at(id, now_millis())
    }

    pub fn heartbeat_at(&self, id: &NodeId, now_ms: u64) -> NodeResult<()> {
        match self.nodes.get_mut(id) {
            Some(mut info) => {
                info.last_heartbeat = now_ms;
                Ok(())
            }
            None => {
                tracing::warn!("Heartbeat from unregistered storage node {}", id);
                Err(NodeError::NotRegistered(id.to_string()))
            }
        }
    }

    /// Pick up to `replica_count` least-loaded nodes and charge each with
    /// `size_bytes`. Ties are broken by node id.
    pub fn allocate(&self, size_bytes: u64, replica_count: usize) -> Vec<NodeInfo> {
        let _placement = self.placement.lock();

        let mut candidates: Vec<(u64, NodeId)> = self
            .nodes
            .iter()
            .map(|entry| (entry.stored_bytes, entry.key().clone()))
            .collect();
        candidates.sort();

        let mut targets = Vec::with_capacity(replica_count);
        for (_, id) in candidates.into_iter().take(replica_count) {
            // Evicted since the membership snapshot.
            if let Some(mut info) = self.nodes.get_mut(&id) {
                info.stored_bytes = info.stored_bytes.saturating_add(size_bytes);
                targets.push(info.clone());
            }
        }
        targets
    }

    /// Remove every node whose last heartbeat is older than `timeout`.
    ///
    /// Stale ids are collected from a point-in-time scan first and then
    /// removed, so the map is never mutated while being iterated.
    pub fn evict_stale(&self, now_ms: u64, timeout: Duration) -> Vec<NodeId> {
        let stale = self.stale_ids(now_ms, timeout);
        let evicted = self.remove_stale(stale, now_ms, timeout);

        if !evicted.is_empty() {
            metrics::counter!("dfs_datanodes_evicted_total", evicted.len() as u64);
        }
        metrics::gauge!("dfs_datanodes_live", self.nodes.len() as f64);
        evicted
    }

    fn stale_ids(&self, now_ms: u64, timeout: Duration) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|entry| is_stale(entry.value(), now_ms, timeout))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Remove `ids` that are still stale. A node that heartbeat after the scan
    /// is kept.
    fn remove_stale(&self, ids: Vec<NodeId>, now_ms: u64, timeout: Duration) -> Vec<NodeId> {
        let mut evicted = Vec::with_capacity(ids.len());
        for id in ids {
            if self
                .nodes
                .remove_if(&id, |_, info| is_stale(info, now_ms, timeout))
                .is_some()
            {
                tracing::warn!("Evicting storage node {}: no heartbeat for over {:?}", id, timeout);
                evicted.push(id);
            }
        }
        evicted
    }

    pub fn get(&self, id: &NodeId) -> Option<NodeInfo> {
        self.nodes.get(id).map(|info| info.clone())
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Current membership, sorted by id.
    pub fn members(&self) -> Vec<NodeInfo> {
        let mut members: Vec<NodeInfo> = self.nodes.iter().map(|entry| entry.value().clone()).collect();
        members.sort_by_key(NodeInfo::id);
        members
    }
}

fn is_stale(info: &NodeInfo, now_ms: u64, timeout: Duration) -> bool {
    u128::from(now_ms.saturating_sub(info.last_heartbeat)) > timeout.as_millis()
}

/// Sweep the registry every `interval` until `token` is cancelled.
pub async fn run_liveness_monitor(
    registry: Arc<NodeRegistry>,
    interval: Duration,
    timeout: Duration,
    token: CancellationToken,
) {
    tracing::info!("Liveness monitor started (interval {:?}, timeout {:?})", interval, timeout);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        registry.evict_stale(now_millis(), timeout);
    }
    tracing::info!("Liveness monitor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: u64 = 1000;

    fn node(n: u8) -> NodeId {
        NodeId::new(format!("10.0.0.{}", n), format!("dn{}", n))
    }

    fn stored(registry: &NodeRegistry, id: &NodeId) -> u64 {
        registry.get(id).unwrap().stored_bytes
    }

    fn set_stored(registry: &NodeRegistry, id: &NodeId, bytes: u64) {
        registry.nodes.get_mut(id).unwrap().stored_bytes = bytes;
    }

    #[test]
    fn test_register_and_heartbeat() {
        let registry = NodeRegistry::new();
        registry.register_at(node(1), 10);
        assert_eq!(registry.get(&node(1)).unwrap().last_heartbeat, 10);

        registry.heartbeat_at(&node(1), 20).unwrap();
        assert_eq!(registry.get(&node(1)).unwrap().last_heartbeat, 20);

        let err = registry.heartbeat_at(&node(2), 20).unwrap_err();
        assert!(matches!(err, NodeError::NotRegistered(_)));
        assert!(!registry.contains(&node(2)));
    }

    #[test]
    fn test_reregistration_overwrites() {
        let registry = NodeRegistry::new();
        registry.register_at(node(1), 10);
        set_stored(&registry, &node(1), 500);
        registry.register_at(node(1), 30);
        let info = registry.get(&node(1)).unwrap();
        assert_eq!(info.stored_bytes, 0);
        assert_eq!(info.last_heartbeat, 30);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_allocate_prefers_least_loaded() {
        let registry = NodeRegistry::new();
        for (n, bytes) in [(1, 100), (2, 50), (3, 200)] {
            registry.register_at(node(n), 0);
            set_stored(&registry, &node(n), bytes);
        }

        let first = registry.allocate(10, 2);
        let picked: Vec<_> = first.iter().map(|i| (i.id(), i.stored_bytes)).collect();
        assert_eq!(picked, vec![(node(2), 60), (node(1), 110)]);
        assert_eq!(stored(&registry, &node(2)), 60);
        assert_eq!(stored(&registry, &node(1)), 110);
        assert_eq!(stored(&registry, &node(3)), 200);

        let second = registry.allocate(10, 2);
        let picked: Vec<_> = second.iter().map(|i| i.id()).collect();
        assert_eq!(picked, vec![node(2), node(1)]);
    }

    #[test]
    fn test_allocate_with_small_membership_and_ties() {
        let registry = NodeRegistry::new();
        assert!(registry.allocate(10, 2).is_empty());

        registry.register_at(node(2), 0);
        registry.register_at(node(1), 0);
        let only = registry.allocate(5, 3);
        assert_eq!(only.len(), 2);
        // Equal load: ordered by id.
        assert_eq!(only[0].id(), node(1));
        assert_eq!(only[1].id(), node(2));
    }

    #[test]
    fn test_liveness_sweep() {
        let registry = NodeRegistry::new();
        let now = 1_000 * SECOND;
        registry.register_at(node(1), now - 91 * SECOND);
        registry.register_at(node(2), now - 89 * SECOND);

        let evicted = registry.evict_stale(now, Duration::from_secs(90));
        assert_eq!(evicted, vec![node(1)]);
        assert!(!registry.contains(&node(1)));
        assert!(registry.contains(&node(2)));

        // An evicted node must register again.
        assert!(registry.heartbeat_at(&node(1), now).is_err());
        registry.register_at(node(1), now);
        registry.heartbeat_at(&node(1), now + SECOND).unwrap();
    }

    #[test]
    fn test_heartbeat_after_scan_survives_eviction() {
        let registry = NodeRegistry::new();
        let now = 1_000 * SECOND;
        let timeout = Duration::from_secs(90);
        registry.register_at(node(1), now - 120 * SECOND);
        registry.register_at(node(2), now - 120 * SECOND);

        let stale = registry.stale_ids(now, timeout);
        assert_eq!(stale.len(), 2);

        // node(1) heartbeats while the sweep is between its two steps.
        registry.heartbeat_at(&node(1), now).unwrap();

        let evicted = registry.remove_stale(stale, now, timeout);
        assert_eq!(evicted, vec![node(2)]);
        assert!(registry.contains(&node(1)));
        assert!(!registry.contains(&node(2)));
        registry.heartbeat_at(&node(1), now + SECOND).unwrap();
    }

    #[tokio::test]
    async fn test_monitor_stops_on_cancel() {
        let registry = Arc::new(NodeRegistry::new());
        registry.register_at(node(1), 0);
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_liveness_monitor(
            registry.clone(),
            Duration::from_millis(10),
            Duration::from_secs(90),
            token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        handle.await.unwrap();
        assert!(registry.is_empty());
    }
}
