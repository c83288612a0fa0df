// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use std::sync::OnceLock;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize telemetry (logs + metrics)
pub fn init_telemetry() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "dfs_node=debug,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROM_HANDLE.set(handle).is_err() {
                tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
            }
        }
        Err(e) => tracing::error!("Failed to install Prometheus recorder: {}", e),
    }

    metrics::describe_counter!("dfs_edits_appended_total", "Edit records appended to the WAL");
    metrics::describe_counter!("dfs_segments_flushed_total", "WAL segments sealed to disk");
    metrics::describe_histogram!("dfs_segment_flush_duration_seconds", "Time taken to write and fsync one segment");
    metrics::describe_counter!("dfs_edits_fetched_total", "Edit records served to log fetchers");
    metrics::describe_gauge!("dfs_checkpoint_txid", "Latest checkpoint txid");
    metrics::describe_gauge!("dfs_datanodes_live", "Registered storage nodes");
    metrics::describe_counter!("dfs_datanodes_evicted_total", "Storage nodes evicted by the liveness monitor");
    metrics::describe_histogram!("dfs_replay_duration_seconds", "Time taken to replay WAL segments during recovery");

    metrics::gauge!("dfs_node_up", 1.0);
}

/// Get the Prometheus handle to render metrics
pub fn get_metrics() -> String {
    if let Some(handle) = PROM_HANDLE.get() {
        handle.render()
    } else {
        "# metrics not initialized".to_string()
    }
}
