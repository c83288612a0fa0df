use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use dfs_node::api::*;
use dfs_node::config::NodeConfig;
use dfs_node::namenode::NameNode;
use dfs_node::registry::NodeId;
use dfs_node::server::build_router;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt; // for oneshot

fn app(dir: &std::path::Path) -> (Router, Arc<NameNode>) {
    let node = Arc::new(NameNode::open(NodeConfig::with_data_dir(dir)).unwrap());
    (build_router(node.clone()), node)
}

async fn call<B: Serialize, T: DeserializeOwned>(app: &Router, method: &str, uri: &str, body: Option<&B>) -> (StatusCode, T) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let body = match body {
        Some(b) => Body::from(serde_json::to_vec(b).unwrap()),
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_mkdir_create_and_fetch() {
    let dir = tempdir().unwrap();
    let (app, _node) = app(dir.path());

    let (status, resp): (_, MutationResponse) =
        call(&app, "POST", "/v1/namespace/mkdir", Some(&MkdirRequest { path: "/a/b".into() })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(resp.success);

    let create = CreateFileRequest { path: "/a/b/f".into() };
    let (_, first): (_, MutationResponse) = call(&app, "POST", "/v1/namespace/create", Some(&create)).await;
    let (_, dup): (_, MutationResponse) = call(&app, "POST", "/v1/namespace/create", Some(&create)).await;
    assert!(first.success);
    assert!(!dup.success);

    let (status, edits): (_, FetchEditsResponse) =
        call::<(), _>(&app, "GET", "/v1/replication/edits?after_txid=0", None).await;
    assert_eq!(status, StatusCode::OK);
    let txids: Vec<_> = edits.records.iter().map(|r| r.txid).collect();
    assert_eq!(txids, vec![1, 2]);

    let (_, empty): (_, FetchEditsResponse) =
        call::<(), _>(&app, "GET", "/v1/replication/edits?after_txid=2", None).await;
    let (status, beyond): (_, FetchEditsResponse) =
        call::<(), _>(&app, "GET", &format!("/v1/replication/edits?after_txid={}", u64::MAX), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(beyond.records.is_empty());
    assert!(empty.records.is_empty());

    let (_, digest): (_, DigestResponse) = call::<(), _>(&app, "GET", "/v1/namespace/digest", None).await;
    assert_eq!(digest.txid, 2);
    assert_eq!(digest.files, 1);
    assert_eq!(digest.directories, 3);
}

#[tokio::test]
async fn test_mkdir_through_file_is_conflict() {
    let dir = tempdir().unwrap();
    let (app, _node) = app(dir.path());

    let _: (_, MutationResponse) =
        call(&app, "POST", "/v1/namespace/create", Some(&CreateFileRequest { path: "/f".into() })).await;
    let (status, body): (_, serde_json::Value) =
        call(&app, "POST", "/v1/namespace/mkdir", Some(&MkdirRequest { path: "/f/g".into() })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("not a directory"));
}

#[tokio::test]
async fn test_datanode_registry_routes() {
    let dir = tempdir().unwrap();
    let (app, node) = app(dir.path());

    for n in 1..=3 {
        let id = NodeId::new(format!("10.0.0.{}", n), format!("dn{}", n));
        let (_, resp): (_, DataNodeResponse) = call(&app, "POST", "/v1/datanode/register", Some(&id)).await;
        assert!(resp.success);
    }

    let ghost = NodeId::new("10.9.9.9", "ghost");
    let (status, _): (_, serde_json::Value) = call(&app, "POST", "/v1/datanode/heartbeat", Some(&ghost)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let known = NodeId::new("10.0.0.2", "dn2");
    let (status, _): (_, DataNodeResponse) = call(&app, "POST", "/v1/datanode/heartbeat", Some(&known)).await;
    assert_eq!(status, StatusCode::OK);

    let req = AllocateRequest {
        file_name: "part-00000".into(),
        size_bytes: 128,
    };
    let (_, resp): (_, AllocateResponse) = call(&app, "POST", "/v1/datanode/allocate", Some(&req)).await;
    assert_eq!(resp.targets.len(), 2);
    assert!(resp.targets.iter().all(|t| t.stored_bytes == 128));
    assert_eq!(node.registry().members().iter().map(|m| m.stored_bytes).sum::<u64>(), 256);
}

#[tokio::test]
async fn test_checkpoint_and_shutdown_routes() {
    let dir = tempdir().unwrap();
    let (app, node) = app(dir.path());
    node.mkdir("/x").unwrap();
    node.mkdir("/y").unwrap();

    let (_, resp): (_, CheckpointResponse) =
        call(&app, "POST", "/v1/replication/checkpoint", Some(&CheckpointRequest { txid: 2 })).await;
    assert_eq!(resp.checkpoint_txid, 2);
    let (_, resp): (_, CheckpointResponse) =
        call(&app, "POST", "/v1/replication/checkpoint", Some(&CheckpointRequest { txid: 1 })).await;
    assert_eq!(resp.checkpoint_txid, 2);
    let (status, _): (_, serde_json::Value) =
        call(&app, "POST", "/v1/replication/checkpoint", Some(&CheckpointRequest { txid: 99 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(node.checkpoint_txid(), 2);

    let (status, resp): (_, ShutdownResponse) =
        call(&app, "POST", "/v1/admin/shutdown", Some(&serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp.last_txid, 2);
    assert_eq!(resp.checkpoint_txid, 2);

    // Rejected, not an error.
    let (status, resp): (_, MutationResponse) =
        call(&app, "POST", "/v1/namespace/mkdir", Some(&MkdirRequest { path: "/z".into() })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!resp.success);
    assert!(dir.path().join("edits").join("1_2.log").exists());
}
