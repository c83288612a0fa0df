use dfs_cli::commands::{checkpoint, image, replay, segments};
use dfs_namespace::snapshot::encode::encode_image;
use dfs_namespace::FsDirectory;
use dfs_node::config::NodeConfig;
use dfs_node::namenode::NameNode;
use dfs_node::persistence::{write_atomic, CheckpointInfo};
use tempfile::tempdir;

#[test]
fn test_inspection_workflow() {
    let dir = tempdir().unwrap();
    let cfg = NodeConfig::with_data_dir(dir.path());
    {
        let node = NameNode::open(cfg.clone()).unwrap();
        node.mkdir("/data/in").unwrap();
        node.create_file("/data/in/a.csv").unwrap();
        node.namesystem().edit_log().roll().unwrap();
        node.create_file("/data/in/b.csv").unwrap();
        node.shutdown_close().unwrap();
    }

    assert!(segments::run(dir.path()).is_ok());
    assert!(checkpoint::run(dir.path()).is_ok());
    assert!(replay::run(dir.path()).is_ok());

    // Empty directories are reported, not errors.
    let empty = tempdir().unwrap();
    assert!(segments::run(empty.path()).is_ok());
    assert!(checkpoint::run(empty.path()).is_ok());
}

#[test]
fn test_backup_directory_replay() {
    let dir = tempdir().unwrap();
    let cfg = NodeConfig::with_data_dir(dir.path());

    let mut tree = FsDirectory::new();
    tree.mkdir("/a/b").unwrap();
    tree.create_file("/a/b/f").unwrap();
    write_atomic(&cfg.backup_image_path(2), &encode_image(2, tree.root()).unwrap()).unwrap();
    CheckpointInfo::new(2, "fsimage-2.json")
        .save(&cfg.checkpoint_info_path())
        .unwrap();

    assert!(image::run(&cfg.backup_image_path(2)).is_ok());
    assert!(checkpoint::run(dir.path()).is_ok());

    let summary = replay::rebuild(dir.path()).unwrap();
    assert_eq!(summary.image_txid, Some(2));
    assert_eq!(summary.floor, 2);
    assert_eq!(summary.last_txid, 2);
    assert_eq!(summary.digest, tree.digest());
}

#[test]
fn test_image_rejects_garbage() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fsimage.json");
    std::fs::write(&path, b"garbage").unwrap();
    assert!(image::run(&path).is_err());
    assert!(image::run(&dir.path().join("missing.json")).is_err());
}
