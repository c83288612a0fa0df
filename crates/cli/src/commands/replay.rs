use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use dfs_namespace::{FsDirectory, NamespaceStats};
use dfs_node::config::NodeConfig;
use dfs_node::persistence::{CheckpointInfo, CheckpointStore};
use dfs_node::recovery::{load_image, replay_floor, replay_segments};
use std::path::Path;

#[derive(Debug)]
pub struct ReplaySummary {
    pub image_txid: Option<u64>,
    pub checkpoint_txid: u64,
    pub floor: u64,
    pub applied: usize,
    pub last_txid: u64,
    pub stats: NamespaceStats,
    pub digest: String,
}

/// Rebuild the namespace the way a restart would, without opening the log
/// for writing. Works on both Primary and Backup directories.
pub fn rebuild(data_dir: &Path) -> anyhow::Result<ReplaySummary> {
    let cfg = NodeConfig::with_data_dir(data_dir);

    let (image_path, checkpoint_txid) = match CheckpointInfo::load(&cfg.checkpoint_info_path())? {
        Some(info) => (cfg.resolve(&info.image_file), info.txid),
        None => (
            cfg.primary_image_path(),
            CheckpointStore::new(cfg.checkpoint_txid_path()).load()?,
        ),
    };

    let image = load_image(&image_path)?;
    let image_txid = image.as_ref().map(|i| i.txid);
    let floor = replay_floor(image_txid, checkpoint_txid);
    let mut directory = match image {
        Some(image) => image.into_directory()?.1,
        None => FsDirectory::new(),
    };

    let outcome = replay_segments(&mut directory, &cfg.edits_dir(), floor)?;
    Ok(ReplaySummary {
        image_txid,
        checkpoint_txid,
        floor,
        applied: outcome.applied,
        last_txid: outcome.last_txid.max(image_txid.unwrap_or(0)),
        stats: directory.stats(),
        digest: directory.digest(),
    })
}

pub fn run(data_dir: &Path) -> anyhow::Result<()> {
    let summary = rebuild(data_dir)?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Property", "Value"]);

    let image_txid = summary
        .image_txid
        .map(|t| t.to_string())
        .unwrap_or_else(|| "none".to_string());
    table.add_row(vec!["Image Txid", &image_txid]);
    table.add_row(vec!["Checkpoint Txid", &summary.checkpoint_txid.to_string()]);
    table.add_row(vec!["Replay Floor", &summary.floor.to_string()]);
    table.add_row(vec!["Records Replayed", &summary.applied.to_string()]);
    table.add_row(vec!["Final Txid", &summary.last_txid.to_string()]);
    table.add_row(vec!["Directories", &summary.stats.directories.to_string()]);
    table.add_row(vec!["Files", &summary.stats.files.to_string()]);
    table.add_row(vec!["Digest", &summary.digest]);

    println!("\nReplay\n");
    println!("{table}\n");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dfs_node::namenode::NameNode;
    use tempfile::tempdir;

    #[test]
    fn test_rebuild_matches_live_namespace() {
        let dir = tempdir().unwrap();
        let node = NameNode::open(NodeConfig::with_data_dir(dir.path())).unwrap();
        node.mkdir("/logs/2024").unwrap();
        node.create_file("/logs/2024/app.log").unwrap();
        node.namesystem().edit_log().roll().unwrap();
        node.create_file("/logs/2024/db.log").unwrap();
        node.shutdown_close().unwrap();
        let (txid, digest) = node.namesystem().digest();

        let summary = rebuild(dir.path()).unwrap();
        assert_eq!(summary.image_txid, None);
        assert_eq!(summary.floor, 0);
        assert_eq!(summary.applied, 3);
        assert_eq!(summary.last_txid, txid);
        assert_eq!(summary.digest, digest);
        assert_eq!(summary.stats.files, 2);
    }

    #[test]
    fn test_rebuild_empty_directory() {
        let dir = tempdir().unwrap();
        let summary = rebuild(dir.path()).unwrap();
        assert_eq!(summary.applied, 0);
        assert_eq!(summary.last_txid, 0);
        assert_eq!(summary.digest, FsDirectory::new().digest());
    }
}
