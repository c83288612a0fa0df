use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use dfs_node::config::NodeConfig;
use dfs_node::persistence::{CheckpointInfo, CheckpointStore};
use std::path::Path;

use super::format_millis;

pub fn run(data_dir: &Path) -> anyhow::Result<()> {
    let cfg = NodeConfig::with_data_dir(data_dir);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Role", "Txid", "Taken", "Image"]);

    let mut found = false;
    let store = CheckpointStore::new(cfg.checkpoint_txid_path());
    if store.path().exists() {
        found = true;
        let image = cfg.primary_image_path();
        let image_state = if image.exists() { "fsimage.json" } else { "fsimage.json (missing)" };
        table.add_row(vec![
            "Primary".to_string(),
            store.load()?.to_string(),
            "-".to_string(),
            image_state.to_string(),
        ]);
    }

    if let Some(info) = CheckpointInfo::load(&cfg.checkpoint_info_path())? {
        found = true;
        let image_state = if cfg.resolve(&info.image_file).exists() {
            info.image_file.clone()
        } else {
            format!("{} (missing)", info.image_file)
        };
        table.add_row(vec![
            "Backup".to_string(),
            info.txid.to_string(),
            format_millis(info.timestamp),
            image_state,
        ]);
    }

    if !found {
        println!("\nNo checkpoint bookkeeping in {:?}\n", data_dir);
        return Ok(());
    }

    println!("\nCheckpoints\n");
    println!("{table}\n");
    Ok(())
}
