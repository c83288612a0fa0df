use anyhow::Context;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use dfs_node::config::EDITS_DIR;
use dfs_node::wal_reader::{list_segments, read_segment};
use std::path::Path;

pub fn run(data_dir: &Path) -> anyhow::Result<()> {
    let edits_dir = data_dir.join(EDITS_DIR);
    let ranges = list_segments(&edits_dir).with_context(|| format!("listing {:?}", edits_dir))?;

    if ranges.is_empty() {
        println!("\nNo sealed segments in {:?}\n", edits_dir);
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Segment", "First", "Last", "Records", "Status"]);

    let mut expected_start = ranges[0].start_txid;
    for range in &ranges {
        let records = read_segment(edits_dir.join(range.file_name()))?;
        let contiguous = records
            .iter()
            .zip(range.start_txid..)
            .all(|(record, txid)| record.txid == txid);
        let complete = records.len() as u64 == range.end_txid - range.start_txid + 1;

        let status = if range.start_txid != expected_start {
            "GAP BEFORE"
        } else if !(contiguous && complete) {
            "CORRUPT"
        } else {
            "OK"
        };
        expected_start = range.end_txid + 1;

        table.add_row(vec![
            range.file_name(),
            range.start_txid.to_string(),
            range.end_txid.to_string(),
            records.len().to_string(),
            status.to_string(),
        ]);
    }

    println!("\nEdit Log Segments\n");
    println!("{table}\n");
    Ok(())
}
