use anyhow::Context;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use dfs_namespace::snapshot::decode::decode_image;
use std::path::Path;

pub fn run(path: &Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {:?}", path))?;
    let image = decode_image(&bytes).with_context(|| format!("decoding {:?}", path))?;
    let (txid, directory) = image.into_directory()?;
    let stats = directory.stats();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Property", "Value"]);

    table.add_row(vec!["Image", &path.display().to_string()]);
    table.add_row(vec!["Size (bytes)", &bytes.len().to_string()]);
    table.add_row(vec!["Txid", &txid.to_string()]);
    table.add_row(vec!["Directories", &stats.directories.to_string()]);
    table.add_row(vec!["Files", &stats.files.to_string()]);
    table.add_row(vec!["Digest", &directory.digest()]);

    println!("\nNamespace Image\n");
    println!("{table}\n");
    Ok(())
}
