// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use clap::{Parser, Subcommand};
use dfs_cli::commands::{checkpoint, image, replay, segments};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dfs")]
#[command(about = "Offline inspection of a dfs metadata directory", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sealed edit log segments and their record counts
    Segments {
        data_dir: PathBuf,
    },
    /// Show the txid, size and digest of a namespace image
    Image {
        path: PathBuf,
    },
    /// Rebuild the namespace from image + checkpoint + segments, as a restart would
    Replay {
        data_dir: PathBuf,
    },
    /// Show Primary and Backup checkpoint bookkeeping
    Checkpoint {
        data_dir: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Segments { data_dir } => segments::run(&data_dir),
        Commands::Image { path } => image::run(&path),
        Commands::Replay { data_dir } => replay::run(&data_dir),
        Commands::Checkpoint { data_dir } => checkpoint::run(&data_dir),
    }
}
