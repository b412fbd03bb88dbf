//! Dry run: print map bounds, grid and road/junction assignment as JSON
//! without writing any tile files.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use xodr_sumo_rs::{plan_tiles, OpenDriveDocument, TilingConfig, DEFAULT_TILE_SIZE_M};

#[derive(Parser, Debug)]
struct Args {
    /// Input OpenDRIVE file
    input: PathBuf,

    /// Tile edge length in meters
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE_M)]
    tile_size: f64,

    /// Include empty tiles in the output
    #[arg(long, default_value_t = false)]
    all: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let doc = OpenDriveDocument::load(&args.input)
        .with_context(|| format!("loading {}", args.input.display()))?;
    let config = TilingConfig::default()
        .with_tile_size(args.tile_size)
        .with_netconvert(false);
    let mut plan = plan_tiles(&doc, &config)?;

    if !args.all {
        plan.tiles.retain(|t| !t.is_empty());
    }

    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
