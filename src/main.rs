use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use xodr_sumo_rs::{
    convert_with_converter, ConversionReport, PlainXmlConverter, TileConverter, TilingConfig,
    DEFAULT_TILE_SIZE_M,
};

#[derive(Parser, Debug)]
#[command(name = "xodr_to_sumo")]
#[command(about = "Convert OpenDRIVE (.xodr) maps to SUMO Plain-XML, optionally in tiles", long_about = None)]
struct Args {
    /// Input OpenDRIVE file
    #[arg(long, short)]
    input: PathBuf,

    /// Output prefix, e.g. out/city (tiles become out/city_tile_R_C.*);
    /// defaults to the input path without its extension
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Split the map into square tiles before converting
    #[arg(long)]
    tiled: bool,

    /// Tile edge length in meters (default: 5 miles)
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE_M)]
    tile_size: f64,

    /// Only write Plain-XML, skip netconvert
    #[arg(long)]
    no_netconvert: bool,

    /// netconvert binary (default: $SUMO_HOME/bin/netconvert or PATH)
    #[arg(long)]
    netconvert_bin: Option<PathBuf>,

    /// netconvert timeout per tile, seconds
    #[arg(long, default_value = "600")]
    netconvert_timeout: u64,

    /// Write the run report as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Debug logging and verbose netconvert
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("[{}] Error: {:#}", ts_now(), e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every converted unit succeeded
fn run(args: &Args) -> Result<bool> {
    let mut config = TilingConfig::default()
        .with_tile_size(args.tile_size)
        .with_netconvert(!args.no_netconvert);
    if let Some(bin) = &args.netconvert_bin {
        config.netconvert.binary = bin.clone();
    }
    config.netconvert.timeout_secs = args.netconvert_timeout;
    config.netconvert.verbose = args.verbose;

    let converter = PlainXmlConverter::new(config.sampling.clone(), config.netconvert.clone());
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension(""));

    println!("[{}] xodr_to_sumo starting", ts_now());
    println!("  Input: {}", args.input.display());
    println!("  Output prefix: {}", output.display());
    println!("  Netconvert: {}", config.run_netconvert);

    if !args.tiled {
        if args.report.is_some() {
            bail!("--report requires --tiled");
        }
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let outputs = converter
            .convert(&args.input, &output, config.run_netconvert)
            .with_context(|| format!("converting {}", args.input.display()))?;
        println!(
            "[{}] Wrote {} nodes, {} edges, {} connections",
            ts_now(),
            outputs.node_count,
            outputs.edge_count,
            outputs.connection_count
        );
        if let Some(net) = &outputs.network_file {
            println!("  Network: {}", net.display());
        }
        return Ok(true);
    }

    println!("  Tile size: {:.2} m", config.tile_size_m);
    let report = convert_with_converter(&args.input, &output, &config, &converter)
        .with_context(|| format!("tiling {}", args.input.display()))?;

    if let Some(path) = &args.report {
        write_report(&report, path)?;
    }
    write_summary(&report, &mut std::io::stdout(), &mut std::io::stderr())
        .context("printing summary")?;
    Ok(!report.has_failures())
}

fn write_report(report: &ConversionReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
    println!("[{}] Report written to {}", ts_now(), path.display());
    Ok(())
}

/// Grid and success line to `out`; failure count and failed tiles to `err`
fn write_summary(
    report: &ConversionReport,
    out: &mut impl Write,
    err: &mut impl Write,
) -> io::Result<()> {
    writeln!(
        out,
        "[{}] Grid {} x {} ({} tiles, {} empty skipped)",
        ts_now(),
        report.rows,
        report.cols,
        report.total_tiles,
        report.empty_skipped
    )?;
    writeln!(out, "[{}] {}", ts_now(), report.summary_line())?;

    if report.has_failures() {
        writeln!(
            err,
            "[{}] {}/{} tiles failed",
            ts_now(),
            report.failed,
            report.non_empty_tiles()
        )?;
        for (tile_id, error) in report.failures() {
            writeln!(err, "  FAILED {}: {}", tile_id, error)?;
        }
    }
    Ok(())
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
