use super::assign::{assign, AssignmentSummary};
use super::bounds::{compute_map_bounds, GeometryCache, MapBounds};
use super::grid::{build_tiles, grid_dimensions, TileBounds};
use super::writer::write_tile;
use crate::config::TilingConfig;
use crate::error::{ConvertError, Result};
use crate::opendrive::OpenDriveDocument;
use crate::sumo::{prefixed_path, ConversionOutputs, PlainXmlConverter, TileConverter};
use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Pipeline position, logged on each transition
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Stage {
    Start,
    BoundsComputed,
    GridBuilt,
    Assigned,
    Converting,
    Done,
}

fn enter(stage: Stage) {
    debug!("Tiling stage: {:?}", stage);
}

/// Bounds, grid and membership for a document, before any file is written
#[derive(Clone, Debug, Serialize)]
pub struct TilePlan {
    pub bounds: MapBounds,
    pub rows: usize,
    pub cols: usize,
    pub assignment: AssignmentSummary,
    pub tiles: Vec<TileBounds>,
}

impl TilePlan {
    pub fn non_empty(&self) -> impl Iterator<Item = &TileBounds> {
        self.tiles.iter().filter(|t| !t.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TileStatus {
    Succeeded { outputs: ConversionOutputs },
    Failed { error: String },
}

/// Result of one non-empty tile
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TileOutcome {
    pub tile_id: String,
    pub roads: usize,
    pub junctions: usize,
    pub xodr_file: PathBuf,
    #[serde(flatten)]
    pub status: TileStatus,
}

impl TileOutcome {
    pub fn error(&self) -> Option<&str> {
        match &self.status {
            TileStatus::Failed { error } => Some(error),
            TileStatus::Succeeded { .. } => None,
        }
    }
}

/// Summary of a tiled conversion run
///
/// Empty tiles only show up in `empty_skipped`; `tiles` lists the
/// non-empty ones in grid order.
#[derive(Clone, Debug, Serialize)]
pub struct ConversionReport {
    pub input: PathBuf,
    pub output_prefix: PathBuf,
    pub config: TilingConfig,
    pub bounds: MapBounds,
    pub rows: usize,
    pub cols: usize,
    pub total_tiles: usize,
    pub empty_skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub tiles: Vec<TileOutcome>,
    pub generated_at: DateTime<Utc>,
}

impl ConversionReport {
    pub fn non_empty_tiles(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// `{succeeded}/{non-empty} tiles converted successfully`
    pub fn summary_line(&self) -> String {
        format!(
            "{}/{} tiles converted successfully",
            self.succeeded,
            self.non_empty_tiles()
        )
    }

    /// (tile id, error) for every failed tile
    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tiles
            .iter()
            .filter_map(|t| t.error().map(|e| (t.tile_id.as_str(), e)))
    }
}

/// Tile an OpenDRIVE file and convert every non-empty tile to SUMO Plain-XML
///
/// Output files share the stem `{output_prefix}_tile_{row}_{col}`.
///
/// # Errors
/// Only map-level failures: unreadable input, `InvalidTileSize`,
/// `GridTooLarge`, `EmptyMap`.
/// Per-tile failures are recorded in the report.
pub fn convert_with_tiling(
    xodr_path: &Path,
    output_prefix: &Path,
    tile_edge_length: f64,
    run_netconvert: bool,
) -> Result<ConversionReport> {
    let config = TilingConfig::default()
        .with_tile_size(tile_edge_length)
        .with_netconvert(run_netconvert);
    let converter = PlainXmlConverter::new(config.sampling.clone(), config.netconvert.clone());
    convert_with_converter(xodr_path, output_prefix, &config, &converter)
}

/// Compute bounds, build the grid and assign roads/junctions
pub fn plan_tiles(doc: &OpenDriveDocument, config: &TilingConfig) -> Result<TilePlan> {
    let mut cache = GeometryCache::new(config.sampling.clone());

    let bounds = compute_map_bounds(doc, &mut cache)?;
    enter(Stage::BoundsComputed);

    let (rows, cols) = grid_dimensions(&bounds, config.tile_size_m)?;
    let mut tiles = build_tiles(&bounds, config.tile_size_m)?;
    enter(Stage::GridBuilt);

    let assignment = assign(&mut tiles, doc, &mut cache);
    enter(Stage::Assigned);

    Ok(TilePlan {
        bounds,
        rows,
        cols,
        assignment,
        tiles,
    })
}

/// Tiled conversion with a caller-supplied per-tile converter
///
/// # Architecture
/// - START → BOUNDS_COMPUTED → GRID_BUILT → ASSIGNED, then one
///   write → convert → record cycle per non-empty tile, then DONE.
/// - Tiles run sequentially; each is independent, and a failed tile never
///   stops the run. Files of earlier tiles are left in place.
/// - Tile XODR goes to a `.tmp` sibling first and is renamed once complete.
pub fn convert_with_converter(
    xodr_path: &Path,
    output_prefix: &Path,
    config: &TilingConfig,
    converter: &dyn TileConverter,
) -> Result<ConversionReport> {
    if !(config.tile_size_m > 0.0) {
        return Err(ConvertError::InvalidTileSize(config.tile_size_m));
    }
    enter(Stage::Start);

    let doc = OpenDriveDocument::load(xodr_path)?;
    let plan = plan_tiles(&doc, config)?;

    if let Some(parent) = output_prefix.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConvertError::io(parent, e))?;
    }

    enter(Stage::Converting);
    let non_empty = plan.non_empty().count();
    let mut outcomes = Vec::with_capacity(non_empty);

    for (n, tile) in plan.non_empty().enumerate() {
        info!(
            "[{}/{}] {}: {} roads, {} junctions",
            n + 1,
            non_empty,
            tile.id,
            tile.roads.len(),
            tile.junctions.len()
        );
        let outcome = process_tile(&doc, tile, output_prefix, config, converter);
        if let Some(e) = outcome.error() {
            error!("{} failed: {}", tile.id, e);
        }
        outcomes.push(outcome);
    }

    let failed = outcomes.iter().filter(|o| o.error().is_some()).count();
    let report = ConversionReport {
        input: xodr_path.to_path_buf(),
        output_prefix: output_prefix.to_path_buf(),
        config: config.clone(),
        bounds: plan.bounds,
        rows: plan.rows,
        cols: plan.cols,
        total_tiles: plan.tiles.len(),
        empty_skipped: plan.tiles.len() - non_empty,
        succeeded: outcomes.len() - failed,
        failed,
        tiles: outcomes,
        generated_at: Utc::now(),
    };
    enter(Stage::Done);

    info!(
        "{} ({} tiles, {} empty skipped)",
        report.summary_line(),
        report.total_tiles,
        report.empty_skipped
    );
    Ok(report)
}

/// Write one tile's XODR and run the converter on it
fn process_tile(
    doc: &OpenDriveDocument,
    tile: &TileBounds,
    output_prefix: &Path,
    config: &TilingConfig,
    converter: &dyn TileConverter,
) -> TileOutcome {
    let tile_id = tile.id.to_string();
    let stem = prefixed_path(output_prefix, &format!("_{}", tile_id));
    let xodr_file = prefixed_path(&stem, ".xodr");

    let result = write_tile(doc, tile)
        .and_then(|text| write_atomically(&xodr_file, &text, &tile_id))
        .and_then(|()| {
            converter
                .convert(&xodr_file, &stem, config.run_netconvert)
                .map_err(|e| match e {
                    ConvertError::TileConversion { .. } => e,
                    other => ConvertError::TileConversion {
                        tile_id: tile_id.clone(),
                        reason: other.to_string(),
                    },
                })
        });

    let status = match result {
        Ok(outputs) => TileStatus::Succeeded { outputs },
        Err(e) => TileStatus::Failed {
            error: e.to_string(),
        },
    };

    TileOutcome {
        tile_id,
        roads: tile.roads.len(),
        junctions: tile.junctions.len(),
        xodr_file,
        status,
    }
}

/// Write to `{path}.tmp`, then rename over `path`
fn write_atomically(path: &Path, text: &str, tile_id: &str) -> Result<()> {
    let tmp = prefixed_path(path, ".tmp");
    let fail = |e: std::io::Error| ConvertError::TileWrite {
        tile_id: tile_id.to_string(),
        reason: format!("{}: {}", path.display(), e),
    };

    std::fs::write(&tmp, text).map_err(fail)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(fail(e));
    }
    debug!("Wrote {}", path.display());
    Ok(())
}
