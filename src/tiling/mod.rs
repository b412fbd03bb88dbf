pub mod assign;
pub mod bounds;
pub mod grid;
pub mod orchestrator;
pub mod writer;

pub use assign::{assign, close_tile, AssignmentSummary};
pub use bounds::{compute_map_bounds, GeometryCache, MapBounds};
pub use grid::{build_tiles, grid_dimensions, TileBounds, TileId, MAX_TILES};
pub use orchestrator::{
    convert_with_converter, convert_with_tiling, plan_tiles, ConversionReport, Stage, TileOutcome,
    TilePlan, TileStatus,
};
pub use writer::write_tile;
