use super::bounds::MapBounds;
use crate::error::{ConvertError, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Upper limit on grid cells; beyond this the tile size is rejected
pub const MAX_TILES: usize = 1_000_000;

/// Row/column position of a tile in the grid (row 0 at min_y)
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Debug, Serialize, Deserialize)]
pub struct TileId {
    pub row: usize,
    pub col: usize,
}

impl Display for TileId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "tile_{}_{}", self.row, self.col)
    }
}

/// One grid cell and the roads/junctions assigned to it
///
/// Membership sets are ordered so tile files come out deterministic.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TileBounds {
    pub id: TileId,
    pub bounds: MapBounds,
    pub roads: BTreeSet<String>,
    pub junctions: BTreeSet<String>,
}

impl TileBounds {
    pub fn new(id: TileId, bounds: MapBounds) -> Self {
        TileBounds {
            id,
            bounds,
            roads: BTreeSet::new(),
            junctions: BTreeSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.roads.is_empty()
    }

    /// Euclidean distance from a point to this tile's rectangle (0 inside)
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        let dx = (self.bounds.min_x - x).max(0.0).max(x - self.bounds.max_x);
        let dy = (self.bounds.min_y - y).max(0.0).max(y - self.bounds.max_y);
        dx.hypot(dy)
    }
}

/// Grid rows and columns covering `bounds` (at least 1 x 1)
///
/// A positive edge length is still refused when the grid would exceed
/// `MAX_TILES` cells, since every cell is allocated up front.
pub fn grid_dimensions(bounds: &MapBounds, tile_edge_length: f64) -> Result<(usize, usize)> {
    if !(tile_edge_length > 0.0) {
        return Err(ConvertError::InvalidTileSize(tile_edge_length));
    }

    let cells = |extent: f64| ((extent / tile_edge_length).ceil() as usize).max(1);
    let rows = cells(bounds.height());
    let cols = cells(bounds.width());

    if rows.saturating_mul(cols) > MAX_TILES {
        return Err(ConvertError::GridTooLarge {
            rows,
            cols,
            limit: MAX_TILES,
        });
    }

    Ok((rows, cols))
}

/// Partition the map into square tiles of `tile_edge_length` meters
///
/// Tiles are row-major, ids `tile_{row}_{col}`. The last row and column
/// are clipped to the map's max bound. All membership sets start empty.
///
/// # Errors
/// `InvalidTileSize` when the edge length is not positive.
/// `GridTooLarge` when a positive edge length would still produce more
/// than `MAX_TILES` cells.
pub fn build_tiles(bounds: &MapBounds, tile_edge_length: f64) -> Result<Vec<TileBounds>> {
    let (rows, cols) = grid_dimensions(bounds, tile_edge_length)?;

    let mut tiles = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            let min_x = bounds.min_x + col as f64 * tile_edge_length;
            let min_y = bounds.min_y + row as f64 * tile_edge_length;
            let rect = MapBounds {
                min_x,
                min_y,
                max_x: (min_x + tile_edge_length).min(bounds.max_x),
                max_y: (min_y + tile_edge_length).min(bounds.max_y),
            };
            tiles.push(TileBounds::new(TileId { row, col }, rect));
        }
    }

    info!(
        "Built {}x{} tile grid ({} tiles, edge {:.1} m)",
        rows,
        cols,
        tiles.len(),
        tile_edge_length
    );

    Ok(tiles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bounds(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> MapBounds {
        MapBounds { min_x, min_y, max_x, max_y }
    }

    #[test]
    fn test_display_format() {
        let id = TileId { row: 3, col: 12 };
        assert_eq!(format!("{}", id), "tile_3_12");
    }

    #[test]
    fn test_invalid_tile_size() {
        let b = bounds(0.0, 0.0, 100.0, 100.0);
        assert_eq!(build_tiles(&b, 0.0), Err(ConvertError::InvalidTileSize(0.0)));
        assert_eq!(build_tiles(&b, -10.0), Err(ConvertError::InvalidTileSize(-10.0)));
        assert!(build_tiles(&b, f64::NAN).is_err());
    }

    #[test]
    fn test_row_major_layout_and_clipping() {
        let tiles = build_tiles(&bounds(0.0, 0.0, 250.0, 150.0), 100.0).unwrap();
        assert_eq!(tiles.len(), 6);

        let ids: Vec<String> = tiles.iter().map(|t| t.id.to_string()).collect();
        assert_eq!(
            ids,
            vec!["tile_0_0", "tile_0_1", "tile_0_2", "tile_1_0", "tile_1_1", "tile_1_2"]
        );

        let last = tiles.last().unwrap();
        assert_relative_eq!(last.bounds.min_x, 200.0);
        assert_relative_eq!(last.bounds.max_x, 250.0);
        assert_relative_eq!(last.bounds.min_y, 100.0);
        assert_relative_eq!(last.bounds.max_y, 150.0);
        assert!(tiles.iter().all(|t| t.roads.is_empty() && t.junctions.is_empty()));
    }

    #[test]
    fn test_exact_multiple_has_no_extra_column() {
        let (rows, cols) = grid_dimensions(&bounds(0.0, 0.0, 200.0, 100.0), 100.0).unwrap();
        assert_eq!((rows, cols), (1, 2));
    }

    #[test]
    fn test_degenerate_map_has_one_tile() {
        let tiles = build_tiles(&bounds(5.0, 5.0, 5.0, 5.0), 100.0).unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].id, TileId { row: 0, col: 0 });
    }

    #[test]
    fn test_tile_larger_than_map() {
        let tiles = build_tiles(&bounds(-10.0, -10.0, 900.0, 400.0), 10_000.0).unwrap();
        assert_eq!(tiles.len(), 1);
        assert_relative_eq!(tiles[0].bounds.max_x, 900.0);
    }

    #[test]
    fn test_too_many_tiles_rejected() {
        let result = build_tiles(&bounds(0.0, 0.0, 1.0e6, 1.0e6), 0.5);
        assert_eq!(
            result,
            Err(ConvertError::GridTooLarge {
                rows: 2_000_000,
                cols: 2_000_000,
                limit: MAX_TILES,
            })
        );
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("2000000 x 2000000 exceeds 1000000 tiles"));

        // 1000 x 1000 is exactly at the limit
        assert!(grid_dimensions(&bounds(0.0, 0.0, 1000.0, 1000.0), 1.0).is_ok());
    }

    #[test]
    fn test_distance_to_tile() {
        let tile = TileBounds::new(TileId { row: 0, col: 0 }, bounds(0.0, 0.0, 10.0, 10.0));
        assert_relative_eq!(tile.distance_to(5.0, 5.0), 0.0);
        assert_relative_eq!(tile.distance_to(13.0, 14.0), 5.0);
        assert_relative_eq!(tile.distance_to(-2.0, 5.0), 2.0);
    }
}
