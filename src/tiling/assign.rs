use super::bounds::GeometryCache;
use super::grid::TileBounds;
use crate::opendrive::geometry::nominal_start;
use crate::opendrive::{OpenDriveDocument, Road};
use geo::Rect;
use log::{debug, info, warn};
use rstar::{RTree, RTreeObject, AABB};
use serde::Serialize;
use std::collections::VecDeque;

/// Tile rectangle indexed by its position in the tile slice
#[derive(Clone, Debug)]
struct TileEnvelope {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for TileEnvelope {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Counters from one assignment run
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AssignmentSummary {
    /// (road, tile) pairs produced by bounding-box overlap
    pub spatial_memberships: usize,
    /// Roads placed by start point because sampling failed
    pub fallback_roads: usize,
    /// Road memberships added by junction/link closure
    pub closure_roads: usize,
    pub non_empty_tiles: usize,
}

/// Assign roads and junctions to tiles
///
/// # Algorithm
/// 1. Spatial pass: every road's sampled bounding box is matched against an
///    R-tree of tile rectangles. Overlap is inclusive, so a road lying on a
///    shared edge lands in both neighbours. Roads that fail sampling go to the
///    tile nearest their nominal start point.
/// 2. Closure pass: per tile, a work queue seeded with the spatial members is
///    expanded through junction membership (junction plus every road its
///    connections reference) and road predecessor/successor links. The tile's
///    road set doubles as the visited set, so cyclic topology terminates.
///
/// Only ids that exist in the document are added. Running it again on the
/// same tiles adds nothing.
pub fn assign(
    tiles: &mut [TileBounds],
    doc: &OpenDriveDocument,
    cache: &mut GeometryCache,
) -> AssignmentSummary {
    let mut summary = AssignmentSummary::default();
    if tiles.is_empty() {
        return summary;
    }

    let index = RTree::bulk_load(
        tiles
            .iter()
            .enumerate()
            .map(|(index, tile)| TileEnvelope {
                index,
                envelope: AABB::from_corners(
                    [tile.bounds.min_x, tile.bounds.min_y],
                    [tile.bounds.max_x, tile.bounds.max_y],
                ),
            })
            .collect(),
    );

    for road in doc.roads() {
        let hits = match cache.road_rect(road) {
            Ok(rect) => overlapping_tiles(&index, &rect),
            Err(_) => Vec::new(),
        };

        if hits.is_empty() {
            let target = fallback_tile(tiles, road);
            warn!(
                "Road {} has no usable geometry; assigned to {} by start point",
                road.id, tiles[target].id
            );
            tiles[target].roads.insert(road.id.clone());
            summary.fallback_roads += 1;
            continue;
        }

        for idx in hits {
            tiles[idx].roads.insert(road.id.clone());
            summary.spatial_memberships += 1;
        }
    }

    for tile in tiles.iter_mut() {
        let added = close_tile(tile, doc);
        if !tile.is_empty() {
            debug!(
                "{}: {} roads ({} via closure), {} junctions",
                tile.id,
                tile.roads.len(),
                added,
                tile.junctions.len()
            );
        }
        summary.closure_roads += added;
    }

    summary.non_empty_tiles = tiles.iter().filter(|t| !t.is_empty()).count();

    info!(
        "Assigned {} roads: {} spatial memberships, {} by start point, {} added by closure, {} non-empty tiles",
        doc.road_count(),
        summary.spatial_memberships,
        summary.fallback_roads,
        summary.closure_roads,
        summary.non_empty_tiles
    );

    summary
}

/// Expand a tile's road set to its junction/link closure
///
/// Returns the number of roads added. Zero means the tile was already closed.
pub fn close_tile(tile: &mut TileBounds, doc: &OpenDriveDocument) -> usize {
    let mut queue: VecDeque<String> = tile.roads.iter().cloned().collect();
    let mut added = 0usize;

    while let Some(road_id) = queue.pop_front() {
        let Some(road) = doc.road(&road_id) else {
            continue;
        };

        let mut pending: Vec<&str> = Vec::new();

        if let Some(junction_id) = road.junction_id() {
            match doc.junction(junction_id) {
                Some(junction) => {
                    tile.junctions.insert(junction.id.clone());
                    pending.extend(junction.member_roads());
                }
                None => debug!("Road {} references missing junction {}", road.id, junction_id),
            }
        }

        pending.extend(road.linked_roads());

        for target in pending {
            if doc.road(target).is_none() {
                debug!("Road {} links to missing road {}", road.id, target);
                continue;
            }
            if tile.roads.insert(target.to_string()) {
                queue.push_back(target.to_string());
                added += 1;
            }
        }
    }

    added
}

fn overlapping_tiles(index: &RTree<TileEnvelope>, rect: &Rect<f64>) -> Vec<usize> {
    let envelope = AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]);
    let mut hits: Vec<usize> = index
        .locate_in_envelope_intersecting(&envelope)
        .map(|tile| tile.index)
        .collect();
    hits.sort_unstable();
    hits
}

/// Tile nearest the road's nominal start; the first tile when there is none
fn fallback_tile(tiles: &[TileBounds], road: &Road) -> usize {
    let Some(start) = nominal_start(road) else {
        return 0;
    };

    tiles
        .iter()
        .enumerate()
        .map(|(idx, tile)| (idx, tile.distance_to(start.x, start.y)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}
