use crate::config::SamplingConfig;
use crate::error::{ConvertError, Result};
use crate::opendrive::{road_bounding_rect, OpenDriveDocument, Road};
use geo::Rect;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Axis-aligned extent in the map's planar coordinate system
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl MapBounds {
    pub fn from_rect(rect: &Rect<f64>) -> Self {
        MapBounds {
            min_x: rect.min().x,
            min_y: rect.min().y,
            max_x: rect.max().x,
            max_y: rect.max().y,
        }
    }

    /// Grow to cover `rect`
    pub fn include(&mut self, rect: &Rect<f64>) {
        self.min_x = self.min_x.min(rect.min().x);
        self.min_y = self.min_y.min(rect.min().y);
        self.max_x = self.max_x.max(rect.max().x);
        self.max_y = self.max_y.max(rect.max().y);
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Inclusive point containment
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// Memoised road bounding rectangles, keyed by road id
///
/// Bounds computation and tile assignment both need every road's
/// rectangle; sampling is a pure function of the road, so each road is
/// sampled once per run. Failures are cached too and warned about once.
pub struct GeometryCache {
    config: SamplingConfig,
    entries: HashMap<String, Result<Rect<f64>>>,
}

impl GeometryCache {
    pub fn new(config: SamplingConfig) -> Self {
        GeometryCache {
            config,
            entries: HashMap::new(),
        }
    }

    /// Bounding rectangle of a road's sampled reference line
    pub fn road_rect(&mut self, road: &Road) -> Result<Rect<f64>> {
        if let Some(cached) = self.entries.get(&road.id) {
            return cached.clone();
        }

        let result = road_bounding_rect(road, &self.config);
        if let Err(e) = &result {
            warn!("{}; road skipped for bounds", e);
        }
        self.entries.insert(road.id.clone(), result.clone());
        result
    }

    pub fn sampled_count(&self) -> usize {
        self.entries.len()
    }

    pub fn failed_count(&self) -> usize {
        self.entries.values().filter(|r| r.is_err()).count()
    }
}

/// Map-wide bounding box over the sampled geometry of every road
///
/// Roads whose geometry cannot be sampled are skipped with a warning.
///
/// # Errors
/// `EmptyMap` when the document has no roads or none can be sampled.
pub fn compute_map_bounds(doc: &OpenDriveDocument, cache: &mut GeometryCache) -> Result<MapBounds> {
    if doc.road_count() == 0 {
        return Err(ConvertError::EmptyMap);
    }

    let mut bounds: Option<MapBounds> = None;
    let mut skipped = 0usize;

    for road in doc.roads() {
        match cache.road_rect(road) {
            Ok(rect) => match bounds.as_mut() {
                Some(b) => b.include(&rect),
                None => bounds = Some(MapBounds::from_rect(&rect)),
            },
            Err(_) => skipped += 1,
        }
    }

    let bounds = bounds.ok_or(ConvertError::EmptyMap)?;

    info!(
        "Map bounds: x [{:.2}, {:.2}], y [{:.2}, {:.2}] ({:.1} x {:.1} m, {} roads skipped)",
        bounds.min_x,
        bounds.max_x,
        bounds.min_y,
        bounds.max_y,
        bounds.width(),
        bounds.height(),
        skipped
    );

    Ok(bounds)
}
