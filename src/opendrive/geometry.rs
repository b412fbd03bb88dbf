use super::model::{Elevation, Geometry, GeometryKind, ParamRange, Road};
use crate::config::SamplingConfig;
use crate::error::{ConvertError, Result};
use geo::{BoundingRect, Coord, LineString, Rect};

/// Sampled point on a road reference line
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoadPoint {
    pub s: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub hdg: f64,
}

/// Max step when integrating clothoid heading (meters)
const SPIRAL_STEP_M: f64 = 0.5;

/// Integration panels per clothoid evaluation, regardless of length
const MAX_SPIRAL_PANELS: usize = 100_000;

/// Consecutive shape points closer than this are merged (meters)
const SHAPE_DEDUP_M: f64 = 0.01;

/// Sample the reference line of a road
///
/// # Resolution
/// Each geometry element gets `max(min_samples, ceil(length / interval_m))`
/// intervals, so short curvy elements still resolve their extrema and long
/// elements gain one station per `interval_m`.
///
/// # Errors
/// `GeometrySampling` when the road has no planView, a non-positive or
/// non-finite total length, an element needing more than `max_samples`
/// stations, or any station evaluating to a non-finite coordinate.
pub fn sample_road(road: &Road, config: &SamplingConfig) -> Result<Vec<RoadPoint>> {
    if road.plan_view.is_empty() {
        return Err(ConvertError::sampling(&road.id, "no planView geometry"));
    }

    let total_length: f64 = road.plan_view.iter().map(|g| g.length).sum();
    if !(total_length > 0.0 && total_length.is_finite()) {
        return Err(ConvertError::sampling(
            &road.id,
            format!("degenerate reference line (length {})", total_length),
        ));
    }

    let interval = if config.interval_m > 0.0 { config.interval_m } else { 1.0 };
    let mut points = Vec::new();

    for geom in road.plan_view.iter().filter(|g| g.length > 0.0) {
        let wanted = (geom.length / interval).ceil();
        if wanted > config.max_samples as f64 {
            return Err(ConvertError::sampling(
                &road.id,
                format!(
                    "geometry at s={} needs {:.0} samples (limit {})",
                    geom.s, wanted, config.max_samples
                ),
            ));
        }
        let steps = (wanted as usize).max(config.min_samples.max(1));

        for i in 0..=steps {
            let ds = geom.length * i as f64 / steps as f64;
            let (x, y, hdg) = evaluate(geom, ds);
            let s = geom.s + ds;
            let z = elevation_at(&road.elevation, s);

            if !(x.is_finite() && y.is_finite() && z.is_finite()) {
                return Err(ConvertError::sampling(
                    &road.id,
                    format!("non-finite coordinate at s={:.3}", s),
                ));
            }

            points.push(RoadPoint { s, x, y, z, hdg });
        }
    }

    Ok(points)
}

/// Planar bounding rectangle of sampled points
pub fn bounding_rect(points: &[RoadPoint]) -> Option<Rect<f64>> {
    to_line_string(points).bounding_rect()
}

/// Sample a road and return its planar bounding rectangle
pub fn road_bounding_rect(road: &Road, config: &SamplingConfig) -> Result<Rect<f64>> {
    let points = sample_road(road, config)?;
    bounding_rect(&points).ok_or_else(|| ConvertError::sampling(&road.id, "no sampled points"))
}

/// Planar polyline of sampled points
pub fn to_line_string(points: &[RoadPoint]) -> LineString<f64> {
    LineString::new(points.iter().map(|p| Coord { x: p.x, y: p.y }).collect())
}

/// Sampled reference line as a shape, consecutive duplicates merged
pub fn road_shape(road: &Road, config: &SamplingConfig) -> Result<Vec<(f64, f64)>> {
    let points = sample_road(road, config)?;
    let mut shape: Vec<(f64, f64)> = Vec::with_capacity(points.len());

    for p in points {
        let is_duplicate = shape.last().map_or(false, |&(lx, ly)| {
            (p.x - lx).abs() <= SHAPE_DEDUP_M && (p.y - ly).abs() <= SHAPE_DEDUP_M
        });
        if !is_duplicate {
            shape.push((p.x, p.y));
        }
    }

    Ok(shape)
}

/// Start coordinate of the first geometry element, if finite
pub fn nominal_start(road: &Road) -> Option<Coord<f64>> {
    road.plan_view
        .first()
        .filter(|g| g.x.is_finite() && g.y.is_finite())
        .map(|g| Coord { x: g.x, y: g.y })
}

/// Reference-line end point (last station of the last element)
pub fn nominal_end(road: &Road) -> Option<Coord<f64>> {
    let geom = road.plan_view.iter().rev().find(|g| g.length > 0.0)?;
    let (x, y, _) = evaluate(geom, geom.length);
    (x.is_finite() && y.is_finite()).then_some(Coord { x, y })
}

/// Global (x, y, heading) at distance `ds` into a geometry element
pub fn evaluate(geom: &Geometry, ds: f64) -> (f64, f64, f64) {
    let (u, v, dhdg) = match &geom.kind {
        GeometryKind::Line => (ds, 0.0, 0.0),
        GeometryKind::Arc { curvature } => arc_local(*curvature, ds),
        GeometryKind::Spiral {
            curv_start,
            curv_end,
        } => spiral_local(*curv_start, *curv_end, geom.length, ds),
        GeometryKind::Poly3 { a, b, c, d } => {
            let v = a + b * ds + c * ds * ds + d * ds * ds * ds;
            let dv = b + 2.0 * c * ds + 3.0 * d * ds * ds;
            (ds, v, dv.atan())
        }
        GeometryKind::ParamPoly3 {
            au,
            bu,
            cu,
            du,
            av,
            bv,
            cv,
            dv,
            p_range,
        } => {
            let p = match p_range {
                ParamRange::ArcLength => ds,
                ParamRange::Normalized if geom.length > 0.0 => ds / geom.length,
                ParamRange::Normalized => 0.0,
            };
            let u = au + bu * p + cu * p * p + du * p * p * p;
            let v = av + bv * p + cv * p * p + dv * p * p * p;
            let du_dp = bu + 2.0 * cu * p + 3.0 * du * p * p;
            let dv_dp = bv + 2.0 * cv * p + 3.0 * dv * p * p;
            (u, v, dv_dp.atan2(du_dp))
        }
    };

    let (sin_hdg, cos_hdg) = geom.hdg.sin_cos();
    (
        geom.x + u * cos_hdg - v * sin_hdg,
        geom.y + u * sin_hdg + v * cos_hdg,
        geom.hdg + dhdg,
    )
}

fn arc_local(curvature: f64, ds: f64) -> (f64, f64, f64) {
    if curvature.abs() < 1e-12 {
        return (ds, 0.0, 0.0);
    }
    let angle = ds * curvature;
    (angle.sin() / curvature, (1.0 - angle.cos()) / curvature, angle)
}

/// Clothoid in local frame by Simpson integration of its heading
fn spiral_local(curv_start: f64, curv_end: f64, length: f64, ds: f64) -> (f64, f64, f64) {
    let rate = if length > 0.0 { (curv_end - curv_start) / length } else { 0.0 };
    let heading = |t: f64| curv_start * t + 0.5 * rate * t * t;

    if ds <= 0.0 {
        return (0.0, 0.0, 0.0);
    }

    // Simpson needs an even number of panels
    let wanted = (ds / SPIRAL_STEP_M).ceil().min(MAX_SPIRAL_PANELS as f64);
    let mut panels = (wanted as usize).max(2);
    if panels % 2 == 1 {
        panels += 1;
    }
    let h = ds / panels as f64;

    let (mut sum_x, mut sum_y) = (0.0, 0.0);
    for i in 0..=panels {
        let weight = if i == 0 || i == panels {
            1.0
        } else if i % 2 == 1 {
            4.0
        } else {
            2.0
        };
        let theta = heading(i as f64 * h);
        sum_x += weight * theta.cos();
        sum_y += weight * theta.sin();
    }

    (sum_x * h / 3.0, sum_y * h / 3.0, heading(ds))
}

fn elevation_at(profile: &[Elevation], s: f64) -> f64 {
    let Some(record) = profile.iter().rev().find(|e| e.s <= s).or(profile.first()) else {
        return 0.0;
    };
    let ds = s - record.s;
    record.a + record.b * ds + record.c * ds * ds + record.d * ds * ds * ds
}
