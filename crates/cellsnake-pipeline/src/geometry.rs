//! Measurements on closed point sequences.
//!
//! Every function treats its input as a closed polygon: the last point
//! connects back to the first without being repeated.

use geo::{Area, Coord, LineString, Polygon};

use crate::types::Point;

/// Enclosed area by the shoelace formula, always non-negative.
///
/// Returns 0 for fewer than 3 points. Self-intersecting outlines report
/// the absolute value of the signed sum, so lobes wound in opposite
/// directions partially cancel.
#[must_use]
pub fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let ring: LineString<f64> = points.iter().map(|p| Coord { x: p.x, y: p.y }).collect();
    Polygon::new(ring, Vec::new()).unsigned_area()
}

/// Length of the closed outline, including the closing edge.
///
/// Returns 0 for fewer than 3 points.
#[must_use]
pub fn perimeter(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let open: f64 = points.windows(2).map(|w| w[0].distance(w[1])).sum();
    let closing = match (points.first(), points.last()) {
        (Some(&first), Some(&last)) => last.distance(first),
        _ => 0.0,
    };
    open + closing
}

/// Arithmetic mean of the vertices, `None` when empty.
///
/// This is the vertex centroid, not the area centroid: densely sampled
/// stretches of the outline pull it towards themselves.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn centroid(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point::new(sx / n, sy / n))
}

/// Distance of each vertex to the vertex centroid.
#[must_use]
pub fn radial_distances(points: &[Point]) -> Vec<f64> {
    centroid(points).map_or_else(Vec::new, |c| {
        points.iter().map(|p| p.distance(c)).collect()
    })
}

/// Arithmetic mean, `None` when empty.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// `n` points evenly spaced on a circle, counter-clockwise from angle 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn circle(center: Point, radius: f64, n: usize) -> Vec<Point> {
    (0..n)
        .map(|i| {
            let t = std::f64::consts::TAU * i as f64 / n as f64;
            Point::new(
                radius.mul_add(t.cos(), center.x),
                radius.mul_add(t.sin(), center.y),
            )
        })
        .collect()
}
