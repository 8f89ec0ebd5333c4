//! Shape features of a refined curve.
//!
//! Measurements are taken in pixels and then converted to physical units
//! with the magnification-adjustment factor: area scales with its square,
//! every other feature linearly.

use crate::geometry;
use crate::types::{FeatureTuple, RefinedCurve};

impl FeatureTuple {
    /// Convert pixel-space features to physical units.
    #[must_use]
    pub fn scaled(self, scale: f64) -> Self {
        Self {
            area: self.area * scale * scale,
            perimeter: self.perimeter * scale,
            radius: self.radius * scale,
            smoothness: self.smoothness * scale,
        }
    }
}

/// Measure `curve` and apply the magnification factor `scale`.
///
/// An empty curve yields the all-zero tuple.
#[must_use]
pub fn extract(curve: &RefinedCurve, scale: f64) -> FeatureTuple {
    measure(curve).scaled(scale)
}

/// Pixel-space features, before magnification.
#[must_use]
pub fn measure(curve: &RefinedCurve) -> FeatureTuple {
    let points = curve.points();
    let area = geometry::polygon_area(points);
    let perimeter = geometry::perimeter(points);
    let radius = if area > 0.0 {
        (area / std::f64::consts::PI).sqrt()
    } else {
        0.0
    };
    FeatureTuple {
        area,
        perimeter,
        radius,
        smoothness: smoothness(points),
    }
}

/// Mean of `|d_i - d_mean| / d_mean` over vertex-to-centroid distances.
///
/// 0 when the curve is empty or collapsed onto its centroid.
fn smoothness(points: &[crate::types::Point]) -> f64 {
    let distances = geometry::radial_distances(points);
    let Some(r_mean) = geometry::mean(&distances) else {
        return 0.0;
    };
    if r_mean <= 0.0 {
        return 0.0;
    }
    let deviations: Vec<f64> = distances
        .iter()
        .map(|d| (d - r_mean).abs() / r_mean)
        .collect();
    geometry::mean(&deviations).unwrap_or(0.0)
}
