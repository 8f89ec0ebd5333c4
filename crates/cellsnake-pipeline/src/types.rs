//! Shared types for the cellsnake boundary refinement pipeline.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self::new(x, y)
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// An ordered sequence of points. Closed shapes join the last point back
/// to the first implicitly; the closing point is never repeated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }
}

/// A rough closed polygon drawn by the operator around one cell.
///
/// Any number of points is representable so that input capture can hand
/// over whatever it collected; refinement rejects boundaries with fewer
/// than [`Boundary::MIN_POINTS`] points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Boundary(Polyline);

impl Boundary {
    /// Fewest points that still enclose an area.
    pub const MIN_POINTS: usize = 3;

    /// Wrap the operator's vertices in drawing order.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(Polyline::new(points))
    }

    /// The vertices as an open polyline; the closing edge is implied.
    #[must_use]
    pub const fn polyline(&self) -> &Polyline {
        &self.0
    }

    /// Vertices in drawing order.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        self.0.points()
    }

    /// Number of vertices.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no vertices were captured.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A closed curve produced by refining a [`Boundary`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefinedCurve(Polyline);

impl RefinedCurve {
    /// Wrap refined vertices, one per vertex of the source boundary.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(Polyline::new(points))
    }

    /// The vertices as an open polyline; the closing edge is implied.
    #[must_use]
    pub const fn polyline(&self) -> &Polyline {
        &self.0
    }

    /// Sub-pixel vertices in boundary order.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        self.0.points()
    }

    /// Number of vertices.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for a curve with no vertices.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Returns `true` if either side is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Identifier of a processed image: its file name without the extension.
///
/// Used as the `Serial no.` column of the summary store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(String);

impl ImageId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the identifier from an image path.
    ///
    /// `slides/1211.24.b3.jpg` becomes `1211.24.b3`: only the final
    /// extension is removed. A path without a file name (e.g. `..`)
    /// falls back to its lossy display form.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        path.file_stem().map_or_else(
            || Self(path.to_string_lossy().into_owned()),
            |stem| Self(stem.to_string_lossy().into_owned()),
        )
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shape features of one refined curve, in physical units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTuple {
    /// Enclosed area.
    pub area: f64,
    /// Closed-curve length.
    pub perimeter: f64,
    /// Radius of the circle with the same area.
    pub radius: f64,
    /// Mean relative deviation of the vertex-to-centroid distance.
    pub smoothness: f64,
}

/// Stable handle of a recorded boundary within a [`Session`](crate::Session).
///
/// Rendering collaborators map these to their own display handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundaryIndex(pub usize);

impl fmt::Display for BoundaryIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Aggregate statistics for one finalized image.
///
/// Field order matches the columns of the summary store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    /// Image identifier (`Serial no.` column).
    pub image_id: ImageId,
    pub area_mean: f64,
    /// Standard error of the mean: population std / sqrt(n).
    pub area_se: f64,
    /// Largest value across the session.
    pub area_worst: f64,
    pub perimeter_mean: f64,
    pub perimeter_se: f64,
    pub perimeter_worst: f64,
    pub radius_mean: f64,
    pub radius_se: f64,
    pub radius_worst: f64,
    pub smoothness_mean: f64,
    pub smoothness_worst: f64,
    /// Number of refined boundaries that contributed.
    pub snake_refined_count: usize,
}

/// Errors that can occur in the boundary refinement pipeline.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Analysis configuration is invalid.
    #[error("invalid analysis configuration: {0}")]
    InvalidConfig(String),

    /// The boundary has too few points to enclose an area.
    #[error("boundary has {count} point(s); at least 3 are needed to form a polygon")]
    InsufficientPoints {
        /// Number of points supplied.
        count: usize,
    },

    /// The edge field does not cover the image the boundary was drawn on.
    #[error("edge field is {actual} but the boundary was drawn on a {expected} image")]
    ShapeMismatch {
        /// Extent of the image the boundary belongs to.
        expected: Dimensions,
        /// Extent of the supplied edge field.
        actual: Dimensions,
    },

    /// Finalize was requested with no refined boundaries recorded.
    #[error("no snake-refined cells to summarize")]
    EmptySession,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_serializes_as_pair() {
        let json = serde_json::to_string(&Point::new(1.5, -2.0)).unwrap();
        assert_eq!(json, "[1.5,-2.0]");
        let back: Point = serde_json::from_str("[3, 4]").unwrap();
        assert_eq!(back, Point::new(3.0, 4.0));
    }

    #[test]
    fn boundary_deserializes_from_point_list() {
        let boundary: Boundary = serde_json::from_str("[[0,0],[10,0],[10,10]]").unwrap();
        assert_eq!(boundary.len(), 3);
        assert_eq!(boundary.points()[1], Point::new(10.0, 0.0));
    }

    #[test]
    fn image_id_strips_only_final_extension() {
        let id = ImageId::from_path(Path::new("MALIGNANT/1211.24/1211.24.b3.jpg"));
        assert_eq!(id.as_str(), "1211.24.b3");
    }

    #[test]
    fn image_id_without_extension() {
        let id = ImageId::from_path(Path::new("slides/sample"));
        assert_eq!(id.as_str(), "sample");
    }

    #[test]
    fn dimensions_display_and_empty() {
        let d = Dimensions {
            width: 640,
            height: 480,
        };
        assert_eq!(d.to_string(), "640x480");
        assert!(!d.is_empty());
        assert!(
            Dimensions {
                width: 0,
                height: 5
            }
            .is_empty()
        );
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            AnalysisError::InsufficientPoints { count: 2 }.to_string(),
            "boundary has 2 point(s); at least 3 are needed to form a polygon",
        );
        let err = AnalysisError::ShapeMismatch {
            expected: Dimensions {
                width: 100,
                height: 80,
            },
            actual: Dimensions {
                width: 50,
                height: 40,
            },
        };
        assert_eq!(
            err.to_string(),
            "edge field is 50x40 but the boundary was drawn on a 100x80 image",
        );
        assert_eq!(
            AnalysisError::EmptySession.to_string(),
            "no snake-refined cells to summarize",
        );
    }
}
