//! cellsnake-pipeline: Pure boundary refinement and feature pipeline (sans-IO).
//!
//! Turns an operator-drawn rough outline of a cell into a smooth closed
//! curve that follows the nearest intensity edge, measures the curve,
//! and reduces the measurements of every cell on an image into one
//! summary record:
//!
//! grayscale -> blur -> Sobel edge field -> snake refinement ->
//! feature extraction -> session accumulation -> summary.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! byte slices and returns structured data. Storing summaries is
//! delegated to a [`SummarySink`]; the file-backed store lives in
//! `cellsnake-io`.

pub mod blur;
pub mod config;
pub mod edge;
pub mod features;
pub mod geometry;
pub mod grayscale;
pub mod session;
pub mod snake;
pub mod types;

pub use config::{AnalysisConfig, SnakeConfig};
pub use edge::{EdgeField, edge_field_from_bytes};
pub use session::{Entry, FinalizeError, RefinedEntry, Session, SummarySink, summarize};
pub use snake::{RefineReport, refine, refine_with_report};
pub use types::{
    AnalysisError, Boundary, BoundaryIndex, Dimensions, FeatureTuple, ImageId, Point, Polyline,
    RefinedCurve, SummaryRecord,
};

/// Refine one boundary and measure the result without recording it.
///
/// `image` is the extent of the image the boundary was drawn on.
///
/// # Errors
///
/// Propagates [`snake::refine`] errors.
pub fn refine_and_measure(
    boundary: &Boundary,
    field: &EdgeField,
    image: Dimensions,
    config: &AnalysisConfig,
) -> Result<(RefinedCurve, FeatureTuple), AnalysisError> {
    let curve = snake::refine(boundary, field, image, &config.snake)?;
    let features = features::extract(&curve, config.magnification);
    Ok((curve, features))
}
