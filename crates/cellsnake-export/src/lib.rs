//! cellsnake-export: Pure format serializers (sans-IO)
//!
//! Converts session output into file formats without touching the
//! filesystem: the summary store's tabular rows and an SVG overlay of
//! rough and refined boundaries.

pub mod svg;
pub mod table;

pub use svg::{Overlay, SvgMetadata, build_path_data, to_overlay_svg};
pub use table::{STORE_HEADER, header_row, to_document, to_row};
