//! SVG overlay serializer.
//!
//! Draws the operator's rough boundaries and the refined curves of one
//! image as closed `<path>` elements in image-pixel coordinates, using
//! the [`svg`] crate for document construction, XML escaping, and path
//! data formatting. Layered over the source image, the overlay shows
//! where each outline was drawn and where the snake settled.
//!
//! Optional [`SvgMetadata`] embeds `<title>` and `<desc>` elements, and
//! the analysis configuration as JSON inside `<metadata>`.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Element, Group, Path, Title};
use svg::node::{Node, Text, Value};

use cellsnake_pipeline::{Boundary, Dimensions, Polyline, RefinedCurve};

/// Stroke colour of rough boundaries.
const BOUNDARY_STROKE: &str = "red";
/// Stroke colour of refined curves.
const CURVE_STROKE: &str = "blue";

/// Metadata to embed in the SVG document.
///
/// All fields are optional. Text values are XML-escaped by the `svg`
/// crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    ///
    /// Typically the image identifier.
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized analysis configuration, emitted inside a namespaced
    /// `<cellsnake:analysis>` element under `<metadata>` so the overlay
    /// records the parameters it was produced with.
    pub config_json: Option<&'a str>,
}

/// Outlines to draw for one image.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overlay<'a> {
    /// Rough boundaries as drawn by the operator.
    pub boundaries: &'a [Boundary],
    /// Curves produced by refinement.
    pub curves: &'a [RefinedCurve],
}

/// Build a closed SVG path `d` attribute string from a polyline.
///
/// Uses `M` for the first point, `L` for the rest, and `z` to close the
/// outline back to its start. Returns an empty string for polylines with
/// fewer than 2 points.
///
/// # Examples
///
/// ```
/// use cellsnake_pipeline::{Point, Polyline};
/// use cellsnake_export::build_path_data;
///
/// let polyline = Polyline::new(vec![
///     Point::new(10.0, 20.0),
///     Point::new(30.0, 40.0),
///     Point::new(10.0, 40.0),
/// ]);
/// assert_eq!(build_path_data(&polyline), "M10,20 L30,40 L10,40 z");
/// ```
#[must_use]
pub fn build_path_data(polyline: &Polyline) -> String {
    let points = polyline.points();
    let Some((first, rest)) = points.split_first() else {
        return String::new();
    };
    if rest.is_empty() {
        return String::new();
    }
    let mut data = Data::new().move_to((first.x, first.y));
    for p in rest {
        data = data.line_to((p.x, p.y));
    }
    String::from(Value::from(data.close()))
}

fn outline_group<'p>(
    id: &str,
    stroke: &str,
    polylines: impl Iterator<Item = &'p Polyline>,
) -> Group {
    let mut group = Group::new()
        .set("id", id)
        .set("fill", "none")
        .set("stroke", stroke)
        .set("stroke-width", 1);
    for polyline in polylines {
        let d = build_path_data(polyline);
        if d.is_empty() {
            continue;
        }
        group = group.add(Path::new().set("d", d));
    }
    group
}

/// Serialize an [`Overlay`] into an SVG document string.
///
/// The view box spans `dimensions` in pixels, so the document can be
/// laid directly over the source image. Rough boundaries are stroked red
/// in a `<g id="boundaries">` group and refined curves blue in a
/// `<g id="refined">` group drawn on top. Outlines with fewer than 2
/// points are skipped.
#[must_use]
pub fn to_overlay_svg(
    overlay: Overlay<'_>,
    dimensions: Dimensions,
    metadata: &SvgMetadata<'_>,
) -> String {
    let Dimensions { width, height } = dimensions;
    let mut doc = Document::new()
        .set("width", width)
        .set("height", height)
        .set("viewBox", (0, 0, width, height));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    if let Some(config_json) = metadata.config_json {
        let mut analysis_el = Element::new("cellsnake:analysis");
        analysis_el.assign("xmlns:cellsnake", "https://cellsnake.dev/ns/1");
        analysis_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(analysis_el);
        doc = doc.add(metadata_el);
    }

    doc = doc.add(outline_group(
        "boundaries",
        BOUNDARY_STROKE,
        overlay.boundaries.iter().map(Boundary::polyline),
    ));
    doc = doc.add(outline_group(
        "refined",
        CURVE_STROKE,
        overlay.curves.iter().map(RefinedCurve::polyline),
    ));

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}
