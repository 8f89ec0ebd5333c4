//! Tabular serializer for summary records.
//!
//! One header line naming every column, then one line per
//! [`SummaryRecord`]. Fields are comma-separated and each line ends in
//! `\n`. Floats use the shortest representation that round-trips, so a
//! stored value parses back to exactly the number that was measured.
//!
//! Only the image identifier can contain arbitrary text; it is quoted
//! RFC 4180-style when it holds a comma, a double quote, or a line break.

use std::fmt::Write;

use cellsnake_pipeline::SummaryRecord;

/// Column names in store order.
pub const STORE_HEADER: [&str; 13] = [
    "Serial no.",
    "area_mean",
    "area_se",
    "area_worst",
    "perimeter_mean",
    "perimeter_se",
    "perimeter_worst",
    "radius_mean",
    "radius_se",
    "radius_worst",
    "smoothness_mean",
    "smoothness_worst",
    "snake_refined_count",
];

/// The header line, newline-terminated.
#[must_use]
pub fn header_row() -> String {
    let mut line = STORE_HEADER.join(",");
    line.push('\n');
    line
}

/// One data line for `record`, newline-terminated.
///
/// # Examples
///
/// ```
/// use cellsnake_pipeline::{FeatureTuple, ImageId, summarize};
/// use cellsnake_export::to_row;
///
/// let f = FeatureTuple { area: 4.0, perimeter: 8.0, radius: 1.0, smoothness: 0.5 };
/// let record = summarize(ImageId::new("slide_01"), &[f]).unwrap();
/// assert_eq!(to_row(&record), "slide_01,4,0,4,8,0,8,1,0,1,0.5,0.5,1\n");
/// ```
#[must_use]
pub fn to_row(record: &SummaryRecord) -> String {
    let mut line = quote_field(record.image_id.as_str());
    for value in [
        record.area_mean,
        record.area_se,
        record.area_worst,
        record.perimeter_mean,
        record.perimeter_se,
        record.perimeter_worst,
        record.radius_mean,
        record.radius_se,
        record.radius_worst,
        record.smoothness_mean,
        record.smoothness_worst,
    ] {
        // Writing to a String cannot fail.
        let _ = write!(line, ",{value}");
    }
    let _ = writeln!(line, ",{}", record.snake_refined_count);
    line
}

/// Header followed by one line per record.
#[must_use]
pub fn to_document(records: &[SummaryRecord]) -> String {
    let mut doc = header_row();
    for record in records {
        doc.push_str(&to_row(record));
    }
    doc
}

fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}
