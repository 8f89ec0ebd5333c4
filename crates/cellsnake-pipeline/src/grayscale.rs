//! Image decoding and grayscale conversion.
//!
//! Microscopy slides arrive as color photographs; refinement only needs
//! intensity, so the first step is raw bytes in, `GrayImage` out.

use image::GrayImage;

use crate::types::AnalysisError;

/// Decode raw image bytes and convert to 8-bit luminance.
///
/// Supports whatever the `image` crate was built with (PNG, JPEG, BMP,
/// WebP). Color is reduced with the Rec. 601 luma weights.
///
/// # Errors
///
/// Returns [`AnalysisError::EmptyInput`] if `bytes` is empty.
/// Returns [`AnalysisError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_and_grayscale(bytes: &[u8]) -> Result<GrayImage, AnalysisError> {
    if bytes.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_luma8())
}
