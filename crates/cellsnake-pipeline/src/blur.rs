//! Gaussian smoothing ahead of the gradient response.
//!
//! Wraps [`imageproc::filter::gaussian_blur_f32`]. Smoothing suppresses
//! pixel noise and stain texture so the snake follows the cell outline
//! instead of granular detail inside it.
//!
//! Smoothing runs on unit-range `f32` intensities rather than 8-bit
//! values, so faint outlines on low-contrast slides keep a continuous
//! gradient instead of being quantized into steps.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;

/// Grayscale intensities in `[0, 1]`.
pub type IntensityImage = Image<Luma<f32>>;

/// Convert 8-bit luma to unit-range intensities.
#[must_use]
pub fn to_intensity(gray: &GrayImage) -> IntensityImage {
    IntensityImage::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([f32::from(gray.get_pixel(x, y).0[0]) / 255.0])
    })
}

/// Apply Gaussian blur to an intensity image.
///
/// Non-positive sigma values return the image unchanged, since
/// `imageproc`'s underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred image"]
pub fn gaussian_blur(image: &IntensityImage, sigma: f32) -> IntensityImage {
    if sigma <= 0.0 || image.width() == 0 || image.height() == 0 {
        return image.clone();
    }

    imageproc::filter::gaussian_blur_f32(image, sigma)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A bright square "nucleus" on a dark background.
    fn nucleus_image() -> IntensityImage {
        to_intensity(&GrayImage::from_fn(12, 12, |x, y| {
            if (4..8).contains(&x) && (4..8).contains(&y) {
                Luma([255])
            } else {
                Luma([0])
            }
        }))
    }

    #[test]
    fn intensity_is_unit_range() {
        let gray = GrayImage::from_fn(3, 1, |x, _| Luma([[0, 51, 255][x as usize]]));
        let intensity = to_intensity(&gray);
        assert!(intensity.get_pixel(0, 0).0[0].abs() < f32::EPSILON);
        assert!((intensity.get_pixel(1, 0).0[0] - 0.2).abs() < 1e-6);
        assert!((intensity.get_pixel(2, 0).0[0] - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn nonpositive_sigma_returns_identical_image() {
        let img = nucleus_image();
        assert_eq!(gaussian_blur(&img, 0.0), img);
        assert_eq!(gaussian_blur(&img, -2.0), img);
    }

    #[test]
    fn empty_image_is_returned_as_is() {
        let img = IntensityImage::new(0, 0);
        assert_eq!(gaussian_blur(&img, 1.0).dimensions(), (0, 0));
    }

    #[test]
    fn blur_softens_nucleus_border() {
        let blurred = gaussian_blur(&nucleus_image(), 1.0);
        assert_eq!(blurred.dimensions(), (12, 12));

        let outside = blurred.get_pixel(3, 5).0[0];
        let inside = blurred.get_pixel(4, 5).0[0];
        assert!(outside > 0.0, "outside should pick up intensity, got {outside}");
        assert!(inside < 1.0, "inside should lose intensity, got {inside}");
        assert!(inside > outside);
    }

    #[test]
    fn faint_ramp_is_not_quantized() {
        // One 8-bit level spread over the image: blurring in u8 would
        // round most of it back to the two original levels.
        let gray = GrayImage::from_fn(16, 1, |x, _| Luma([if x < 8 { 100 } else { 101 }]));
        let blurred = gaussian_blur(&to_intensity(&gray), 2.0);
        let row: Vec<f32> = (0..16).map(|x| blurred.get_pixel(x, 0).0[0]).collect();
        let lo = 100.0 / 255.0;
        let hi = 101.0 / 255.0;
        let between = row
            .iter()
            .filter(|&&v| v > lo + 1e-6 && v < hi - 1e-6)
            .count();
        assert!(between >= 4, "expected intermediate values, got {row:?}");
        assert!(row.windows(2).all(|w| w[1] >= w[0] - 1e-7));
    }
}
