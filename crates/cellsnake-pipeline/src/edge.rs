//! Edge-strength field that guides snake refinement.
//!
//! The field is the Sobel gradient magnitude of the blurred unit-range
//! intensity image, stored as `f64` so the refinement engine can sample
//! it at sub-pixel positions. Both Sobel kernels are normalized by their
//! weight and the magnitude by `sqrt(2)`, so a hard black-to-white step
//! produces a peak of about `1/sqrt(2)`.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::filter;
use imageproc::kernel::Kernel;

use crate::blur;
use crate::config::AnalysisConfig;
use crate::grayscale;
use crate::types::{AnalysisError, Dimensions, Point};

/// Horizontal 3x3 Sobel kernel, `f32` so no precision is lost.
const SOBEL_HORIZONTAL: Kernel<'static, f32> = Kernel::new(
    &[-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0],
    3,
    3,
);

/// Vertical 3x3 Sobel kernel.
const SOBEL_VERTICAL: Kernel<'static, f32> = Kernel::new(
    &[-1.0, -2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0],
    3,
    3,
);

/// Sum of the absolute weights on one side of the 3x3 Sobel kernel.
const SOBEL_KERNEL_WEIGHT: f64 = 4.0;

/// Scale from the raw Sobel magnitude to the unit-range convention.
const SOBEL_NORMALIZATION: f64 = SOBEL_KERNEL_WEIGHT * std::f64::consts::SQRT_2;

/// A dense scalar field over image space, highest where intensity edges
/// are strongest.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeField {
    width: usize,
    height: usize,
    values: Vec<f64>,
}

impl EdgeField {
    /// Wrap row-major values.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidConfig`] when `values.len()` is not
    /// `width * height`.
    pub fn from_raw(width: u32, height: u32, values: Vec<f64>) -> Result<Self, AnalysisError> {
        let (w, h) = (width as usize, height as usize);
        if w.checked_mul(h) != Some(values.len()) {
            return Err(AnalysisError::InvalidConfig(format!(
                "a {width}x{height} edge field needs {} values, got {}",
                u64::from(width) * u64::from(height),
                values.len()
            )));
        }
        Ok(Self {
            width: w,
            height: h,
            values,
        })
    }

    /// Build a field by evaluating `f(x, y)` at every pixel.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f64) -> Self {
        let mut values = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                values.push(f(x, y));
            }
        }
        Self {
            width: width as usize,
            height: height as usize,
            values,
        }
    }

    /// Blur `gray` with `sigma`, then take the normalized Sobel magnitude.
    #[must_use]
    pub fn from_gray(gray: &GrayImage, sigma: f32) -> Self {
        let blurred = blur::gaussian_blur(&blur::to_intensity(gray), sigma);
        let (width, height) = blurred.dimensions();
        if width == 0 || height == 0 {
            return Self::from_fn(width, height, |_, _| 0.0);
        }
        let gx: Image<Luma<f32>> = filter(&blurred, SOBEL_HORIZONTAL, |v| v);
        let gy: Image<Luma<f32>> = filter(&blurred, SOBEL_VERTICAL, |v| v);
        Self::from_fn(width, height, |x, y| {
            let h = f64::from(gx.get_pixel(x, y).0[0]);
            let v = f64::from(gy.get_pixel(x, y).0[0]);
            h.hypot(v) / SOBEL_NORMALIZATION
        })
    }

    /// Field extent in pixels.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width as u32,
            height: self.height as u32,
        }
    }

    /// Value at integer coordinates, clamped to the field extent.
    ///
    /// Returns 0 for an empty field.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        self.values[y * self.width + x]
    }

    /// Bilinearly interpolated value at a sub-pixel position, clamped to
    /// the field extent.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn sample(&self, p: Point) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let x = p.x.clamp(0.0, (self.width - 1) as f64);
        let y = p.y.clamp(0.0, (self.height - 1) as f64);
        let (x0, y0) = (x.floor() as usize, y.floor() as usize);
        let (tx, ty) = (x - x0 as f64, y - y0 as f64);

        let top = (1.0 - tx).mul_add(self.get(x0, y0), tx * self.get(x0 + 1, y0));
        let bottom = (1.0 - tx).mul_add(self.get(x0, y0 + 1), tx * self.get(x0 + 1, y0 + 1));
        (1.0 - ty).mul_add(top, ty * bottom)
    }

    /// Partial derivatives along x and y.
    ///
    /// Central differences in the interior, one-sided differences on the
    /// border rows and columns, zero along an axis of length one.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn gradient(&self) -> (Self, Self) {
        let (w, h) = (self.width, self.height);
        let diff = |lo: usize, hi: usize, a: f64, b: f64| {
            if hi == lo {
                0.0
            } else {
                (b - a) / (hi - lo) as f64
            }
        };

        let gx = Self::from_fn(w as u32, h as u32, |x, y| {
            let (x, y) = (x as usize, y as usize);
            let lo = x.saturating_sub(1);
            let hi = (x + 1).min(w - 1);
            diff(lo, hi, self.get(lo, y), self.get(hi, y))
        });
        let gy = Self::from_fn(w as u32, h as u32, |x, y| {
            let (x, y) = (x as usize, y as usize);
            let lo = y.saturating_sub(1);
            let hi = (y + 1).min(h - 1);
            diff(lo, hi, self.get(x, lo), self.get(x, hi))
        });
        (gx, gy)
    }

    /// Largest value in the field (0 for an empty field).
    #[must_use]
    pub fn max_value(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }
}

/// Decode an image and build its edge field in one step.
///
/// The field's [`dimensions`](EdgeField::dimensions) are the image's.
///
/// # Errors
///
/// Returns [`AnalysisError::EmptyInput`] or [`AnalysisError::ImageDecode`]
/// when the bytes cannot be decoded.
pub fn edge_field_from_bytes(
    bytes: &[u8],
    config: &AnalysisConfig,
) -> Result<EdgeField, AnalysisError> {
    let gray = grayscale::decode_and_grayscale(bytes)?;
    let field = EdgeField::from_gray(&gray, config.blur_sigma);
    log::debug!(
        "edge field {} built (sigma={}, peak={:.3})",
        field.dimensions(),
        config.blur_sigma,
        field.max_value(),
    );
    Ok(field)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// 20x20 image with a sharp vertical boundary at x = 10.
    fn step_image() -> GrayImage {
        GrayImage::from_fn(20, 20, |x, _y| {
            if x < 10 {
                image::Luma([0])
            } else {
                image::Luma([255])
            }
        })
    }

    #[test]
    fn uniform_image_has_no_edges() {
        let gray = GrayImage::from_pixel(16, 16, image::Luma([128]));
        let field = EdgeField::from_gray(&gray, 1.0);
        assert_eq!(
            field.dimensions(),
            Dimensions {
                width: 16,
                height: 16
            }
        );
        assert!(field.max_value() < 1e-6, "got {}", field.max_value());
    }

    #[test]
    fn step_edge_peaks_at_boundary() {
        let field = EdgeField::from_gray(&step_image(), 0.0);
        let at_edge = field.get(9, 10).max(field.get(10, 10));
        let far = field.get(2, 10);
        assert!(far.abs() < 1e-12);
        // Unblurred hard step: about 1/sqrt(2) after normalization.
        assert!(
            (at_edge - std::f64::consts::FRAC_1_SQRT_2).abs() < 0.01,
            "expected ~0.707 at the step, got {at_edge}",
        );
    }

    #[test]
    fn blur_spreads_the_response() {
        let sharp = EdgeField::from_gray(&step_image(), 0.0);
        let soft = EdgeField::from_gray(&step_image(), 2.0);
        assert!(soft.get(7, 10) > sharp.get(7, 10));
        assert!(soft.max_value() < sharp.max_value());
    }

    #[test]
    fn faint_step_keeps_a_smooth_profile() {
        // A single gray level of contrast, as on a pale unstained slide.
        let gray = GrayImage::from_fn(20, 20, |x, _| image::Luma([if x < 10 { 100 } else { 101 }]));
        let field = EdgeField::from_gray(&gray, 2.0);
        let row: Vec<f64> = (0..20).map(|x| field.get(x, 10)).collect();
        assert!(row[6] > 0.0, "response should reach x = 6, got {row:?}");
        assert!(
            row[6..=9].windows(2).all(|w| w[1] > w[0]),
            "response should rise toward the step, got {row:?}"
        );
        // Peak scales with the one-level contrast.
        let peak = field.max_value();
        assert!(peak > 0.0 && peak < 1.0 / 255.0, "got {peak}");
    }

    #[test]
    fn from_raw_rejects_wrong_length() {
        let result = EdgeField::from_raw(4, 4, vec![0.0; 15]);
        assert!(
            matches!(&result, Err(AnalysisError::InvalidConfig(msg)) if msg.contains("needs 16 values, got 15")),
            "got {result:?}"
        );
        assert!(EdgeField::from_raw(4, 4, vec![0.0; 16]).is_ok());
    }

    #[test]
    fn sample_interpolates_bilinearly() {
        let field = EdgeField::from_raw(2, 2, vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        assert!((field.sample(Point::new(0.5, 0.0)) - 0.5).abs() < 1e-12);
        assert!((field.sample(Point::new(0.0, 0.5)) - 1.0).abs() < 1e-12);
        assert!((field.sample(Point::new(0.5, 0.5)) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn sample_clamps_outside_extent() {
        let field = EdgeField::from_raw(2, 2, vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        assert!((field.sample(Point::new(-5.0, -5.0)) - 0.0).abs() < 1e-12);
        assert!((field.sample(Point::new(10.0, 10.0)) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn gradient_of_ramp_is_constant() {
        let field = EdgeField::from_fn(5, 4, |x, y| 2.0 * f64::from(x) - f64::from(y));
        let (gx, gy) = field.gradient();
        for y in 0..4 {
            for x in 0..5 {
                assert!((gx.get(x, y) - 2.0).abs() < 1e-12);
                assert!((gy.get(x, y) + 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn edge_field_from_png_bytes() {
        let img = image::RgbaImage::from_fn(24, 18, |x, _| {
            if x < 12 {
                image::Rgba([20, 20, 20, 255])
            } else {
                image::Rgba([230, 230, 230, 255])
            }
        });
        let bytes = crate::grayscale::tests::encode_png(&img);
        let field = edge_field_from_bytes(&bytes, &AnalysisConfig::default()).unwrap();
        assert_eq!(
            field.dimensions(),
            Dimensions {
                width: 24,
                height: 18
            }
        );
        assert!(field.get(11, 9) > field.get(3, 9));
    }
}
