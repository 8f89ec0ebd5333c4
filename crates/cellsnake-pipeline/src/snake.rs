//! Active-contour (snake) refinement of a rough boundary.
//!
//! The curve minimizes an internal energy that penalizes stretching
//! (`alpha`) and bending (`beta`) while an external force pulls every
//! vertex up the gradient of the [`EdgeField`]. Internal forces are
//! handled implicitly: the cyclic pentadiagonal system `A + gamma·I` is
//! inverted once, then each iteration is a matrix-vector product per
//! axis. The curve is closed, so every stencil wraps around.
//!
//! # Step control
//!
//! Raw updates are squashed through `tanh` and scaled by `max_px_move`,
//! so no vertex moves more than that distance per axis per iteration,
//! and every vertex is clamped into the field after each step.
//!
//! # Early stop
//!
//! Near an edge the explicit external force overshoots and the curve
//! settles into a small oscillation rather than a fixed point. Comparing
//! against a single previous iteration would never stop, so the last
//! [`CONVERGENCE_ORDER`] configurations are kept and the iteration stops
//! once the current curve is within `convergence` of any of them.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::config::SnakeConfig;
use crate::edge::EdgeField;
use crate::types::{AnalysisError, Boundary, Dimensions, Point, RefinedCurve};

/// Number of previous configurations compared by the early-stop check.
pub const CONVERGENCE_ORDER: usize = 10;

/// How a refinement run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefineReport {
    /// Iterations actually performed.
    pub iterations: usize,
    /// `true` if the early-stop criterion ended the run before
    /// `max_iterations`.
    pub converged: bool,
}

/// Refine `boundary` against `field`.
///
/// `image` is the extent of the image the boundary was drawn on; the
/// field must cover exactly that extent.
///
/// # Errors
///
/// - [`AnalysisError::InsufficientPoints`] for fewer than 3 points.
/// - [`AnalysisError::ShapeMismatch`] when the field extent differs from
///   `image` or is empty.
/// - [`AnalysisError::InvalidConfig`] for unusable parameters.
pub fn refine(
    boundary: &Boundary,
    field: &EdgeField,
    image: Dimensions,
    config: &SnakeConfig,
) -> Result<RefinedCurve, AnalysisError> {
    refine_with_report(boundary, field, image, config).map(|(curve, _)| curve)
}

/// Like [`refine`], also reporting iteration count and convergence.
///
/// # Errors
///
/// Same as [`refine`].
pub fn refine_with_report(
    boundary: &Boundary,
    field: &EdgeField,
    image: Dimensions,
    config: &SnakeConfig,
) -> Result<(RefinedCurve, RefineReport), AnalysisError> {
    let n = boundary.len();
    if n < Boundary::MIN_POINTS {
        return Err(AnalysisError::InsufficientPoints { count: n });
    }
    let extent = field.dimensions();
    if extent != image || extent.is_empty() {
        return Err(AnalysisError::ShapeMismatch {
            expected: image,
            actual: extent,
        });
    }
    config.validate()?;

    let inverse = internal_energy_inverse(n, config)?;
    let (force_x, force_y) = field.gradient();
    let max_x = f64::from(extent.width - 1);
    let max_y = f64::from(extent.height - 1);

    let points = boundary.points();
    let mut x = DVector::from_iterator(n, points.iter().map(|p| p.x.clamp(0.0, max_x)));
    let mut y = DVector::from_iterator(n, points.iter().map(|p| p.y.clamp(0.0, max_y)));

    let mut history: Vec<(DVector<f64>, DVector<f64>)> = Vec::with_capacity(CONVERGENCE_ORDER);
    let mut report = RefineReport {
        iterations: 0,
        converged: false,
    };

    for i in 0..config.max_iterations {
        let (fx, fy): (Vec<f64>, Vec<f64>) = x
            .iter()
            .zip(y.iter())
            .map(|(&px, &py)| {
                let p = Point::new(px, py);
                (force_x.sample(p), force_y.sample(p))
            })
            .unzip();

        let target_x = &inverse * (&x * config.gamma + DVector::from_vec(fx));
        let target_y = &inverse * (&y * config.gamma + DVector::from_vec(fy));

        for k in 0..n {
            let dx = config.max_px_move * (target_x[k] - x[k]).tanh();
            let dy = config.max_px_move * (target_y[k] - y[k]).tanh();
            x[k] = (x[k] + dx).clamp(0.0, max_x);
            y[k] = (y[k] + dy).clamp(0.0, max_y);
        }
        report.iterations = i + 1;

        let Some(eps) = config.convergence else {
            continue;
        };
        let slot = i % (CONVERGENCE_ORDER + 1);
        if slot < CONVERGENCE_ORDER {
            if slot < history.len() {
                history[slot] = (x.clone(), y.clone());
            } else {
                history.push((x.clone(), y.clone()));
            }
        } else if closest_configuration(&history, &x, &y) < eps {
            report.converged = true;
            break;
        }
    }

    log::debug!(
        "snake refined {n} points in {} iteration(s){}",
        report.iterations,
        if report.converged { " (converged)" } else { "" },
    );

    let points = x
        .iter()
        .zip(y.iter())
        .map(|(&px, &py)| Point::new(px, py))
        .collect();
    Ok((RefinedCurve::new(points), report))
}

/// Inverse of `A + gamma·I`, where `A = -alpha·D2 + beta·D4` with cyclic
/// second- and fourth-difference stencils.
///
/// On short curves the wrapped stencil taps land on the same column and
/// their weights add up.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn internal_energy_inverse(
    n: usize,
    config: &SnakeConfig,
) -> Result<DMatrix<f64>, AnalysisError> {
    let SnakeConfig {
        alpha, beta, gamma, ..
    } = *config;
    let stencil = [
        (-2_isize, beta),
        (-1, -alpha - 4.0 * beta),
        (0, 2.0f64.mul_add(alpha, 6.0 * beta) + gamma),
        (1, -alpha - 4.0 * beta),
        (2, beta),
    ];

    let len = n as isize;
    let mut matrix = DMatrix::<f64>::zeros(n, n);
    for row in 0..n {
        for &(offset, weight) in &stencil {
            let col = (row as isize + offset).rem_euclid(len) as usize;
            matrix[(row, col)] += weight;
        }
    }

    matrix.try_inverse().ok_or_else(|| {
        AnalysisError::InvalidConfig(format!(
            "snake system is singular for {n} points (alpha={alpha}, beta={beta}, gamma={gamma})"
        ))
    })
}

/// Smallest, over saved configurations, of the largest per-vertex
/// L1 displacement to the current one.
fn closest_configuration(
    history: &[(DVector<f64>, DVector<f64>)],
    x: &DVector<f64>,
    y: &DVector<f64>,
) -> f64 {
    history
        .iter()
        .map(|(hx, hy)| {
            (hx - x)
                .abs()
                .iter()
                .zip((hy - y).abs().iter())
                .map(|(ax, ay)| ax + ay)
                .fold(0.0, f64::max)
        })
        .fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::geometry::{self, circle};
    use image::GrayImage;

    const SIZE: u32 = 80;
    const CENTER: Point = Point::new(40.0, 40.0);
    const CELL_RADIUS: f64 = 20.0;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    /// A bright round cell on a dark background.
    fn cell_field() -> EdgeField {
        let gray = GrayImage::from_fn(SIZE, SIZE, |x, y| {
            let p = Point::new(f64::from(x), f64::from(y));
            if p.distance(CENTER) <= CELL_RADIUS {
                image::Luma([230])
            } else {
                image::Luma([20])
            }
        });
        EdgeField::from_gray(&gray, 1.0)
    }

    fn mean_radius(points: &[Point]) -> f64 {
        let d: Vec<f64> = points.iter().map(|p| p.distance(CENTER)).collect();
        geometry::mean(&d).unwrap()
    }

    #[test]
    fn too_few_points_rejected() {
        let field = EdgeField::from_fn(10, 10, |_, _| 0.0);
        let boundary = Boundary::new(vec![Point::new(1.0, 1.0), Point::new(5.0, 5.0)]);
        let result = refine(&boundary, &field, dims(10, 10), &SnakeConfig::default());
        assert!(matches!(
            result,
            Err(AnalysisError::InsufficientPoints { count: 2 })
        ));
    }

    #[test]
    fn mismatched_field_rejected() {
        let field = EdgeField::from_fn(10, 10, |_, _| 0.0);
        let boundary = Boundary::new(circle(Point::new(5.0, 5.0), 3.0, 8));
        let result = refine(&boundary, &field, dims(20, 10), &SnakeConfig::default());
        assert!(
            matches!(
                result,
                Err(AnalysisError::ShapeMismatch { expected, actual })
                    if expected == dims(20, 10) && actual == dims(10, 10)
            ),
            "expected ShapeMismatch, got {result:?}",
        );
    }

    #[test]
    fn empty_field_rejected() {
        let field = EdgeField::from_fn(0, 0, |_, _| 0.0);
        let boundary = Boundary::new(circle(Point::new(5.0, 5.0), 3.0, 8));
        let result = refine(&boundary, &field, dims(0, 0), &SnakeConfig::default());
        assert!(matches!(result, Err(AnalysisError::ShapeMismatch { .. })));
    }

    #[test]
    fn invalid_config_rejected() {
        let field = EdgeField::from_fn(10, 10, |_, _| 0.0);
        let boundary = Boundary::new(circle(Point::new(5.0, 5.0), 3.0, 8));
        let config = SnakeConfig {
            gamma: -1.0,
            ..SnakeConfig::default()
        };
        let result = refine(&boundary, &field, dims(10, 10), &config);
        assert!(matches!(result, Err(AnalysisError::InvalidConfig(_))));
    }

    #[test]
    fn wrapped_stencil_sums_on_short_curves() {
        let config = SnakeConfig::default();
        let inverse = internal_energy_inverse(3, &config).unwrap();
        // Rebuild A + gamma·I for n = 3 by hand: every off-diagonal entry
        // collects one first and one second neighbour tap.
        let (a, b, g) = (config.alpha, config.beta, config.gamma);
        let diag = 2.0 * a + 6.0 * b + g;
        let off = -a - 4.0 * b + b;
        let m = DMatrix::from_fn(3, 3, |r, c| if r == c { diag } else { off });
        let identity = &m * &inverse;
        for r in 0..3 {
            for c in 0..3 {
                let expected = if r == c { 1.0 } else { 0.0 };
                assert!((identity[(r, c)] - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn output_keeps_point_count_and_stays_in_bounds() {
        let field = EdgeField::from_fn(30, 20, |x, _| f64::from(x));
        let boundary = Boundary::new(vec![
            Point::new(-10.0, -4.0),
            Point::new(45.0, 2.0),
            Point::new(40.0, 35.0),
            Point::new(5.0, 25.0),
            Point::new(12.0, 10.0),
        ]);
        let config = SnakeConfig {
            max_iterations: 50,
            ..SnakeConfig::default()
        };
        let curve = refine(&boundary, &field, dims(30, 20), &config).unwrap();
        assert_eq!(curve.len(), boundary.len());
        for p in curve.points() {
            assert!((0.0..=29.0).contains(&p.x), "x out of bounds: {p:?}");
            assert!((0.0..=19.0).contains(&p.y), "y out of bounds: {p:?}");
        }
    }

    #[test]
    fn flat_field_lets_internal_energy_shrink_the_curve() {
        let field = EdgeField::from_fn(SIZE, SIZE, |_, _| 0.0);
        let boundary = Boundary::new(circle(CENTER, 25.0, 32));
        let config = SnakeConfig {
            max_iterations: 5,
            convergence: None,
            ..SnakeConfig::default()
        };
        let (curve, report) =
            refine_with_report(&boundary, &field, dims(SIZE, SIZE), &config).unwrap();
        assert_eq!(report.iterations, 5);
        assert!(!report.converged);
        assert!(mean_radius(curve.points()) < 25.0);
    }

    #[test]
    fn rough_outline_snaps_to_cell_edge() {
        let field = cell_field();
        let boundary = Boundary::new(circle(CENTER, 26.0, 40));
        let (curve, report) =
            refine_with_report(&boundary, &field, dims(SIZE, SIZE), &SnakeConfig::default())
                .unwrap();

        assert_eq!(curve.len(), 40);
        assert!(report.converged, "expected early stop, ran {report:?}");
        assert!(report.iterations < SnakeConfig::DEFAULT_MAX_ITERATIONS);

        let r = mean_radius(curve.points());
        assert!(
            (r - CELL_RADIUS).abs() < 1.5,
            "expected curve near the cell edge (r={CELL_RADIUS}), got mean radius {r}",
        );
        let c = geometry::centroid(curve.points()).unwrap();
        assert!(c.distance(CENTER) < 1.0, "centroid drifted to {c:?}");

        let strength = |pts: &[Point]| {
            let s: Vec<f64> = pts.iter().map(|&p| field.sample(p)).collect();
            geometry::mean(&s).unwrap()
        };
        assert!(strength(curve.points()) > strength(boundary.points()));
    }

    #[test]
    fn disabled_early_stop_runs_every_iteration() {
        let field = cell_field();
        let boundary = Boundary::new(circle(CENTER, 22.0, 24));
        let config = SnakeConfig {
            max_iterations: 40,
            convergence: None,
            ..SnakeConfig::default()
        };
        let (_, report) =
            refine_with_report(&boundary, &field, dims(SIZE, SIZE), &config).unwrap();
        assert_eq!(
            report,
            RefineReport {
                iterations: 40,
                converged: false
            }
        );
    }
}
