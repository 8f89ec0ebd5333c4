//! Tunable parameters for edge-field construction, snake refinement, and
//! feature scaling.

use serde::{Deserialize, Serialize};

use crate::types::AnalysisError;

/// Parameters of the active-contour (snake) iteration.
///
/// Defaults reproduce the reference refinement behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnakeConfig {
    /// Weight of the first-order (stretching) internal energy.
    pub alpha: f64,

    /// Weight of the second-order (bending) internal energy.
    pub beta: f64,

    /// Time step of the semi-implicit update. Smaller values let the
    /// edge force move vertices further per iteration.
    pub gamma: f64,

    /// Upper bound on iterations.
    pub max_iterations: usize,

    /// Largest distance a vertex may move in one iteration, in pixels.
    /// Displacements are squashed through `tanh` before scaling.
    pub max_px_move: f64,

    /// Early-stop threshold in pixels.
    ///
    /// `None` always runs `max_iterations`. With `Some(eps)` the
    /// iteration stops once the curve stays within `eps` of one of its
    /// recent configurations.
    pub convergence: Option<f64>,
}

impl SnakeConfig {
    pub const DEFAULT_ALPHA: f64 = 0.006;
    pub const DEFAULT_BETA: f64 = 0.25;
    pub const DEFAULT_GAMMA: f64 = 0.01;
    pub const DEFAULT_MAX_ITERATIONS: usize = 2550;
    pub const DEFAULT_MAX_PX_MOVE: f64 = 1.0;
    pub const DEFAULT_CONVERGENCE: f64 = 0.1;

    /// Check every parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidConfig`] naming the first offending
    /// parameter.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        ensure(self.alpha.is_finite() && self.alpha >= 0.0, "alpha", self.alpha)?;
        ensure(self.beta.is_finite() && self.beta >= 0.0, "beta", self.beta)?;
        ensure(self.gamma.is_finite() && self.gamma > 0.0, "gamma", self.gamma)?;
        ensure(
            self.max_px_move.is_finite() && self.max_px_move > 0.0,
            "max_px_move",
            self.max_px_move,
        )?;
        if self.max_iterations == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_iterations must be at least 1".to_owned(),
            ));
        }
        if let Some(eps) = self.convergence {
            ensure(eps.is_finite() && eps >= 0.0, "convergence", eps)?;
        }
        Ok(())
    }
}

impl Default for SnakeConfig {
    fn default() -> Self {
        Self {
            alpha: Self::DEFAULT_ALPHA,
            beta: Self::DEFAULT_BETA,
            gamma: Self::DEFAULT_GAMMA,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            max_px_move: Self::DEFAULT_MAX_PX_MOVE,
            convergence: Some(Self::DEFAULT_CONVERGENCE),
        }
    }
}

/// Configuration for a whole analysis session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Gaussian sigma applied to the grayscale image before the gradient
    /// response is computed.
    pub blur_sigma: f32,

    /// Snake refinement parameters.
    pub snake: SnakeConfig,

    /// Magnification-adjustment factor converting pixel measurements to
    /// physical units. Area is scaled by its square.
    pub magnification: f64,
}

impl AnalysisConfig {
    pub const DEFAULT_BLUR_SIGMA: f32 = 1.0;
    pub const DEFAULT_MAGNIFICATION: f64 = 0.7875;

    /// Check every parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidConfig`] naming the first offending
    /// parameter.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        ensure(
            self.blur_sigma.is_finite(),
            "blur_sigma",
            f64::from(self.blur_sigma),
        )?;
        ensure(
            self.magnification.is_finite() && self.magnification > 0.0,
            "magnification",
            self.magnification,
        )?;
        self.snake.validate()
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            blur_sigma: Self::DEFAULT_BLUR_SIGMA,
            snake: SnakeConfig::default(),
            magnification: Self::DEFAULT_MAGNIFICATION,
        }
    }
}

fn ensure(ok: bool, name: &str, value: f64) -> Result<(), AnalysisError> {
    if ok {
        Ok(())
    } else {
        Err(AnalysisError::InvalidConfig(format!(
            "{name} out of range: {value}"
        )))
    }
}
