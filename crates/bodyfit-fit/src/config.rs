//! Fitting configuration.

use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

use bodyfit_core::{Error, Result};

/// Tunables of the fitting optimizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Fixed number of optimizer steps; there is no convergence check
    pub iterations: usize,
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,

    /// Weight of the mean squared shape coefficients
    pub shape_weight: f64,
    /// Weight of the mean squared body-pose coefficients
    pub pose_weight: f64,

    /// Empirical focal length in pixels
    pub focal_length: f64,
    /// Initial translation along the optical axis
    pub initial_depth: f64,
    /// Projection denominators below this are clamped
    pub min_depth: f64,
    /// Rotation about the vertical axis between front and side cameras (radians)
    pub side_view_angle: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            iterations: 100,
            learning_rate: 0.02,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            shape_weight: 0.01,
            pose_weight: 0.01,
            focal_length: 5000.0,
            initial_depth: 50.0,
            min_depth: 1e-3,
            side_view_angle: FRAC_PI_2,
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            return Err(Error::Config("learning_rate must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.beta1) || !(0.0..1.0).contains(&self.beta2) {
            return Err(Error::Config("Adam betas must lie in [0, 1)".into()));
        }
        if self.focal_length <= 0.0 {
            return Err(Error::Config("focal_length must be positive".into()));
        }
        if self.initial_depth <= self.min_depth {
            return Err(Error::Config(
                "initial_depth must exceed min_depth".into(),
            ));
        }
        if self.min_depth <= 0.0 {
            return Err(Error::Config("min_depth must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FitConfig::default();
        assert_eq!(config.iterations, 100);
        assert_eq!(config.learning_rate, 0.02);
        assert_eq!(config.initial_depth, 50.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialization_keeps_defaults() {
        let config: FitConfig = serde_json::from_str(r#"{"iterations": 10}"#).unwrap();
        assert_eq!(config.iterations, 10);
        assert_eq!(config.focal_length, 5000.0);
    }

    #[test]
    fn test_rejects_nonpositive_depth() {
        let config = FitConfig {
            initial_depth: 0.0,
            ..FitConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
