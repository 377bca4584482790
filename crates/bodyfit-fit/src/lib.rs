//! # Bodyfit-Fit
//!
//! Recovers body-model parameters from 2D keypoints detected in a front
//! photograph and, optionally, a side photograph.
//!
//! ## Pipeline
//!
//! 1. **Correspondence**: pick the 12 limb keypoints and their model joints
//! 2. **Camera**: project model joints with a fixed-focal pinhole per view
//! 3. **Optimization**: a fixed number of Adam steps on the reprojection
//!    objective, gradients from the model's reverse-mode tape
//! 4. **Normalization**: rescale the final mesh to the stated height

pub mod adam;
pub mod camera;
pub mod config;
pub mod correspondence;
pub mod fitter;

pub use camera::{Camera, Projection};
pub use config::FitConfig;
pub use fitter::{BodyFitter, FittedBody};
