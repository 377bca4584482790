//! # Bodyfit-Measure
//!
//! Turns a fitted body, or the raw observations when no model is available,
//! into named body measurements.
//!
//! ## Strategies
//!
//! - **Silhouettes** (`smpl_3d_masks`): row scans of front and side masks,
//!   each level treated as an ellipse. Preferred when both masks are present.
//! - **Mesh slicing** (`smpl_3d`): horizontal cross-sections of the fitted,
//!   height-normalized mesh.
//! - **Heuristic** (`heuristic_2d`): keypoint distances scaled by the stated
//!   height, used when the 3D path is unavailable or fails.
//!
//! Every 3D result passes through the same [`CalibrationFactors`] before it
//! is reported. Size charts are matched against the reported circumferences.

pub mod assembler;
pub mod calibration;
pub mod heuristic;
pub mod silhouette;
pub mod sizing;
pub mod slicing;

pub use assembler::*;
pub use calibration::*;
pub use heuristic::*;
pub use silhouette::*;
pub use sizing::*;
pub use slicing::*;
