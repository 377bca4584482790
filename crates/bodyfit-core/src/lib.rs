//! # Bodyfit-Core
//!
//! Core types and utilities for the bodyfit photograph-to-measurement
//! engine: observations coming out of the keypoint/silhouette detector,
//! measurement results handed to downstream consumers, the shared error
//! taxonomy and the mesh geometry used by the extractors.

pub mod error;
pub mod geometry;
pub mod mask;
pub mod types;

pub use error::{Error, Result};
pub use geometry::*;
pub use mask::*;
pub use types::*;
