//! # Bodyfit-Model
//!
//! Parametric body model for fitting: an SMPL-style skinned mesh whose
//! forward pass is differentiable through a small reverse-mode tape.
//!
//! ## Components
//!
//! - **Autodiff**: tape-based gradients over the [`Real`] scalar trait
//! - **Model**: shape blend, joint regression, kinematic chain, skinning
//! - **Handle**: discovery of installed model files, loaded-or-absent state
//! - **Procedural**: a built-in stand-in model in the same joint layout

pub mod autodiff;
pub mod description;
pub mod handle;
pub mod model;
pub mod params;
pub mod procedural;

pub use autodiff::{Gradients, Real, Tape, Var};
pub use description::ModelDescription;
pub use handle::{ModelHandle, ModelStatus};
pub use model::{BodyModel, BodyOutput, BODY_JOINTS};
pub use params::BodyParameters;
