//! Parameter groups consumed by the body model.

use serde::{Deserialize, Serialize};

use crate::autodiff::{Real, Tape, Var};

/// Shape, pose, global orientation and translation of one body.
///
/// Generic over the scalar so the same forward pass serves plain
/// evaluation (`f64`) and differentiable evaluation ([`Var`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyParameters<R = f64> {
    /// Shape coefficients (betas)
    pub betas: Vec<R>,
    /// Per-joint axis-angle rotations, excluding the root
    pub body_pose: Vec<R>,
    /// Root axis-angle rotation
    pub global_orient: [R; 3],
    /// World offset applied to every output point
    pub translation: [R; 3],
}

impl BodyParameters<f64> {
    /// Neutral parameters: zero shape and pose, body placed `depth` in front of the camera
    pub fn neutral(n_betas: usize, n_pose: usize, depth: f64) -> Self {
        Self {
            betas: vec![0.0; n_betas],
            body_pose: vec![0.0; n_pose],
            global_orient: [0.0; 3],
            translation: [0.0, 0.0, depth],
        }
    }

    /// Total number of scalars across all four groups
    pub fn len(&self) -> usize {
        self.betas.len() + self.body_pose.len() + 6
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concatenate into a single vector: betas, body pose, orientation, translation
    pub fn to_flat(&self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(self.len());
        flat.extend_from_slice(&self.betas);
        flat.extend_from_slice(&self.body_pose);
        flat.extend_from_slice(&self.global_orient);
        flat.extend_from_slice(&self.translation);
        flat
    }

    /// Inverse of [`to_flat`](Self::to_flat), keeping this instance's group sizes
    pub fn with_flat(&self, flat: &[f64]) -> Self {
        let nb = self.betas.len();
        let np = self.body_pose.len();
        Self {
            betas: flat[..nb].to_vec(),
            body_pose: flat[nb..nb + np].to_vec(),
            global_orient: [flat[nb + np], flat[nb + np + 1], flat[nb + np + 2]],
            translation: [flat[nb + np + 3], flat[nb + np + 4], flat[nb + np + 5]],
        }
    }

    /// Record every parameter as an independent variable on `tape`
    pub fn track<'t>(&self, tape: &'t Tape) -> BodyParameters<Var<'t>> {
        BodyParameters {
            betas: tape.vars(&self.betas),
            body_pose: tape.vars(&self.body_pose),
            global_orient: self.global_orient.map(|v| tape.var(v)),
            translation: self.translation.map(|v| tape.var(v)),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.to_flat().iter().all(|v| v.is_finite())
    }
}

impl<R: Real> BodyParameters<R> {
    /// All tracked scalars in flat order
    pub fn flat_refs(&self) -> Vec<R> {
        let mut flat = Vec::with_capacity(self.betas.len() + self.body_pose.len() + 6);
        flat.extend_from_slice(&self.betas);
        flat.extend_from_slice(&self.body_pose);
        flat.extend_from_slice(&self.global_orient);
        flat.extend_from_slice(&self.translation);
        flat
    }

    /// Axis-angle rotation of joint `joint` (0 is the root)
    pub fn joint_rotation(&self, joint: usize) -> [R; 3] {
        if joint == 0 {
            self.global_orient
        } else {
            let base = (joint - 1) * 3;
            [
                self.body_pose[base],
                self.body_pose[base + 1],
                self.body_pose[base + 2],
            ]
        }
    }
}
