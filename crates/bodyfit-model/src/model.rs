//! Parametric body model forward pass.
//!
//! SMPL-style linear blend skinning:
//!
//! 1. Shape the rest template with the beta blend directions
//! 2. Regress rest joints from the shaped template (precomputed as an
//!    affine function of the betas)
//! 3. Convert axis-angle parameters to rotations (Rodrigues)
//! 4. Chain the rotations along the kinematic tree
//! 5. Add pose-corrective offsets, skin every vertex, translate
//!
//! Every step is written against [`Real`], so gradients flow from joints
//! and vertices back to all four parameter groups when evaluated on a tape.

use std::sync::Arc;

use nalgebra::Point3;

use bodyfit_core::{Error, Faces, Mesh, Result};

use crate::autodiff::Real;
use crate::description::ModelDescription;
use crate::params::BodyParameters;

pub type Vec3<R> = [R; 3];
type Mat3<R> = [[R; 3]; 3];

/// Vertices and joints produced by one forward pass
#[derive(Debug, Clone)]
pub struct BodyOutput<R> {
    pub vertices: Vec<Vec3<R>>,
    pub joints: Vec<Vec3<R>>,
}

/// Joints from the pelvis through both wrists in the SMPL ordering. A model
/// file with fewer cannot be fitted to detector keypoints.
pub const BODY_JOINTS: usize = 22;

/// Loaded, immutable body model. Shared across fits behind an `Arc`.
#[derive(Debug)]
pub struct BodyModel {
    name: String,
    template: Vec<[f64; 3]>,
    faces: Faces,
    parents: Vec<Option<usize>>,
    shape_dirs: Vec<Vec<[f64; 3]>>,
    pose_dirs: Vec<Vec<[f64; 3]>>,
    joint_template: Vec<[f64; 3]>,
    joint_shape_dirs: Vec<Vec<[f64; 3]>>,
    skinning: Vec<Vec<(usize, f64)>>,
}

/// Intermediate kinematic state shared by the joint and vertex passes
struct Kinematics<R> {
    rest_joints: Vec<Vec3<R>>,
    local_rotations: Vec<Mat3<R>>,
    global_rotations: Vec<Mat3<R>>,
    global_translations: Vec<Vec3<R>>,
}

impl BodyModel {
    pub fn from_description(description: ModelDescription) -> Result<Self> {
        description.validate()?;

        let regress = |field: &[[f64; 3]]| -> Vec<[f64; 3]> {
            description
                .joint_regressor
                .iter()
                .map(|row| {
                    row.iter().fold([0.0; 3], |mut acc, &(v, w)| {
                        let p = field[v as usize];
                        acc[0] += w * p[0];
                        acc[1] += w * p[1];
                        acc[2] += w * p[2];
                        acc
                    })
                })
                .collect()
        };

        let joint_template = regress(&description.template);
        let joint_shape_dirs = description
            .shape_dirs
            .iter()
            .map(|dir| regress(dir))
            .collect();

        let parents = description
            .parents
            .iter()
            .map(|&p| usize::try_from(p).ok())
            .collect();

        let skinning = description
            .skinning_weights
            .iter()
            .map(|row| row.iter().map(|&(j, w)| (j as usize, w)).collect())
            .collect();

        Ok(Self {
            name: description.name,
            template: description.template,
            faces: Arc::from(description.faces),
            parents,
            shape_dirs: description.shape_dirs,
            pose_dirs: description.pose_dirs,
            joint_template,
            joint_shape_dirs,
            skinning,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertex_count(&self) -> usize {
        self.template.len()
    }

    pub fn joint_count(&self) -> usize {
        self.parents.len()
    }

    pub fn n_betas(&self) -> usize {
        self.shape_dirs.len()
    }

    pub fn n_pose(&self) -> usize {
        self.joint_count().saturating_sub(1) * 3
    }

    /// Shared triangle topology; cloning the handle never copies the buffer
    pub fn faces(&self) -> Faces {
        Arc::clone(&self.faces)
    }

    /// Zero shape and pose at the given depth
    pub fn neutral_parameters(&self, depth: f64) -> BodyParameters {
        BodyParameters::neutral(self.n_betas(), self.n_pose(), depth)
    }

    /// Posed 3D joints only (cheap path used inside the optimization loop)
    pub fn joints<R: Real>(&self, params: &BodyParameters<R>) -> Result<Vec<Vec3<R>>> {
        self.check_dimensions(params)?;
        let kin = self.kinematics(params);
        Ok(self.posed_joints(&kin, params))
    }

    /// Full forward pass: posed vertices and joints
    pub fn forward<R: Real>(&self, params: &BodyParameters<R>) -> Result<BodyOutput<R>> {
        self.check_dimensions(params)?;
        let kin = self.kinematics(params);
        let vertices = self.skin(&kin, params);
        let joints = self.posed_joints(&kin, params);
        Ok(BodyOutput { vertices, joints })
    }

    /// Plain evaluation packaged as a mesh plus joint points
    pub fn evaluate(&self, params: &BodyParameters) -> Result<(Mesh, Vec<Point3<f64>>)> {
        let output = self.forward(params)?;
        let vertices = output
            .vertices
            .iter()
            .map(|v| Point3::new(v[0], v[1], v[2]))
            .collect();
        let joints = output
            .joints
            .iter()
            .map(|j| Point3::new(j[0], j[1], j[2]))
            .collect();
        Ok((Mesh::new(vertices, self.faces()), joints))
    }

    fn check_dimensions<R>(&self, params: &BodyParameters<R>) -> Result<()> {
        if params.betas.len() != self.n_betas() || params.body_pose.len() != self.n_pose() {
            return Err(Error::InvalidObservation(format!(
                "model {} expects {} shape and {} pose parameters, got {} and {}",
                self.name,
                self.n_betas(),
                self.n_pose(),
                params.betas.len(),
                params.body_pose.len()
            )));
        }
        Ok(())
    }

    fn kinematics<R: Real>(&self, params: &BodyParameters<R>) -> Kinematics<R> {
        let anchor = params.translation[0];

        let rest_joints: Vec<Vec3<R>> = (0..self.joint_count())
            .map(|j| {
                let base = self.joint_template[j];
                std::array::from_fn(|axis| {
                    blend(anchor, base[axis], &params.betas, |b| {
                        self.joint_shape_dirs[b][j][axis]
                    })
                })
            })
            .collect();

        let local_rotations: Vec<Mat3<R>> = (0..self.joint_count())
            .map(|j| rodrigues(params.joint_rotation(j)))
            .collect();

        let mut global_rotations: Vec<Mat3<R>> = Vec::with_capacity(self.joint_count());
        let mut global_translations: Vec<Vec3<R>> = Vec::with_capacity(self.joint_count());

        for j in 0..self.joint_count() {
            match self.parents[j] {
                None => {
                    global_rotations.push(local_rotations[j]);
                    global_translations.push(rest_joints[j]);
                }
                Some(p) => {
                    let offset = sub(rest_joints[j], rest_joints[p]);
                    let rotated = mat_vec(&global_rotations[p], offset);
                    global_translations.push(add(rotated, global_translations[p]));
                    global_rotations.push(mat_mul(&global_rotations[p], &local_rotations[j]));
                }
            }
        }

        Kinematics {
            rest_joints,
            local_rotations,
            global_rotations,
            global_translations,
        }
    }

    fn posed_joints<R: Real>(&self, kin: &Kinematics<R>, params: &BodyParameters<R>) -> Vec<Vec3<R>> {
        kin.global_translations
            .iter()
            .map(|&t| add(t, params.translation))
            .collect()
    }

    fn skin<R: Real>(&self, kin: &Kinematics<R>, params: &BodyParameters<R>) -> Vec<Vec3<R>> {
        let anchor = params.translation[0];

        // Pose features: flattened (R - I) of every non-root joint
        let pose_features: Vec<R> = if self.pose_dirs.is_empty() {
            Vec::new()
        } else {
            kin.local_rotations
                .iter()
                .skip(1)
                .flat_map(|rot| {
                    (0..9).map(move |k| {
                        let (r, c) = (k / 3, k % 3);
                        if r == c {
                            rot[r][c] - 1.0
                        } else {
                            rot[r][c]
                        }
                    })
                })
                .collect()
        };

        // Skinning transforms: x -> G_R x + (G_t - G_R J_rest)
        let skin_offsets: Vec<Vec3<R>> = (0..self.joint_count())
            .map(|j| {
                let rotated_rest = mat_vec(&kin.global_rotations[j], kin.rest_joints[j]);
                sub(kin.global_translations[j], rotated_rest)
            })
            .collect();

        (0..self.vertex_count())
            .map(|v| {
                let base = self.template[v];
                let mut rest: Vec3<R> = std::array::from_fn(|axis| {
                    blend(anchor, base[axis], &params.betas, |b| self.shape_dirs[b][v][axis])
                });

                if !pose_features.is_empty() {
                    for (axis, coord) in rest.iter_mut().enumerate() {
                        *coord = accumulate(*coord, &pose_features, |k| self.pose_dirs[k][v][axis]);
                    }
                }

                let mut posed: Option<Vec3<R>> = None;
                for &(j, w) in &self.skinning[v] {
                    if w == 0.0 {
                        continue;
                    }
                    let moved = add(mat_vec(&kin.global_rotations[j], rest), skin_offsets[j]);
                    let weighted = scale(moved, w);
                    posed = Some(match posed {
                        None => weighted,
                        Some(acc) => add(acc, weighted),
                    });
                }

                add(posed.unwrap_or(rest), params.translation)
            })
            .collect()
    }
}

/// `base + Σ coeffs[k] * dir(k)`, skipping zero directions
fn blend<R: Real>(anchor: R, base: f64, coeffs: &[R], dir: impl Fn(usize) -> f64) -> R {
    let mut acc: Option<R> = None;
    for (k, &c) in coeffs.iter().enumerate() {
        let d = dir(k);
        if d == 0.0 {
            continue;
        }
        let term = c * d;
        acc = Some(match acc {
            None => term + base,
            Some(a) => a + term,
        });
    }
    acc.unwrap_or_else(|| anchor.lift(base))
}

/// `start + Σ coeffs[k] * dir(k)`, skipping zero directions
fn accumulate<R: Real>(start: R, coeffs: &[R], dir: impl Fn(usize) -> f64) -> R {
    coeffs.iter().enumerate().fold(start, |acc, (k, &c)| {
        let d = dir(k);
        if d == 0.0 {
            acc
        } else {
            acc + c * d
        }
    })
}

/// Axis-angle to rotation matrix: `R = (1 - bθ²) I + a K + b r rᵀ`
/// with `a = sin θ / θ` and `b = (1 - cos θ) / θ²`.
pub fn rodrigues<R: Real>(r: Vec3<R>) -> Mat3<R> {
    let [x, y, z] = r;
    let theta2 = x * x + y * y + z * z;

    let (a, b) = if theta2.value() < 1e-12 {
        // Taylor expansion around zero keeps the gradient finite
        (theta2 * (-1.0 / 6.0) + 1.0, theta2 * (-1.0 / 24.0) + 0.5)
    } else {
        let theta = theta2.sqrt();
        (theta.sin() / theta, (-theta.cos() + 1.0) / theta2)
    };

    let diag = -(b * theta2) + 1.0;
    let (bxy, bxz, byz) = (b * x * y, b * x * z, b * y * z);

    [
        [diag + b * x * x, -(a * z) + bxy, a * y + bxz],
        [a * z + bxy, diag + b * y * y, -(a * x) + byz],
        [-(a * y) + bxz, a * x + byz, diag + b * z * z],
    ]
}

fn mat_mul<R: Real>(lhs: &Mat3<R>, rhs: &Mat3<R>) -> Mat3<R> {
    std::array::from_fn(|r| {
        std::array::from_fn(|c| lhs[r][0] * rhs[0][c] + lhs[r][1] * rhs[1][c] + lhs[r][2] * rhs[2][c])
    })
}

fn mat_vec<R: Real>(m: &Mat3<R>, v: Vec3<R>) -> Vec3<R> {
    std::array::from_fn(|r| m[r][0] * v[0] + m[r][1] * v[1] + m[r][2] * v[2])
}

fn add<R: Real>(a: Vec3<R>, b: Vec3<R>) -> Vec3<R> {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn sub<R: Real>(a: Vec3<R>, b: Vec3<R>) -> Vec3<R> {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn scale<R: Real>(a: Vec3<R>, s: f64) -> Vec3<R> {
    [a[0] * s, a[1] * s, a[2] * s]
}
