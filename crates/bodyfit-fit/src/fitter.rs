//! Analysis-by-synthesis body fitting.
//!
//! The optimizer recovers shape, pose, global orientation and translation
//! by minimizing the pixel disagreement between projected model joints and
//! detected keypoints in the front view and, when present, the side view:
//!
//! ```text
//! loss = mse(front) + mse(side) + w_shape·mean(β²) + w_pose·mean(θ²)
//! ```
//!
//! It runs a fixed number of Adam steps with no convergence test, then
//! evaluates the model once more without gradient tracking and rescales the
//! mesh so its vertical extent matches the user's stated height.

use nalgebra::{Point2, Point3};

use bodyfit_core::{Error, FitRequest, Mesh, Result, ViewObservation};
use bodyfit_model::autodiff::sum;
use bodyfit_model::{BodyModel, BodyParameters, ModelHandle, Real, Tape};

use crate::adam::Adam;
use crate::camera::Camera;
use crate::config::FitConfig;
use crate::correspondence;

/// Result of one completed fit, already height-normalized
#[derive(Debug, Clone)]
pub struct FittedBody {
    /// Posed mesh in meters; shares its faces with the loaded model
    pub mesh: Mesh,
    /// Posed joints, scaled like the mesh
    pub joints: Vec<Point3<f64>>,
    /// Final parameters (before height normalization)
    pub params: BodyParameters,
    /// Objective value at the final parameters
    pub final_loss: f64,
    /// Projections whose depth fell below the minimum, summed over all iterations
    pub clamped_projections: usize,
    /// Uniform factor applied during height normalization
    pub scale: f64,
}

impl FittedBody {
    /// Vertical extent of the normalized mesh in meters
    pub fn height_m(&self) -> f64 {
        self.mesh.height()
    }
}

/// Reprojection term for one view
#[derive(Debug, Clone)]
struct ViewTerm {
    camera: Camera,
    targets: Vec<Point2<f64>>,
}

impl ViewTerm {
    /// Mean squared pixel error over every coordinate of every correspondence
    fn mse<R: Real>(&self, joints: &[[R; 3]], translation: &[R; 3]) -> (R, usize) {
        let mut clamped = 0;
        let squares = correspondence::joint_indices()
            .zip(&self.targets)
            .flat_map(|(joint, target)| {
                // Model joints already carry the translation; the camera adds it again
                let projection = self.camera.project(joints[joint], translation);
                if projection.clamped {
                    clamped += 1;
                }
                let du = projection.pixel[0] - target.x;
                let dv = projection.pixel[1] - target.y;
                [du * du, dv * dv]
            })
            .collect::<Vec<R>>();

        let n = squares.len() as f64;
        let total = sum(squares).unwrap_or_else(|| translation[0].lift(0.0));
        (total / n.max(1.0), clamped)
    }
}

/// Evaluated objective
#[derive(Debug, Clone, Copy)]
struct Evaluation<R> {
    loss: R,
    clamped: usize,
}

/// Complete fitting objective for one request
#[derive(Debug, Clone)]
struct Objective {
    front: ViewTerm,
    side: Option<ViewTerm>,
    shape_weight: f64,
    pose_weight: f64,
}

impl Objective {
    fn new(config: &FitConfig, request: &FitRequest) -> Self {
        let term = |view: &ViewObservation, camera: Camera| ViewTerm {
            camera,
            targets: correspondence::targets(view),
        };

        Self {
            front: term(
                &request.front,
                Camera::front(&request.front, config.focal_length, config.min_depth),
            ),
            side: request.side.as_ref().map(|view| {
                term(
                    view,
                    Camera::side(view, config.focal_length, config.side_view_angle, config.min_depth),
                )
            }),
            shape_weight: config.shape_weight,
            pose_weight: config.pose_weight,
        }
    }

    fn evaluate<R: Real>(&self, model: &BodyModel, params: &BodyParameters<R>) -> Result<Evaluation<R>> {
        let joints = model.joints(params)?;

        let (mut loss, mut clamped) = self.front.mse(&joints, &params.translation);
        if let Some(side) = &self.side {
            let (side_loss, side_clamped) = side.mse(&joints, &params.translation);
            loss = loss + side_loss;
            clamped += side_clamped;
        }

        if let Some(shape) = mean_square(&params.betas) {
            loss = loss + shape * self.shape_weight;
        }
        if let Some(pose) = mean_square(&params.body_pose) {
            loss = loss + pose * self.pose_weight;
        }

        Ok(Evaluation { loss, clamped })
    }
}

fn mean_square<R: Real>(values: &[R]) -> Option<R> {
    let n = values.len() as f64;
    sum(values.iter().map(|&v| v * v)).map(|s| s / n)
}

/// Gradient-based body fitter
#[derive(Debug, Clone, Default)]
pub struct BodyFitter {
    config: FitConfig,
}

impl BodyFitter {
    pub fn new(config: FitConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Fit the model behind `handle` to `request`.
    ///
    /// Fails with [`Error::ModelUnavailable`] before looking at the request
    /// when no model is loaded, with an input error for invalid requests and
    /// with [`Error::NumericDivergence`] when the objective stops being finite.
    pub fn fit(&self, handle: &ModelHandle, request: &FitRequest) -> Result<FittedBody> {
        let model = handle.model()?;
        request.validate()?;
        self.config.validate()?;

        let required = correspondence::required_joint_count();
        if model.joint_count() < required {
            return Err(Error::ModelLoad(format!(
                "model {} has {} joints, fitting needs at least {}",
                model.name(),
                model.joint_count(),
                required
            )));
        }

        let objective = Objective::new(&self.config, request);

        tracing::debug!(
            "Fitting {} over {} iterations ({} view{})",
            model.name(),
            self.config.iterations,
            if objective.side.is_some() { 2 } else { 1 },
            if objective.side.is_some() { "s" } else { "" }
        );

        let mut params = model.neutral_parameters(self.config.initial_depth);
        let mut flat = params.to_flat();
        let mut adam = Adam::new(
            flat.len(),
            self.config.learning_rate,
            self.config.beta1,
            self.config.beta2,
            self.config.epsilon,
        );
        let mut clamped_projections = 0;

        for iteration in 0..self.config.iterations {
            let tape = Tape::with_capacity(1 << 13);
            let tracked = params.track(&tape);
            let evaluation = objective.evaluate(model, &tracked)?;

            let loss = evaluation.loss.value();
            if !loss.is_finite() {
                return Err(Error::NumericDivergence {
                    iteration,
                    detail: format!("objective became {}", loss),
                });
            }
            if evaluation.clamped > 0 {
                tracing::warn!(
                    "Iteration {}: {} projection(s) clamped to minimum depth {}",
                    iteration,
                    evaluation.clamped,
                    self.config.min_depth
                );
                clamped_projections += evaluation.clamped;
            }

            let grads = evaluation.loss.gradients().wrt_all(&tracked.flat_refs());
            if grads.iter().any(|g| !g.is_finite()) {
                return Err(Error::NumericDivergence {
                    iteration,
                    detail: "non-finite gradient".into(),
                });
            }

            if iteration % 10 == 0 {
                tracing::trace!("Iteration {}: loss {:.4}", iteration, loss);
            }

            adam.step(&mut flat, &grads);
            params = params.with_flat(&flat);
            if !params.is_finite() {
                return Err(Error::NumericDivergence {
                    iteration,
                    detail: "non-finite parameters after update".into(),
                });
            }
        }

        let final_loss = objective.evaluate(model, &params)?.loss;
        let (mut mesh, mut joints) = model.evaluate(&params)?;

        let height = mesh.height();
        if !final_loss.is_finite() || !height.is_finite() || height <= 0.0 {
            return Err(Error::NumericDivergence {
                iteration: self.config.iterations,
                detail: format!("final mesh height {} with loss {}", height, final_loss),
            });
        }

        let scale = request.height_cm / 100.0 / height;
        mesh.scale_uniform(scale);
        for joint in &mut joints {
            joint.coords *= scale;
        }

        tracing::debug!(
            "Fit finished: loss {:.4}, scale {:.5}, {} clamped projection(s)",
            final_loss,
            scale,
            clamped_projections
        );

        Ok(FittedBody {
            mesh,
            joints,
            params,
            final_loss,
            clamped_projections,
            scale,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bodyfit_core::{Gender, SilhouetteMask};
    use std::sync::Arc;

    /// Keypoints produced by projecting the procedural body through `camera`
    fn synthetic_view(model: &BodyModel, params: &BodyParameters, camera: &Camera, size: (u32, u32)) -> ViewObservation {
        let joints = model.joints(params).unwrap();
        let mut keypoints = vec![Point2::new(size.0 as f64 / 2.0, 10.0); 17];
        for &(kp, joint) in &correspondence::KEYPOINT_JOINTS {
            let p = camera.project(joints[joint], &params.translation);
            keypoints[kp.index()] = Point2::new(p.pixel[0], p.pixel[1]);
        }
        ViewObservation::new(keypoints, size.0, size.1)
    }

    fn request(with_side: bool) -> (ModelHandle, FitRequest) {
        let handle = ModelHandle::procedural().unwrap();
        let model = handle.model().unwrap();
        let config = FitConfig::default();

        let mut truth = model.neutral_parameters(config.initial_depth);
        truth.translation[0] = 0.3;
        truth.translation[1] = -0.1;
        truth.betas[0] = 0.5;

        let size = (640, 960);
        let frame = ViewObservation::new(vec![Point2::origin(); 17], size.0, size.1);
        let front_cam = Camera::front(&frame, config.focal_length, config.min_depth);
        let side_cam = Camera::side(&frame, config.focal_length, config.side_view_angle, config.min_depth);

        let front = synthetic_view(model, &truth, &front_cam, size);
        let side = with_side.then(|| synthetic_view(model, &truth, &side_cam, size));
        (handle, FitRequest::new(front, side, 175.0))
    }

    fn short_fitter(iterations: usize) -> BodyFitter {
        BodyFitter::new(FitConfig {
            iterations,
            ..FitConfig::default()
        })
    }

    #[test]
    fn test_unavailable_model_rejected_before_validation() {
        let handle = ModelHandle::unavailable(Gender::Neutral);
        let (_, mut req) = request(false);
        req.height_cm = -1.0;

        let result = BodyFitter::default().fit(&handle, &req);
        assert!(matches!(result, Err(Error::ModelUnavailable)));
    }

    #[test]
    fn test_invalid_height_rejected() {
        let (handle, mut req) = request(true);
        req.height_cm = 0.0;
        let result = short_fitter(5).fit(&handle, &req);
        assert!(matches!(result, Err(Error::InvalidObservation(_))));
    }

    #[test]
    fn test_incomplete_keypoints_rejected() {
        let (handle, mut req) = request(false);
        req.front.keypoints.truncate(12);
        let err = short_fitter(5).fit(&handle, &req).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_empty_mask_rejected() {
        let (handle, mut req) = request(true);
        req.front.mask = Some(SilhouetteMask::from_fn(640, 960, |_, _| false));
        let err = short_fitter(5).fit(&handle, &req).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_height_normalization() {
        let (handle, mut req) = request(true);
        for height_cm in [150.0, 175.0, 201.5] {
            req.height_cm = height_cm;
            let fitted = short_fitter(20).fit(&handle, &req).unwrap();
            assert!((fitted.height_m() - height_cm / 100.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_joints_share_mesh_scale() {
        let (handle, req) = request(false);
        let fitted = short_fitter(10).fit(&handle, &req).unwrap();
        let model = handle.model().unwrap();
        let (_, raw_joints) = model.evaluate(&fitted.params).unwrap();

        for (scaled, raw) in fitted.joints.iter().zip(&raw_joints) {
            assert_relative_eq!(scaled.y, raw.y * fitted.scale, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (handle, req) = request(true);
        let fitter = short_fitter(30);
        let a = fitter.fit(&handle, &req).unwrap();
        let b = fitter.fit(&handle, &req).unwrap();

        assert_eq!(a.params, b.params);
        assert_eq!(a.final_loss, b.final_loss);
        assert_eq!(a.mesh.vertices, b.mesh.vertices);
    }

    #[test]
    fn test_loss_decreases() {
        let (handle, req) = request(true);
        let config = FitConfig::default();
        let model = handle.model().unwrap();
        let objective = Objective::new(&config, &req);
        let initial = objective
            .evaluate(model, &model.neutral_parameters(config.initial_depth))
            .unwrap()
            .loss;

        let fitted = BodyFitter::new(config).fit(&handle, &req).unwrap();
        assert!(fitted.final_loss < initial);
        assert_eq!(fitted.clamped_projections, 0);
    }

    #[test]
    fn test_front_only_fit() {
        let (handle, req) = request(false);
        let fitted = short_fitter(10).fit(&handle, &req).unwrap();
        assert!(fitted.final_loss.is_finite());
        assert_eq!(fitted.mesh.vertices.len(), handle.model().unwrap().vertex_count());
    }

    #[test]
    fn test_shallow_depth_is_clamped_not_fatal() {
        // The side camera turns lateral offsets into depth; with the body this
        // close, the right arm ends up behind the camera
        let (handle, req) = request(true);
        let fitter = BodyFitter::new(FitConfig {
            iterations: 5,
            initial_depth: 0.3,
            ..FitConfig::default()
        });

        let fitted = fitter.fit(&handle, &req).unwrap();
        assert!(fitted.clamped_projections > 0);
        assert!(fitted.final_loss.is_finite());
        assert!(fitted.mesh.vertices.iter().all(|v| v.coords.iter().all(|c| c.is_finite())));
    }

    #[test]
    fn test_divergence_is_reported() {
        let (handle, req) = request(false);
        let fitter = BodyFitter::new(FitConfig {
            iterations: 5,
            learning_rate: 1e300,
            ..FitConfig::default()
        });

        let result = fitter.fit(&handle, &req);
        assert!(matches!(result, Err(Error::NumericDivergence { .. })));
    }

    #[test]
    fn test_faces_are_shared_with_model() {
        let (handle, req) = request(false);
        let fitted = short_fitter(3).fit(&handle, &req).unwrap();
        let faces = handle.model().unwrap().faces();
        assert!(Arc::ptr_eq(&fitted.mesh.faces, &faces));
    }

    #[test]
    fn test_parallel_fits_are_independent() {
        let (handle, req) = request(true);
        let fitter = short_fitter(15);
        let sequential = fitter.fit(&handle, &req).unwrap();

        let results: Vec<FittedBody> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..3)
                .map(|_| scope.spawn(|| fitter.fit(&handle, &req).unwrap()))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        for fitted in results {
            assert_eq!(fitted.params, sequential.params);
        }
    }
}
