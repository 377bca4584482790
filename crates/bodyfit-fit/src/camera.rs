//! Perspective projection for the front and side views.
//!
//! Both cameras share the empirical focal length and differ only in the
//! principal point (each view's own image center) and, for the side view,
//! a fixed rotation of the joints about the vertical axis. The rotation is
//! a modelling assumption about how the side photograph was taken, not a
//! calibrated extrinsic.

use bodyfit_core::ViewObservation;
use bodyfit_model::Real;

/// Pinhole camera with an optional yaw applied to points before projection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub focal_length: f64,
    pub center: (f64, f64),
    /// (cos, sin) of the yaw, `None` for the front camera
    yaw: Option<(f64, f64)>,
    min_depth: f64,
}

/// One projected point
#[derive(Debug, Clone, Copy)]
pub struct Projection<R> {
    pub pixel: [R; 2],
    /// Whether the perspective denominator was clamped to the minimum depth
    pub clamped: bool,
}

impl Camera {
    pub fn new(focal_length: f64, center: (f64, f64), min_depth: f64) -> Self {
        Self {
            focal_length,
            center,
            yaw: None,
            min_depth,
        }
    }

    /// Front camera centered on the view's image
    pub fn front(view: &ViewObservation, focal_length: f64, min_depth: f64) -> Self {
        Self::new(focal_length, view.image_center(), min_depth)
    }

    /// Side camera: points are turned by `angle` about the vertical axis first
    pub fn side(view: &ViewObservation, focal_length: f64, angle: f64, min_depth: f64) -> Self {
        Self {
            yaw: Some((angle.cos(), angle.sin())),
            ..Self::front(view, focal_length, min_depth)
        }
    }

    /// Row-vector rotation `p · R_y`: `(x c - z s, y, x s + z c)`
    pub fn rotate<R: Real>(&self, point: [R; 3]) -> [R; 3] {
        match self.yaw {
            None => point,
            Some((c, s)) => {
                let [x, y, z] = point;
                [x * c - z * s, y, x * s + z * c]
            }
        }
    }

    /// `f·(x+Tx)/(z+Tz) + cx`, `f·(y+Ty)/(z+Tz) + cy`
    pub fn project<R: Real>(&self, point: [R; 3], translation: &[R; 3]) -> Projection<R> {
        let [x, y, z] = self.rotate(point);
        let mut depth = z + translation[2];
        let clamped = depth.value() < self.min_depth;
        if clamped {
            // Constant denominator: no gradient through a degenerate depth
            depth = depth.lift(self.min_depth);
        }

        let u = (x + translation[0]) * self.focal_length / depth + self.center.0;
        let v = (y + translation[1]) * self.focal_length / depth + self.center.1;
        Projection {
            pixel: [u, v],
            clamped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bodyfit_model::Tape;
    use nalgebra::Point2;
    use std::f64::consts::FRAC_PI_2;

    fn view(width: u32, height: u32) -> ViewObservation {
        ViewObservation::new(vec![Point2::origin(); 17], width, height)
    }

    #[test]
    fn test_front_projection() {
        let camera = Camera::front(&view(640, 480), 5000.0, 1e-3);
        let p = camera.project([0.1, -0.2, 0.0], &[0.0, 0.0, 50.0]);

        assert!(!p.clamped);
        assert_relative_eq!(p.pixel[0], 5000.0 * 0.1 / 50.0 + 320.0);
        assert_relative_eq!(p.pixel[1], 5000.0 * -0.2 / 50.0 + 240.0);
    }

    #[test]
    fn test_each_view_uses_its_own_center() {
        let front = Camera::front(&view(640, 480), 5000.0, 1e-3);
        let side = Camera::side(&view(1000, 800), 5000.0, FRAC_PI_2, 1e-3);
        let t = [0.0, 0.0, 10.0];

        assert_relative_eq!(front.project([0.0, 0.0, 0.0], &t).pixel[0], 320.0);
        assert_relative_eq!(side.project([0.0, 0.0, 0.0], &t).pixel[1], 400.0);
    }

    #[test]
    fn test_side_rotation_quarter_turn() {
        let side = Camera::side(&view(640, 480), 5000.0, FRAC_PI_2, 1e-3);
        let r = side.rotate([1.0, 2.0, 0.0]);
        assert_relative_eq!(r[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(r[1], 2.0);
        assert_relative_eq!(r[2], 1.0, epsilon = 1e-12);

        let r = side.rotate([0.0, 0.0, 1.0]);
        assert_relative_eq!(r[0], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_depth_clamp_boundary() {
        let camera = Camera::front(&view(100, 100), 1000.0, 1e-3);

        // Just above the minimum: regular projection
        let above = camera.project([1.0, 0.0, 0.0], &[0.0, 0.0, 2e-3]);
        assert!(!above.clamped);
        assert_relative_eq!(above.pixel[0], 1000.0 / 2e-3 + 50.0);

        // At zero and behind the camera: clamped, still finite
        for tz in [0.0, -5.0] {
            let p = camera.project([1.0, 0.0, 0.0], &[0.0, 0.0, tz]);
            assert!(p.clamped);
            assert!(p.pixel[0].is_finite());
            assert_relative_eq!(p.pixel[0], 1000.0 / 1e-3 + 50.0);
        }
    }

    #[test]
    fn test_clamped_depth_blocks_gradient() {
        let camera = Camera::front(&view(100, 100), 1000.0, 1e-3);
        let tape = Tape::new();
        let point = [tape.var(1.0), tape.var(0.0), tape.var(0.0)];
        let translation = [tape.var(0.0), tape.var(0.0), tape.var(-1.0)];

        let p = camera.project(point, &translation);
        assert!(p.clamped);
        let grads = p.pixel[0].gradients();
        assert_eq!(grads.wrt(&translation[2]), 0.0);
        assert_relative_eq!(grads.wrt(&translation[0]), 1000.0 / 1e-3);
    }
}
