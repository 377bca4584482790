//! Geometric utilities for meshes and cross-sections.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;

/// Shared, read-only triangle topology of a body model variant
pub type Faces = Arc<[[u32; 3]]>;

/// Axis-aligned bounding box in 3D space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox3D {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl BoundingBox3D {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f64>>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;

        let mut min = *first;
        let mut max = *first;
        for p in iter {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }

        Some(Self { min, max })
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

/// Triangle mesh in meters, Y up
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<Point3<f64>>,
    pub faces: Faces,
}

impl Mesh {
    pub fn new(vertices: Vec<Point3<f64>>, faces: Faces) -> Self {
        Self { vertices, faces }
    }

    pub fn bounds(&self) -> Option<BoundingBox3D> {
        BoundingBox3D::from_points(&self.vertices)
    }

    /// Vertical extent (max Y - min Y); 0 for an empty mesh
    pub fn height(&self) -> f64 {
        self.bounds().map_or(0.0, |b| b.height())
    }

    /// Multiply every coordinate by `factor`
    pub fn scale_uniform(&mut self, factor: f64) {
        for v in &mut self.vertices {
            v.coords *= factor;
        }
    }
}

/// Perimeter of an ellipse given its two diameters, using the
/// root-mean-square approximation `π·√((w² + d²)/2)`
pub fn ellipse_perimeter(width: f64, depth: f64) -> f64 {
    PI * ((width * width + depth * depth) / 2.0).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_square_mesh() -> Mesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 0.5),
            Point3::new(0.0, 2.0, 0.5),
        ];
        let faces: Faces = Arc::from(vec![[0, 1, 2], [0, 2, 3]]);
        Mesh::new(vertices, faces)
    }

    #[test]
    fn test_bounding_box_from_points() {
        let points = [
            Point3::new(0.2, -1.0, 0.0),
            Point3::new(-0.3, 0.5, 0.1),
            Point3::new(0.1, 0.7, -0.4),
        ];
        let bbox = BoundingBox3D::from_points(&points).unwrap();

        assert_eq!(bbox.min, Point3::new(-0.3, -1.0, -0.4));
        assert_eq!(bbox.max, Point3::new(0.2, 0.7, 0.1));
        assert!(BoundingBox3D::from_points(&[]).is_none());
    }

    #[test]
    fn test_mesh_height_and_scale() {
        let mut mesh = unit_square_mesh();
        assert_relative_eq!(mesh.height(), 2.0);

        mesh.scale_uniform(0.85);
        let bounds = mesh.bounds().unwrap();
        assert_relative_eq!(bounds.height(), 1.7, epsilon = 1e-12);
        assert_relative_eq!(bounds.width(), 0.85, epsilon = 1e-12);
        assert_relative_eq!(bounds.max.z, 0.425, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_mesh_height() {
        let mesh = Mesh::new(Vec::new(), Arc::from(Vec::new()));
        assert_eq!(mesh.height(), 0.0);
    }

    #[test]
    fn test_ellipse_circle_case() {
        // Equal diameters collapse to a circle: π·√((d²+d²)/2) = π·d
        let d = 30.0;
        assert_relative_eq!(ellipse_perimeter(d, d), PI * d, epsilon = 1e-12);
    }

    #[test]
    fn test_ellipse_perimeter_symmetry() {
        assert_relative_eq!(ellipse_perimeter(30.0, 20.0), ellipse_perimeter(20.0, 30.0));
        assert_relative_eq!(
            ellipse_perimeter(30.0, 20.0),
            PI * (650.0f64).sqrt(),
            epsilon = 1e-12
        );
    }
}
