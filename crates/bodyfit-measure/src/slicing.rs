//! Measurements from horizontal cross-sections of the fitted mesh.

use nalgebra::Point3;

use bodyfit_core::{BoundingBox3D, Mesh};

use crate::calibration::{CalibrationFactors, RawMeasurements, SliceFractions};

const CHAIN_EPS: f64 = 1e-9;

/// Intersection of a mesh with the plane `y = height`
#[derive(Debug, Clone)]
pub struct CrossSection {
    pub height: f64,
    /// Line segments, one per crossed triangle
    pub segments: Vec<[Point3<f64>; 2]>,
}

impl CrossSection {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Total length of every segment, all contours included
    pub fn length(&self) -> f64 {
        self.segments.iter().map(|[a, b]| (b - a).norm()).sum()
    }

    pub fn bounds(&self) -> Option<BoundingBox3D> {
        BoundingBox3D::from_points(self.segments.iter().flatten())
    }

    /// Horizontal (X) extent; 0 for an empty section
    pub fn width(&self) -> f64 {
        self.bounds().map_or(0.0, |b| b.width())
    }

    /// Number of separate curves once segments are chained end to end
    pub fn contour_count(&self) -> usize {
        let mut remaining: Vec<[Point3<f64>; 2]> = self.segments.clone();
        let mut contours = 0;

        while let Some([start, mut end]) = remaining.pop() {
            contours += 1;
            loop {
                let next = remaining.iter().position(|[a, b]| {
                    (a - end).norm() < CHAIN_EPS || (b - end).norm() < CHAIN_EPS
                });
                let Some(i) = next else { break };
                let [a, b] = remaining.swap_remove(i);
                end = if (a - end).norm() < CHAIN_EPS { b } else { a };
                if (end - start).norm() < CHAIN_EPS {
                    break;
                }
            }
        }

        contours
    }
}

/// Slice `mesh` with the horizontal plane at `height`.
///
/// A vertex lying exactly on the plane counts as above it, so shared
/// edges are never emitted twice.
pub fn section(mesh: &Mesh, height: f64) -> CrossSection {
    let mut segments = Vec::new();

    for face in mesh.faces.iter() {
        let corners = face.map(|i| mesh.vertices[i as usize]);
        let d = corners.map(|p| p.y - height);
        let above = d.map(|v| v >= 0.0);
        if above.iter().all(|&a| a) || above.iter().all(|&a| !a) {
            continue;
        }

        let mut hits = [Point3::origin(); 2];
        let mut n = 0;
        for (i, j) in [(0, 1), (1, 2), (2, 0)] {
            if above[i] != above[j] {
                let t = d[i] / (d[i] - d[j]);
                hits[n] = corners[i] + (corners[j] - corners[i]) * t;
                n += 1;
            }
        }
        // Two crossed edges; a corner resting on the plane yields a point, not a segment
        if n == 2 && (hits[1] - hits[0]).norm() > CHAIN_EPS {
            segments.push(hits);
        }
    }

    CrossSection { height, segments }
}

/// Mesh-slicing measurement extractor
#[derive(Debug, Clone, Default)]
pub struct MeshSlicer {
    fractions: SliceFractions,
    calibration: CalibrationFactors,
}

impl MeshSlicer {
    pub fn new(fractions: SliceFractions, calibration: CalibrationFactors) -> Self {
        Self {
            fractions,
            calibration,
        }
    }

    /// Plane height at `fraction` of the mesh extent, from the lowest vertex
    fn plane(bounds: &BoundingBox3D, fraction: f64) -> f64 {
        bounds.min.y + bounds.height() * fraction
    }

    /// Raw lengths in centimeters. Planes that miss the mesh yield 0.
    pub fn extract(&self, mesh: &Mesh) -> RawMeasurements {
        let Some(bounds) = mesh.bounds() else {
            return RawMeasurements::default();
        };
        let height = bounds.height();

        let chest = section(mesh, Self::plane(&bounds, self.fractions.chest));
        let waist = section(mesh, Self::plane(&bounds, self.fractions.waist));
        let hips = section(mesh, Self::plane(&bounds, self.fractions.hips));
        let shoulder = section(mesh, Self::plane(&bounds, self.fractions.shoulder));

        for (name, s) in [("chest", &chest), ("waist", &waist), ("hips", &hips), ("shoulder", &shoulder)] {
            if s.is_empty() {
                tracing::warn!("No {} cross-section at y = {:.3}, reporting 0", name, s.height);
            }
        }

        RawMeasurements {
            shoulder_width: shoulder.width(),
            chest_circumference: chest.length(),
            waist_circumference: waist.length(),
            hip_circumference: hips.length(),
            arm_length: height * self.calibration.arm_to_height,
            leg_length: height * self.calibration.leg_to_height,
        }
        .scaled(100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bodyfit_core::Faces;
    use bodyfit_model::BodyModel;
    use std::f64::consts::PI;
    use std::sync::Arc;

    /// Closed prism: regular `n`-gon of circumradius `r` extruded from y0 to y1
    fn prism(n: usize, r: f64, y0: f64, y1: f64) -> Mesh {
        let mut vertices = Vec::new();
        for y in [y0, y1] {
            for k in 0..n {
                let phi = 2.0 * PI * k as f64 / n as f64;
                vertices.push(Point3::new(r * phi.cos(), y, r * phi.sin()));
            }
        }
        let n32 = n as u32;
        let faces: Vec<[u32; 3]> = (0..n32)
            .flat_map(|k| {
                let next = (k + 1) % n32;
                [[k, next, n32 + next], [k, n32 + next, n32 + k]]
            })
            .collect();
        let faces: Faces = Arc::from(faces);
        Mesh::new(vertices, faces)
    }

    #[test]
    fn test_square_prism_section() {
        let mesh = prism(4, 1.0, 0.0, 2.0);
        let s = section(&mesh, 0.7);

        assert_eq!(s.segments.len(), 8);
        assert_relative_eq!(s.length(), 4.0 * 2f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(s.width(), 2.0, epsilon = 1e-12);
        assert_eq!(s.contour_count(), 1);
    }

    #[test]
    fn test_polygon_perimeter_approaches_circle() {
        let mesh = prism(64, 0.15, 0.0, 1.0);
        let s = section(&mesh, 0.5);
        let expected = 64.0 * 2.0 * 0.15 * (PI / 64.0).sin();
        assert_relative_eq!(s.length(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_plane_outside_mesh() {
        let mesh = prism(8, 1.0, 0.0, 1.0);
        let s = section(&mesh, 1.5);
        assert!(s.is_empty());
        assert_eq!(s.length(), 0.0);
        assert_eq!(s.width(), 0.0);
        assert_eq!(s.contour_count(), 0);
    }

    #[test]
    fn test_plane_through_vertex_ring() {
        // On-plane vertices count as above: the bottom ring touches nothing below
        let mesh = prism(8, 1.0, 0.0, 1.0);
        assert!(section(&mesh, 0.0).is_empty());

        // The top ring is reached from below and traced once
        let s = section(&mesh, 1.0);
        assert_eq!(s.contour_count(), 1);
        let expected = 8.0 * 2.0 * (PI / 8.0).sin();
        assert_relative_eq!(s.length(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_mesh_extracts_zeros() {
        let mesh = Mesh::new(Vec::new(), Arc::from(Vec::new()));
        let raw = MeshSlicer::default().extract(&mesh);
        assert_eq!(raw, RawMeasurements::default());
    }

    #[test]
    fn test_procedural_body_sections() {
        let model = BodyModel::procedural().unwrap();
        let (mesh, _) = model.evaluate(&model.neutral_parameters(0.0)).unwrap();
        let bounds = mesh.bounds().unwrap();
        let plane = |f: f64| bounds.min.y + bounds.height() * f;

        // Torso only at chest, waist and shoulder levels; legs are below the hips plane
        for fraction in [0.82, 0.72, 0.58, 0.48] {
            assert_eq!(section(&mesh, plane(fraction)).contour_count(), 1, "fraction {}", fraction);
        }
        // Two legs at knee level
        assert_eq!(section(&mesh, 0.3).contour_count(), 2);

        let raw = MeshSlicer::default().extract(&mesh);
        assert!(raw.shoulder_width > 35.0 && raw.shoulder_width < 41.0);
        assert!(raw.chest_circumference > raw.waist_circumference);
        assert!(raw.hip_circumference > 0.0);
        assert_relative_eq!(raw.arm_length, 170.0 * 0.35, epsilon = 1e-9);
        assert_relative_eq!(raw.leg_length, 170.0 * 0.48, epsilon = 1e-9);
    }

    #[test]
    fn test_extraction_scales_with_mesh() {
        let model = BodyModel::procedural().unwrap();
        let (mut mesh, _) = model.evaluate(&model.neutral_parameters(0.0)).unwrap();
        let base = MeshSlicer::default().extract(&mesh);

        mesh.scale_uniform(1.1);
        let scaled = MeshSlicer::default().extract(&mesh);
        assert_relative_eq!(scaled.chest_circumference, base.chest_circumference * 1.1, epsilon = 1e-9);
        assert_relative_eq!(scaled.shoulder_width, base.shoulder_width * 1.1, epsilon = 1e-9);
        assert_relative_eq!(scaled.leg_length, base.leg_length * 1.1, epsilon = 1e-9);
    }
}
