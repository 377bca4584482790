//! Response JSON and mesh export.

use nalgebra::Point3;
use serde::Serialize;
use std::io::{self, Write};

use bodyfit_core::{Measurements, Mesh};
use bodyfit_measure::Estimate;

#[derive(Debug, Serialize)]
pub struct MeshData<'a> {
    pub vertices: &'a [Point3<f64>],
    pub faces: &'a [[u32; 3]],
}

/// Body of an `estimate` response
#[derive(Debug, Serialize)]
pub struct EstimateResponse<'a> {
    pub measurements: &'a Measurements,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh_data: Option<MeshData<'a>>,
}

impl<'a> EstimateResponse<'a> {
    pub fn new(estimate: &'a Estimate, include_mesh: bool) -> Self {
        Self {
            measurements: &estimate.measurements,
            mesh_data: estimate
                .mesh()
                .filter(|_| include_mesh)
                .map(|mesh| MeshData {
                    vertices: &mesh.vertices,
                    faces: &mesh.faces,
                }),
        }
    }
}

/// Write `mesh` as Wavefront OBJ (1-based face indices)
pub fn write_obj<W: Write>(mesh: &Mesh, mut out: W) -> io::Result<()> {
    writeln!(out, "# {} vertices, {} faces", mesh.vertices.len(), mesh.faces.len())?;
    for v in &mesh.vertices {
        writeln!(out, "v {:.6} {:.6} {:.6}", v.x, v.y, v.z)?;
    }
    for [a, b, c] in mesh.faces.iter() {
        writeln!(out, "f {} {} {}", a + 1, b + 1, c + 1)?;
    }
    out.flush()
}
