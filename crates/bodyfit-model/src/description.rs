//! On-disk body-model description.
//!
//! A description is a JSON document holding everything the forward pass
//! needs: the rest template, triangle topology, kinematic tree, blend
//! directions, joint regressor and skinning weights. Sparse structures are
//! stored as `(index, weight)` pairs.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use bodyfit_core::{Error, Result};

/// Serialized parametric body model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescription {
    /// Human-readable variant name, e.g. `SMPL_NEUTRAL`
    pub name: String,
    /// Rest-pose vertex positions (meters)
    pub template: Vec<[f64; 3]>,
    /// Triangle vertex indices
    pub faces: Vec<[u32; 3]>,
    /// Parent joint per joint; the root uses -1
    pub parents: Vec<i32>,
    /// Shape blend directions, one per-vertex offset field per beta
    pub shape_dirs: Vec<Vec<[f64; 3]>>,
    /// Pose-corrective directions, one per-vertex offset field per entry
    /// of the flattened `(R - I)` matrices of the non-root joints
    #[serde(default)]
    pub pose_dirs: Vec<Vec<[f64; 3]>>,
    /// Sparse joint regressor rows: `(vertex, weight)` per joint
    pub joint_regressor: Vec<Vec<(u32, f64)>>,
    /// Sparse skinning weights: `(joint, weight)` per vertex
    pub skinning_weights: Vec<Vec<(u32, f64)>>,
}

impl ModelDescription {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let description: ModelDescription = serde_json::from_str(&content)?;
        description.validate()?;
        Ok(description)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn n_vertices(&self) -> usize {
        self.template.len()
    }

    pub fn n_joints(&self) -> usize {
        self.parents.len()
    }

    pub fn n_betas(&self) -> usize {
        self.shape_dirs.len()
    }

    /// Number of body-pose scalars (three per non-root joint)
    pub fn n_pose(&self) -> usize {
        self.n_joints().saturating_sub(1) * 3
    }

    /// Structural consistency checks performed once at load time
    pub fn validate(&self) -> Result<()> {
        let nv = self.n_vertices();
        let nj = self.n_joints();

        if nv == 0 {
            return Err(invalid(&self.name, "template has no vertices"));
        }
        if nj == 0 {
            return Err(invalid(&self.name, "kinematic tree has no joints"));
        }

        for (j, &parent) in self.parents.iter().enumerate() {
            let ok = if j == 0 {
                parent < 0
            } else {
                parent >= 0 && (parent as usize) < j
            };
            if !ok {
                return Err(invalid(
                    &self.name,
                    &format!("joint {} has invalid parent {}", j, parent),
                ));
            }
        }

        if let Some(face) = self
            .faces
            .iter()
            .find(|f| f.iter().any(|&i| i as usize >= nv))
        {
            return Err(invalid(
                &self.name,
                &format!("face {:?} references a missing vertex", face),
            ));
        }

        for (k, dir) in self.shape_dirs.iter().enumerate() {
            if dir.len() != nv {
                return Err(invalid(
                    &self.name,
                    &format!("shape direction {} has {} entries, expected {}", k, dir.len(), nv),
                ));
            }
        }

        if !self.pose_dirs.is_empty() {
            let expected = nj.saturating_sub(1) * 9;
            if self.pose_dirs.len() != expected {
                return Err(invalid(
                    &self.name,
                    &format!(
                        "{} pose directions, expected {}",
                        self.pose_dirs.len(),
                        expected
                    ),
                ));
            }
            if self.pose_dirs.iter().any(|dir| dir.len() != nv) {
                return Err(invalid(&self.name, "pose direction length mismatch"));
            }
        }

        if self.joint_regressor.len() != nj {
            return Err(invalid(
                &self.name,
                &format!(
                    "joint regressor has {} rows, expected {}",
                    self.joint_regressor.len(),
                    nj
                ),
            ));
        }
        if self
            .joint_regressor
            .iter()
            .flatten()
            .any(|&(v, _)| v as usize >= nv)
        {
            return Err(invalid(&self.name, "joint regressor references a missing vertex"));
        }

        if self.skinning_weights.len() != nv {
            return Err(invalid(
                &self.name,
                &format!(
                    "{} skinning rows, expected {}",
                    self.skinning_weights.len(),
                    nv
                ),
            ));
        }
        if self
            .skinning_weights
            .iter()
            .flatten()
            .any(|&(j, _)| j as usize >= nj)
        {
            return Err(invalid(&self.name, "skinning weight references a missing joint"));
        }

        Ok(())
    }
}

fn invalid(name: &str, detail: &str) -> Error {
    Error::ModelLoad(format!("{}: {}", name, detail))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> ModelDescription {
        ModelDescription {
            name: "tiny".to_string(),
            template: vec![[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.1, 0.5, 0.0]],
            faces: vec![[0, 1, 2]],
            parents: vec![-1, 0],
            shape_dirs: vec![vec![[0.0, 0.1, 0.0]; 3]],
            pose_dirs: Vec::new(),
            joint_regressor: vec![vec![(0, 1.0)], vec![(1, 1.0)]],
            skinning_weights: vec![vec![(0, 1.0)], vec![(1, 1.0)], vec![(0, 0.5), (1, 0.5)]],
        }
    }

    #[test]
    fn test_valid_description() {
        let d = tiny();
        assert!(d.validate().is_ok());
        assert_eq!(d.n_pose(), 3);
        assert_eq!(d.n_betas(), 1);
    }

    #[test]
    fn test_parent_order_enforced() {
        let mut d = tiny();
        d.parents = vec![-1, 1];
        assert!(matches!(d.validate(), Err(Error::ModelLoad(_))));
    }

    #[test]
    fn test_face_range_enforced() {
        let mut d = tiny();
        d.faces.push([0, 1, 3]);
        assert!(matches!(d.validate(), Err(Error::ModelLoad(_))));
    }

    #[test]
    fn test_pose_dirs_count_enforced() {
        let mut d = tiny();
        d.pose_dirs = vec![vec![[0.0; 3]; 3]; 4];
        assert!(d.validate().is_err());
        d.pose_dirs = vec![vec![[0.0; 3]; 3]; 9];
        assert!(d.validate().is_ok());
    }

    #[test]
    fn test_json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.json");
        tiny().to_json_file(&path).unwrap();

        let loaded = ModelDescription::from_json_file(&path).unwrap();
        assert_eq!(loaded.n_vertices(), 3);
        assert_eq!(loaded.faces, vec![[0, 1, 2]]);
    }
}
