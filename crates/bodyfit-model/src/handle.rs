//! Loaded-or-absent body model handle.
//!
//! Model files are licensed assets that may not be installed. Discovery
//! never fails just because the file is missing: the handle is created in
//! the unavailable state and every model-dependent operation reports
//! [`Error::ModelUnavailable`] so callers can fall back to the heuristic
//! estimator. A file that exists but cannot be parsed is a hard error.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bodyfit_core::{Error, Gender, Result};

use crate::description::ModelDescription;
use crate::model::{BodyModel, BODY_JOINTS};

/// Health of the 3D pipeline as reported to status consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStatus {
    Active,
    Inactive,
}

impl ModelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelStatus::Active => "active",
            ModelStatus::Inactive => "inactive (model missing)",
        }
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared handle to an optional body model.
///
/// Cloning is cheap; the model itself sits behind an `Arc` and is read-only,
/// so one handle can serve any number of concurrent fits.
#[derive(Debug, Clone)]
pub struct ModelHandle {
    gender: Gender,
    source: Option<PathBuf>,
    model: Option<Arc<BodyModel>>,
}

impl ModelHandle {
    /// File locations searched by [`discover`](Self::discover), in order
    pub fn candidate_paths<P: AsRef<Path>>(dir: P, gender: Gender) -> [PathBuf; 2] {
        let dir = dir.as_ref();
        let tag = gender.file_tag();
        [
            dir.join(format!("SMPL_{}.json", tag)),
            dir.join("smplx").join(format!("SMPLX_{}.json", tag)),
        ]
    }

    /// Look for a model of `gender` under `dir`.
    ///
    /// Returns an unavailable handle when no candidate file exists.
    pub fn discover<P: AsRef<Path>>(dir: P, gender: Gender) -> Result<Self> {
        let dir = dir.as_ref();
        match Self::candidate_paths(dir, gender).into_iter().find(|p| p.is_file()) {
            Some(path) => Self::load(path, gender),
            None => {
                tracing::warn!(
                    "No {} body model under {}, 3D measurement disabled",
                    gender,
                    dir.display()
                );
                Ok(Self::unavailable(gender))
            }
        }
    }

    /// Load a specific model file
    pub fn load<P: AsRef<Path>>(path: P, gender: Gender) -> Result<Self> {
        let path = path.as_ref();
        let description = ModelDescription::from_json_file(path).map_err(|e| match e {
            Error::ModelLoad(_) => e,
            other => Error::ModelLoad(format!("{}: {}", path.display(), other)),
        })?;
        let model = BodyModel::from_description(description)?;
        if model.joint_count() < BODY_JOINTS {
            return Err(Error::ModelLoad(format!(
                "{}: model {} has {} joints, at least {} are needed",
                path.display(),
                model.name(),
                model.joint_count(),
                BODY_JOINTS
            )));
        }

        tracing::info!(
            "Loaded body model {} from {} ({} vertices, {} joints, {} betas)",
            model.name(),
            path.display(),
            model.vertex_count(),
            model.joint_count(),
            model.n_betas()
        );

        Ok(Self {
            gender,
            source: Some(path.to_path_buf()),
            model: Some(Arc::new(model)),
        })
    }

    /// Wrap an in-memory model
    pub fn from_model(model: BodyModel, gender: Gender) -> Self {
        Self {
            gender,
            source: None,
            model: Some(Arc::new(model)),
        }
    }

    /// Handle backed by the procedural stand-in model
    pub fn procedural() -> Result<Self> {
        Ok(Self::from_model(BodyModel::procedural()?, Gender::Neutral))
    }

    pub fn unavailable(gender: Gender) -> Self {
        Self {
            gender,
            source: None,
            model: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.model.is_some()
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    /// Path the model was read from, if it came from disk
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn model(&self) -> Result<&Arc<BodyModel>> {
        self.model.as_ref().ok_or(Error::ModelUnavailable)
    }

    pub fn status(&self) -> ModelStatus {
        if self.is_available() {
            ModelStatus::Active
        } else {
            ModelStatus::Inactive
        }
    }
}
