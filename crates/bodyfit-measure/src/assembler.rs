//! Measurement pipeline orchestrating fitting, extraction and fallback.
//!
//! [`MeasurementEngine`] runs the 3D path only: fit, pick an extractor,
//! calibrate. [`MeasurementService`] wraps it with the keypoint heuristic so
//! a request always gets a complete measurement record or a single
//! computation failure.

use serde::{Deserialize, Serialize};

use bodyfit_core::{Error, FitRequest, MeasurementMethod, Measurements, Mesh, Result};
use bodyfit_fit::{BodyFitter, FitConfig, FittedBody};
use bodyfit_model::{ModelHandle, ModelStatus};

use crate::calibration::{CalibrationFactors, MaskFractions, RawMeasurements, SliceFractions};
use crate::heuristic::{HeuristicConfig, HeuristicEstimator};
use crate::silhouette::SilhouetteExtractor;
use crate::slicing::MeshSlicer;

/// Extraction settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementConfig {
    pub slices: SliceFractions,
    pub masks: MaskFractions,
    pub calibration: CalibrationFactors,
    pub heuristic: HeuristicConfig,
}

/// Calibrated measurements together with the fit they came from
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub measurements: Measurements,
    pub body: FittedBody,
}

/// Fit-then-extract pipeline
#[derive(Debug, Clone)]
pub struct MeasurementEngine {
    fitter: BodyFitter,
    slicer: MeshSlicer,
    silhouette: SilhouetteExtractor,
    calibration: CalibrationFactors,
}

impl MeasurementEngine {
    pub fn new(fit: FitConfig, config: &MeasurementConfig) -> Self {
        Self {
            fitter: BodyFitter::new(fit),
            slicer: MeshSlicer::new(config.slices, config.calibration),
            silhouette: SilhouetteExtractor::new(config.masks, config.calibration),
            calibration: config.calibration,
        }
    }

    /// Fit the model and measure the result.
    ///
    /// Silhouettes are preferred when both views carry a mask; otherwise the
    /// fitted mesh is sliced. Errors from the fitter are returned unchanged.
    pub fn measure(&self, handle: &ModelHandle, request: &FitRequest) -> Result<EngineOutput> {
        let body = self.fitter.fit(handle, request)?;
        let (raw, method) = self.extract(&body, request);

        if !raw.is_finite() {
            return Err(Error::ComputationFailed(format!(
                "{} extraction produced non-finite values",
                method
            )));
        }

        tracing::info!(
            "Measured {:.1} cm body with method {} (fit loss {:.3})",
            request.height_cm,
            method,
            body.final_loss
        );

        Ok(EngineOutput {
            measurements: self.calibration.apply(&raw, request.height_cm, method),
            body,
        })
    }

    fn extract(&self, body: &FittedBody, request: &FitRequest) -> (RawMeasurements, MeasurementMethod) {
        if let Some((front, side)) = request.masks() {
            match self.silhouette.extract(front, side, request.height_cm) {
                Ok(reading) => return (reading.raw, reading.method),
                Err(e) => {
                    tracing::warn!("Silhouette extraction failed ({}), slicing the mesh instead", e);
                }
            }
        }
        (self.slicer.extract(&body.mesh), MeasurementMethod::MeshSlicing)
    }
}

/// Result handed back to callers
#[derive(Debug, Clone)]
pub struct Estimate {
    pub measurements: Measurements,
    /// Present only when the 3D path produced the measurements
    pub body: Option<FittedBody>,
}

impl Estimate {
    pub fn mesh(&self) -> Option<&Mesh> {
        self.body.as_ref().map(|b| &b.mesh)
    }
}

/// Engine plus keypoint fallback behind one model handle
#[derive(Debug, Clone)]
pub struct MeasurementService {
    handle: ModelHandle,
    engine: MeasurementEngine,
    heuristic: HeuristicEstimator,
}

impl MeasurementService {
    pub fn new(handle: ModelHandle, fit: FitConfig, config: &MeasurementConfig) -> Self {
        Self {
            handle,
            engine: MeasurementEngine::new(fit, config),
            heuristic: HeuristicEstimator::new(config.heuristic),
        }
    }

    pub fn handle(&self) -> &ModelHandle {
        &self.handle
    }

    pub fn status(&self) -> ModelStatus {
        self.handle.status()
    }

    /// Measure `request`, falling back to the keypoint heuristic when the
    /// 3D path fails for any reason.
    pub fn estimate(&self, request: &FitRequest) -> Result<Estimate> {
        match self.engine.measure(&self.handle, request) {
            Ok(output) => Ok(Estimate {
                measurements: output.measurements,
                body: Some(output.body),
            }),
            Err(e) => {
                tracing::warn!("3D measurement failed: {}. Falling back to heuristic", e);
                let measurements = self
                    .heuristic
                    .estimate(&request.front.keypoints, request.height_cm)
                    .map_err(|fallback| {
                        tracing::error!(
                            "Heuristic fallback failed after 3D failure: {} / {}",
                            e,
                            fallback
                        );
                        Error::ComputationFailed(format!(
                            "3D measurement and heuristic fallback both failed: {}",
                            fallback
                        ))
                    })?;
                Ok(Estimate {
                    measurements,
                    body: None,
                })
            }
        }
    }
}
