//! Keypoint-only measurement estimate.
//!
//! Needs no body model: the shoulder-to-ankle pixel distance is matched to a
//! fixed share of the stated height, and every other length is read off the
//! 2D skeleton with that ratio. Used when the fitting path is unavailable or
//! fails.

use nalgebra::{distance, Point2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use bodyfit_core::{validate_keypoints, Error, Keypoint, MeasurementMethod, Measurements, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    /// Share of the stated height spanned by shoulders to ankles
    pub body_height_ratio: f64,
    /// Chest circumference over `shoulder width * PI`
    pub chest_factor: f64,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            body_height_ratio: 0.8,
            chest_factor: 0.9,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeuristicEstimator {
    config: HeuristicConfig,
}

impl HeuristicEstimator {
    pub fn new(config: HeuristicConfig) -> Self {
        Self { config }
    }

    pub fn estimate(&self, keypoints: &[Point2<f64>], height_cm: f64) -> Result<Measurements> {
        validate_keypoints(keypoints)?;
        if !height_cm.is_finite() || height_cm <= 0.0 {
            return Err(Error::InvalidObservation(format!(
                "height must be a positive number of centimeters, got {}",
                height_cm
            )));
        }

        use Keypoint::*;
        let kp = |k: Keypoint| keypoints[k.index()];
        let chain = |ks: [Keypoint; 3]| distance(&kp(ks[0]), &kp(ks[1])) + distance(&kp(ks[1]), &kp(ks[2]));

        let shoulder_y = (kp(LeftShoulder).y + kp(RightShoulder).y) / 2.0;
        let ankle_y = (kp(LeftAnkle).y + kp(RightAnkle).y) / 2.0;
        let pixel_height = (ankle_y - shoulder_y).abs();
        if pixel_height == 0.0 || !pixel_height.is_finite() {
            return Err(Error::InvalidObservation(
                "shoulders and ankles are at the same height".into(),
            ));
        }
        let cm_per_pixel = height_cm * self.config.body_height_ratio / pixel_height;

        let shoulder = distance(&kp(LeftShoulder), &kp(RightShoulder)) * cm_per_pixel;
        let waist = distance(&kp(LeftHip), &kp(RightHip)) * cm_per_pixel;

        let arm = (chain([LeftShoulder, LeftElbow, LeftWrist]) + chain([RightShoulder, RightElbow, RightWrist])) / 2.0;
        let leg = (chain([LeftHip, LeftKnee, LeftAnkle]) + chain([RightHip, RightKnee, RightAnkle])) / 2.0;

        let chest_circumference = shoulder * PI * self.config.chest_factor;
        let waist_circumference = waist * PI;

        tracing::debug!("Heuristic estimate at {:.4} cm/px", cm_per_pixel);

        let measurements = Measurements {
            shoulder_width: shoulder,
            estimated_chest_circumference: chest_circumference,
            estimated_waist_circumference: waist_circumference,
            arm_length: arm * cm_per_pixel,
            leg_length: leg * cm_per_pixel,
            height_cm,
            chest_circumference_cm: chest_circumference,
            waist_circumference_cm: waist_circumference,
            hip_circumference_cm: 0.0,
            waist_width: Some(waist),
            method: MeasurementMethod::Heuristic2d,
        };
        if !measurements.is_finite() {
            return Err(Error::ComputationFailed(
                "keypoint distances overflowed".into(),
            ));
        }
        Ok(measurements.rounded())
    }
}
