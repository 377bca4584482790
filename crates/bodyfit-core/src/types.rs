//! Fundamental types for the bodyfit engine.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::mask::SilhouetteMask;

/// Keypoint slots of a detector output, in array order (COCO-17).
///
/// Only shoulders through ankles reach the fitter; the face points are
/// carried so requests can be passed through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keypoint {
    Nose,
    LeftEye,
    RightEye,
    LeftEar,
    RightEar,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl Keypoint {
    pub const COUNT: usize = 17;

    /// Position in a keypoint array
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Body model variant selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Neutral,
    Male,
    Female,
}

impl Gender {
    /// Upper-case tag used in model description file names
    pub fn file_tag(&self) -> &'static str {
        match self {
            Gender::Neutral => "NEUTRAL",
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Neutral => write!(f, "neutral"),
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

/// Check that a detector output carries every [`Keypoint`] with finite coordinates
pub fn validate_keypoints(keypoints: &[Point2<f64>]) -> Result<()> {
    if keypoints.len() < Keypoint::COUNT {
        return Err(Error::IncompleteKeypoints {
            expected: Keypoint::COUNT,
            actual: keypoints.len(),
        });
    }

    if let Some(idx) = keypoints
        .iter()
        .position(|p| !p.x.is_finite() || !p.y.is_finite())
    {
        return Err(Error::InvalidObservation(format!(
            "keypoint {} has non-finite coordinates",
            idx
        )));
    }

    Ok(())
}

/// Detector output for one photograph.
///
/// Keypoints are in pixel coordinates, ordered as [`Keypoint`]. The mask,
/// when present, must have the same dimensions as the image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewObservation {
    pub keypoints: Vec<Point2<f64>>,
    pub image_width: u32,
    pub image_height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<SilhouetteMask>,
}

impl ViewObservation {
    pub fn new(keypoints: Vec<Point2<f64>>, image_width: u32, image_height: u32) -> Self {
        Self {
            keypoints,
            image_width,
            image_height,
            mask: None,
        }
    }

    pub fn with_mask(mut self, mask: SilhouetteMask) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn keypoint(&self, keypoint: Keypoint) -> Point2<f64> {
        self.keypoints[keypoint.index()]
    }

    /// Image center in pixels, used as the principal point of the view
    pub fn image_center(&self) -> (f64, f64) {
        (
            self.image_width as f64 / 2.0,
            self.image_height as f64 / 2.0,
        )
    }

    pub fn validate(&self) -> Result<()> {
        validate_keypoints(&self.keypoints)?;

        if self.image_width == 0 || self.image_height == 0 {
            return Err(Error::InvalidObservation(format!(
                "image dimensions must be positive, got {}x{}",
                self.image_width, self.image_height
            )));
        }

        if let Some(mask) = &self.mask {
            if mask.width() != self.image_width || mask.height() != self.image_height {
                return Err(Error::MaskDimensions {
                    mask_width: mask.width(),
                    mask_height: mask.height(),
                    image_width: self.image_width,
                    image_height: self.image_height,
                });
            }

            if mask.vertical_extent().map_or(0, |e| e.pixels()) == 0 {
                return Err(Error::InvalidObservation(
                    "silhouette mask has zero vertical extent".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// One measurement request: a front view, an optional side view and the
/// user's stated height.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitRequest {
    pub front: ViewObservation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<ViewObservation>,
    pub height_cm: f64,
}

impl FitRequest {
    pub fn new(front: ViewObservation, side: Option<ViewObservation>, height_cm: f64) -> Self {
        Self {
            front,
            side,
            height_cm,
        }
    }

    /// Reject requests that cannot be fitted before any work starts
    pub fn validate(&self) -> Result<()> {
        if !self.height_cm.is_finite() || self.height_cm <= 0.0 {
            return Err(Error::InvalidObservation(format!(
                "height must be a positive number of centimeters, got {}",
                self.height_cm
            )));
        }

        self.front.validate()?;
        if let Some(side) = &self.side {
            side.validate()?;
        }

        Ok(())
    }

    /// Both silhouettes, when the request carries a mask for each view
    pub fn masks(&self) -> Option<(&SilhouetteMask, &SilhouetteMask)> {
        let front = self.front.mask.as_ref()?;
        let side = self.side.as_ref()?.mask.as_ref()?;
        Some((front, side))
    }
}

/// Strategy that produced a [`Measurements`] record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasurementMethod {
    /// Keypoint-only pixel ratios, used when the fitting engine is unavailable or fails
    #[serde(rename = "heuristic_2d")]
    Heuristic2d,
    /// Planar cross-sections of the fitted mesh
    #[serde(rename = "smpl_3d")]
    MeshSlicing,
    /// Front and side silhouette row scans
    #[serde(rename = "smpl_3d_masks")]
    Silhouette,
    /// Silhouette row scans where at least one span came from a ratio fallback
    #[serde(rename = "smpl_3d_masks_ratio_fallback")]
    SilhouetteRatioFallback,
}

impl MeasurementMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementMethod::Heuristic2d => "heuristic_2d",
            MeasurementMethod::MeshSlicing => "smpl_3d",
            MeasurementMethod::Silhouette => "smpl_3d_masks",
            MeasurementMethod::SilhouetteRatioFallback => "smpl_3d_masks_ratio_fallback",
        }
    }
}

impl fmt::Display for MeasurementMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named body measurements in centimeters, rounded to one decimal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    pub shoulder_width: f64,
    pub estimated_chest_circumference: f64,
    pub estimated_waist_circumference: f64,
    pub arm_length: f64,
    pub leg_length: f64,
    pub height_cm: f64,
    pub chest_circumference_cm: f64,
    pub waist_circumference_cm: f64,
    /// 0 when the active strategy does not compute it
    pub hip_circumference_cm: f64,
    /// Only reported by the keypoint heuristic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waist_width: Option<f64>,
    pub method: MeasurementMethod,
}

impl Measurements {
    /// Numeric keys every measurement record carries
    pub const REQUIRED_KEYS: [&'static str; 9] = [
        "shoulder_width",
        "estimated_chest_circumference",
        "estimated_waist_circumference",
        "arm_length",
        "leg_length",
        "height_cm",
        "chest_circumference_cm",
        "waist_circumference_cm",
        "hip_circumference_cm",
    ];

    /// Look up a numeric measurement by its external key
    pub fn get(&self, key: &str) -> Option<f64> {
        match key {
            "shoulder_width" => Some(self.shoulder_width),
            "estimated_chest_circumference" => Some(self.estimated_chest_circumference),
            "estimated_waist_circumference" => Some(self.estimated_waist_circumference),
            "arm_length" => Some(self.arm_length),
            "leg_length" => Some(self.leg_length),
            "height_cm" => Some(self.height_cm),
            "chest_circumference_cm" => Some(self.chest_circumference_cm),
            "waist_circumference_cm" => Some(self.waist_circumference_cm),
            "hip_circumference_cm" => Some(self.hip_circumference_cm),
            "waist_width" => self.waist_width,
            _ => None,
        }
    }

    /// Flatten the numeric keys into a map
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let mut map: BTreeMap<String, f64> = Self::REQUIRED_KEYS
            .iter()
            .filter_map(|key| self.get(key).map(|v| (key.to_string(), v)))
            .collect();
        if let Some(w) = self.waist_width {
            map.insert("waist_width".to_string(), w);
        }
        map
    }

    /// Whether every numeric value, `waist_width` included, is finite
    pub fn is_finite(&self) -> bool {
        Self::REQUIRED_KEYS
            .iter()
            .filter_map(|key| self.get(key))
            .chain(self.waist_width)
            .all(f64::is_finite)
    }

    /// Round every value to one decimal place
    pub fn rounded(mut self) -> Self {
        self.shoulder_width = round_to_tenth(self.shoulder_width);
        self.estimated_chest_circumference = round_to_tenth(self.estimated_chest_circumference);
        self.estimated_waist_circumference = round_to_tenth(self.estimated_waist_circumference);
        self.arm_length = round_to_tenth(self.arm_length);
        self.leg_length = round_to_tenth(self.leg_length);
        self.height_cm = round_to_tenth(self.height_cm);
        self.chest_circumference_cm = round_to_tenth(self.chest_circumference_cm);
        self.waist_circumference_cm = round_to_tenth(self.waist_circumference_cm);
        self.hip_circumference_cm = round_to_tenth(self.hip_circumference_cm);
        self.waist_width = self.waist_width.map(round_to_tenth);
        self
    }
}

pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_keypoints() -> Vec<Point2<f64>> {
        (0..Keypoint::COUNT)
            .map(|i| Point2::new(100.0 + i as f64, 50.0 + 30.0 * i as f64))
            .collect()
    }

    #[test]
    fn test_non_finite_keypoint_rejected() {
        let mut keypoints = full_keypoints();
        keypoints[Keypoint::LeftWrist.index()].x = f64::NAN;
        assert!(matches!(
            validate_keypoints(&keypoints),
            Err(Error::InvalidObservation(_))
        ));
        assert!(validate_keypoints(&full_keypoints()).is_ok());
    }

    #[test]
    fn test_incomplete_keypoints_rejected() {
        let view = ViewObservation::new(full_keypoints()[..12].to_vec(), 640, 480);
        match view.validate() {
            Err(Error::IncompleteKeypoints { expected, actual }) => {
                assert_eq!(expected, 17);
                assert_eq!(actual, 12);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_non_positive_height_rejected() {
        let front = ViewObservation::new(full_keypoints(), 640, 480);
        for height in [0.0, -170.0, f64::NAN] {
            let request = FitRequest::new(front.clone(), None, height);
            assert!(matches!(
                request.validate(),
                Err(Error::InvalidObservation(_))
            ));
        }
    }

    #[test]
    fn test_mask_dimension_mismatch() {
        let mask = SilhouetteMask::from_fn(320, 240, |_, y| (20..200).contains(&y));
        let view = ViewObservation::new(full_keypoints(), 640, 480).with_mask(mask);
        assert!(matches!(view.validate(), Err(Error::MaskDimensions { .. })));
    }

    #[test]
    fn test_empty_mask_rejected() {
        let mask = SilhouetteMask::from_fn(64, 48, |_, _| false);
        let view = ViewObservation::new(full_keypoints(), 64, 48).with_mask(mask);
        assert!(matches!(
            view.validate(),
            Err(Error::InvalidObservation(_))
        ));
    }

    #[test]
    fn test_masks_require_both_views() {
        let mask = SilhouetteMask::from_fn(64, 48, |_, y| (5..40).contains(&y));
        let front = ViewObservation::new(full_keypoints(), 64, 48).with_mask(mask.clone());
        let side = ViewObservation::new(full_keypoints(), 64, 48);

        let request = FitRequest::new(front.clone(), Some(side.clone()), 170.0);
        assert!(request.masks().is_none());

        let request = FitRequest::new(front, Some(side.with_mask(mask)), 170.0);
        assert!(request.masks().is_some());
    }

    #[test]
    fn test_measurement_method_tags() {
        let json = serde_json::to_string(&MeasurementMethod::Heuristic2d).unwrap();
        assert_eq!(json, "\"heuristic_2d\"");
        assert_eq!(MeasurementMethod::MeshSlicing.as_str(), "smpl_3d");
    }

    #[test]
    fn test_round_to_tenth() {
        assert_eq!(round_to_tenth(26.1818), 26.2);
        assert_eq!(round_to_tenth(-3.04), -3.0);
    }
}
