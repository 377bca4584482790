//! Anatomical height fractions and empirical calibration constants.
//!
//! None of these values is derived; they are tuned multipliers and kept as
//! overridable configuration.

use serde::{Deserialize, Serialize};

use bodyfit_core::{MeasurementMethod, Measurements};

/// Plane heights for mesh slicing, as fractions of the mesh height from the lowest vertex
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SliceFractions {
    pub chest: f64,
    pub waist: f64,
    pub hips: f64,
    pub shoulder: f64,
}

impl Default for SliceFractions {
    fn default() -> Self {
        Self {
            chest: 0.72,
            waist: 0.58,
            hips: 0.48,
            shoulder: 0.82,
        }
    }
}

/// Scan rows for silhouettes, as fractions of the foreground extent from the top
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskFractions {
    pub shoulder: f64,
    pub chest: f64,
    pub waist: f64,
}

impl Default for MaskFractions {
    fn default() -> Self {
        Self {
            shoulder: 0.18,
            chest: 0.28,
            waist: 0.42,
        }
    }
}

/// Final multipliers plus the ratios used where a quantity is not measured
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationFactors {
    pub shoulder_width: f64,
    pub chest_circumference: f64,
    pub waist_circumference: f64,
    /// Hip slices are reported as measured
    pub hip_circumference: f64,
    pub arm_length: f64,
    pub leg_length: f64,

    /// Arm length as a fraction of height
    pub arm_to_height: f64,
    /// Leg length as a fraction of height
    pub leg_to_height: f64,
    /// Extra limb factor applied by the silhouette path before calibration
    pub mask_limb_prefactor: f64,

    /// Body depth over body width at the same level
    pub depth_to_width: f64,
    /// Shoulder width over chest width
    pub shoulder_to_chest_width: f64,
}

impl Default for CalibrationFactors {
    fn default() -> Self {
        Self {
            shoulder_width: 0.9,
            chest_circumference: 0.60,
            waist_circumference: 0.55,
            hip_circumference: 1.0,
            arm_length: 1.05,
            leg_length: 1.15,
            arm_to_height: 0.35,
            leg_to_height: 0.48,
            mask_limb_prefactor: 1.05,
            depth_to_width: 0.72,
            shoulder_to_chest_width: 1.1,
        }
    }
}

/// Uncalibrated extractor output, lengths in centimeters
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawMeasurements {
    pub shoulder_width: f64,
    pub chest_circumference: f64,
    pub waist_circumference: f64,
    pub hip_circumference: f64,
    pub arm_length: f64,
    pub leg_length: f64,
}

impl RawMeasurements {
    pub fn scaled(self, factor: f64) -> Self {
        Self {
            shoulder_width: self.shoulder_width * factor,
            chest_circumference: self.chest_circumference * factor,
            waist_circumference: self.waist_circumference * factor,
            hip_circumference: self.hip_circumference * factor,
            arm_length: self.arm_length * factor,
            leg_length: self.leg_length * factor,
        }
    }

    pub fn is_finite(&self) -> bool {
        [
            self.shoulder_width,
            self.chest_circumference,
            self.waist_circumference,
            self.hip_circumference,
            self.arm_length,
            self.leg_length,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

impl CalibrationFactors {
    /// Apply the multipliers and package a rounded measurement record
    pub fn apply(&self, raw: &RawMeasurements, height_cm: f64, method: MeasurementMethod) -> Measurements {
        let chest = raw.chest_circumference * self.chest_circumference;
        let waist = raw.waist_circumference * self.waist_circumference;

        Measurements {
            shoulder_width: raw.shoulder_width * self.shoulder_width,
            estimated_chest_circumference: chest,
            estimated_waist_circumference: waist,
            arm_length: raw.arm_length * self.arm_length,
            leg_length: raw.leg_length * self.leg_length,
            height_cm,
            chest_circumference_cm: chest,
            waist_circumference_cm: waist,
            hip_circumference_cm: raw.hip_circumference * self.hip_circumference,
            waist_width: None,
            method,
        }
        .rounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_apply_multipliers() {
        let raw = RawMeasurements {
            shoulder_width: 40.0,
            chest_circumference: 150.0,
            waist_circumference: 140.0,
            hip_circumference: 0.0,
            arm_length: 59.5,
            leg_length: 81.6,
        };
        let m = CalibrationFactors::default().apply(&raw, 170.0, MeasurementMethod::MeshSlicing);

        assert_relative_eq!(m.shoulder_width, 36.0);
        assert_relative_eq!(m.estimated_chest_circumference, 90.0);
        assert_relative_eq!(m.chest_circumference_cm, 90.0);
        assert_relative_eq!(m.estimated_waist_circumference, 77.0);
        assert_relative_eq!(m.arm_length, 62.5);
        assert_relative_eq!(m.leg_length, 93.8);
        assert_eq!(m.hip_circumference_cm, 0.0);
        assert_eq!(m.method, MeasurementMethod::MeshSlicing);
    }

    #[test]
    fn test_partial_override() {
        let factors: CalibrationFactors =
            serde_json::from_str(r#"{"chest_circumference": 0.7}"#).unwrap();
        assert_eq!(factors.chest_circumference, 0.7);
        assert_eq!(factors.waist_circumference, 0.55);
    }
}
