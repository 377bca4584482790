//! Measurements from front and side silhouette masks.
//!
//! Each view is scaled independently: its foreground vertical extent is
//! taken to be the stated height. At fixed fractions of that extent the
//! front mask gives the body width and the side mask the body depth; each
//! level is treated as an ellipse with those two diameters.
//!
//! A scan row without foreground does not fail the extraction. The missing
//! value is derived from a sibling measurement with a fixed ratio and the
//! result is tagged [`MeasurementMethod::SilhouetteRatioFallback`].

use bodyfit_core::{ellipse_perimeter, Error, MeasurementMethod, Result, SilhouetteMask, VerticalExtent};

use crate::calibration::{CalibrationFactors, MaskFractions, RawMeasurements};

/// One view scaled to centimeters
#[derive(Debug, Clone, Copy)]
struct ViewScan<'a> {
    mask: &'a SilhouetteMask,
    extent: VerticalExtent,
    cm_per_pixel: f64,
}

impl<'a> ViewScan<'a> {
    fn new(mask: &'a SilhouetteMask, height_cm: f64, view: &str) -> Result<Self> {
        let extent = mask
            .vertical_extent()
            .filter(|e| e.pixels() > 0)
            .ok_or_else(|| {
                Error::InvalidObservation(format!("{} mask has zero vertical extent", view))
            })?;

        Ok(Self {
            mask,
            extent,
            cm_per_pixel: height_cm / extent.pixels() as f64,
        })
    }

    /// Horizontal foreground span at `fraction` of the extent, `None` on an empty row
    fn span_cm(&self, fraction: f64) -> Option<f64> {
        let row = self.extent.row_at(fraction, self.mask.height());
        self.mask
            .row_span(row)
            .map(|(first, last)| (last - first) as f64 * self.cm_per_pixel)
    }
}

/// Width and depth of one horizontal level, in centimeters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Girth {
    pub width: f64,
    pub depth: f64,
    /// Whether either diameter came from a ratio rather than a scan
    pub estimated: bool,
}

impl Girth {
    fn resolve(width: Option<f64>, depth: Option<f64>, depth_to_width: f64) -> Option<Self> {
        let (width, depth, estimated) = match (width, depth) {
            (Some(w), Some(d)) => (w, d, false),
            (Some(w), None) => (w, w * depth_to_width, true),
            (None, Some(d)) => (d / depth_to_width, d, true),
            (None, None) => return None,
        };
        Some(Self {
            width,
            depth,
            estimated,
        })
    }

    pub fn circumference(&self) -> f64 {
        ellipse_perimeter(self.width, self.depth)
    }
}

/// Extractor output before calibration
#[derive(Debug, Clone, PartialEq)]
pub struct SilhouetteReading {
    pub raw: RawMeasurements,
    pub chest: Girth,
    pub waist: Girth,
    pub method: MeasurementMethod,
}

/// Mask-based measurement extractor
#[derive(Debug, Clone, Default)]
pub struct SilhouetteExtractor {
    fractions: MaskFractions,
    calibration: CalibrationFactors,
}

impl SilhouetteExtractor {
    pub fn new(fractions: MaskFractions, calibration: CalibrationFactors) -> Self {
        Self {
            fractions,
            calibration,
        }
    }

    pub fn extract(&self, front: &SilhouetteMask, side: &SilhouetteMask, height_cm: f64) -> Result<SilhouetteReading> {
        let front = ViewScan::new(front, height_cm, "front")?;
        let side = ViewScan::new(side, height_cm, "side")?;
        let ratio = self.calibration.depth_to_width;

        let chest = Girth::resolve(
            front.span_cm(self.fractions.chest),
            side.span_cm(self.fractions.chest),
            ratio,
        );
        let waist = Girth::resolve(
            front.span_cm(self.fractions.waist),
            side.span_cm(self.fractions.waist),
            ratio,
        );

        // A level missing in both views borrows its sibling level
        let borrowed = |g: Girth| Girth { estimated: true, ..g };
        let (chest, waist) = match (chest, waist) {
            (Some(c), Some(w)) => (c, w),
            (Some(c), None) => (c, borrowed(c)),
            (None, Some(w)) => (borrowed(w), w),
            (None, None) => {
                return Err(Error::ComputationFailed(
                    "no foreground at the chest or waist rows of either mask".into(),
                ))
            }
        };

        let (shoulder_width, shoulder_estimated) = match front.span_cm(self.fractions.shoulder) {
            Some(w) => (w, false),
            None => (chest.width * self.calibration.shoulder_to_chest_width, true),
        };

        let method = if chest.estimated || waist.estimated || shoulder_estimated {
            tracing::warn!(
                "Silhouette rows without foreground, ratio fallback used (chest: {}, waist: {}, shoulder: {})",
                chest.estimated,
                waist.estimated,
                shoulder_estimated
            );
            MeasurementMethod::SilhouetteRatioFallback
        } else {
            MeasurementMethod::Silhouette
        };

        let limb = height_cm * self.calibration.mask_limb_prefactor;
        let raw = RawMeasurements {
            shoulder_width,
            chest_circumference: chest.circumference(),
            waist_circumference: waist.circumference(),
            hip_circumference: 0.0,
            arm_length: limb * self.calibration.arm_to_height,
            leg_length: limb * self.calibration.leg_to_height,
        };

        if !raw.is_finite() {
            return Err(Error::ComputationFailed("non-finite silhouette measurement".into()));
        }

        Ok(SilhouetteReading {
            raw,
            chest,
            waist,
            method,
        })
    }
}
