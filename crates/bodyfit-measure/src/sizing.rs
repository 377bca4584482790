//! Brand size charts and closest-size matching.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use bodyfit_core::{Measurements, Result};

/// Inclusive `[min, max]` range in centimeters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeRange(pub f64, pub f64);

impl SizeRange {
    /// Distance from `value` to the range, 0 inside it
    pub fn distance(&self, value: f64) -> f64 {
        if value < self.0 {
            self.0 - value
        } else if value > self.1 {
            value - self.1
        } else {
            0.0
        }
    }
}

/// One labelled size. Every key besides `label` and `unit` is a criterion;
/// only `chest` and `waist` are scored, other criteria are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeEntry {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(flatten)]
    pub ranges: BTreeMap<String, SizeRange>,
}

impl SizeEntry {
    /// Measurement key a chart criterion is compared against
    fn measurement_key(criterion: &str) -> Option<&'static str> {
        match criterion {
            "chest" => Some("estimated_chest_circumference"),
            "waist" => Some("estimated_waist_circumference"),
            _ => None,
        }
    }

    /// Total out-of-range distance over the criteria the measurements carry.
    ///
    /// `None` when no criterion could be evaluated.
    pub fn score(&self, measurements: &Measurements) -> Option<f64> {
        let mut used = 0;
        let total = self
            .ranges
            .iter()
            .filter_map(|(criterion, range)| {
                Self::measurement_key(criterion)
                    .and_then(|key| measurements.get(key))
                    .map(|value| range.distance(value))
            })
            .inspect(|_| used += 1)
            .sum::<f64>();

        (used > 0).then_some(total)
    }
}

/// Closest size in `sizes`; the earliest entry wins ties
pub fn best_fit<'a>(sizes: &'a [SizeEntry], measurements: &Measurements) -> Option<&'a SizeEntry> {
    let mut best: Option<(&SizeEntry, f64)> = None;
    for entry in sizes {
        let Some(score) = entry.score(measurements) else {
            continue;
        };
        if best.map_or(true, |(_, s)| score < s) {
            best = Some((entry, score));
        }
    }
    best.map(|(entry, _)| entry)
}

/// Size recommendation for one brand and garment category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandRecommendation {
    pub brand: String,
    pub category: String,
    pub male_size: Option<String>,
    pub female_size: Option<String>,
}

/// A brand's size tables, keyed by gender then garment category
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SizeChart {
    #[serde(default)]
    pub brand: String,
    pub categories: BTreeMap<String, BTreeMap<String, Vec<SizeEntry>>>,
}

impl SizeChart {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    pub fn sizes(&self, gender: &str, category: &str) -> &[SizeEntry] {
        self.categories
            .get(gender)
            .and_then(|c| c.get(category))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn recommend(&self, category: &str, measurements: &Measurements) -> BrandRecommendation {
        let pick = |gender: &str| {
            best_fit(self.sizes(gender, category), measurements).map(|e| e.label.clone())
        };

        BrandRecommendation {
            brand: self.brand.clone(),
            category: category.to_string(),
            male_size: pick("male"),
            female_size: pick("female"),
        }
    }
}
