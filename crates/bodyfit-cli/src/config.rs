//! Command-line configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use bodyfit_core::Gender;
use bodyfit_fit::FitConfig;
use bodyfit_measure::MeasurementConfig;

/// Complete driver configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Body model discovery
    pub model: ModelConfig,

    /// Optimizer settings
    pub fit: FitConfig,

    /// Extraction fractions, calibration and heuristic settings
    pub measurement: MeasurementConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory searched for model description files
    pub dir: PathBuf,

    /// Model variant to load
    pub gender: Gender,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            gender: Gender::Neutral,
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional file, then `BODYFIT_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        Self::build(path, Self::environment())
    }

    /// `BODYFIT_FIT__ITERATIONS=50` sets `fit.iterations`
    fn environment() -> config::Environment {
        config::Environment::with_prefix("BODYFIT")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn build(path: Option<&Path>, env: config::Environment) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder.add_source(env).build()?;
        let config: Self = settings.try_deserialize()?;

        config
            .fit
            .validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::environment().source(Some(map))
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::build(None, env(&[])).unwrap();
        assert_eq!(config.model.dir, PathBuf::from("models"));
        assert_eq!(config.model.gender, Gender::Neutral);
        assert_eq!(config.fit.iterations, 100);
        assert_eq!(config.fit.learning_rate, 0.02);
        assert_eq!(config.measurement.calibration.chest_circumference, 0.60);
    }

    #[test]
    fn test_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bodyfit.toml");
        std::fs::write(
            &path,
            r#"
[model]
dir = "/opt/models"
gender = "female"

[fit]
iterations = 40

[measurement.calibration]
waist_circumference = 0.5
"#,
        )
        .unwrap();

        let config = AppConfig::build(Some(&path), env(&[])).unwrap();
        assert_eq!(config.model.dir, PathBuf::from("/opt/models"));
        assert_eq!(config.model.gender, Gender::Female);
        assert_eq!(config.fit.iterations, 40);
        assert_eq!(config.fit.focal_length, 5000.0);
        assert_eq!(config.measurement.calibration.waist_circumference, 0.5);
        assert_eq!(config.measurement.calibration.leg_length, 1.15);
    }

    #[test]
    fn test_environment_overrides() {
        let config = AppConfig::build(
            None,
            env(&[("BODYFIT_FIT__ITERATIONS", "25"), ("BODYFIT_MODEL__GENDER", "male")]),
        )
        .unwrap();
        assert_eq!(config.fit.iterations, 25);
        assert_eq!(config.model.gender, Gender::Male);
    }

    #[test]
    fn test_invalid_fit_settings_rejected() {
        let result = AppConfig::build(None, env(&[("BODYFIT_FIT__FOCAL_LENGTH", "-1.0")]));
        assert!(result.is_err());
    }
}
