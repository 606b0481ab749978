//! Wind widget configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use signalk_core::{Session, DEFAULT_SOURCE};
use thiserror::Error;

use crate::units::SPEED_UNITS;

/// Longest accepted true wind sector window (one day).
pub const MAX_WINDOW_SECONDS: u64 = 86_400;

/// Errors that can occur while loading or validating widget configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read widget config: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid JSON for this widget.
    #[error("Invalid widget config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Speed unit has no converter.
    #[error("Unknown speed unit: {0}")]
    UnknownUnit(String),

    /// Sector window outside `1..=MAX_WINDOW_SECONDS`.
    #[error("Invalid wind sector window: {0} seconds")]
    InvalidWindow(u64),

    /// A path classification pattern failed to compile.
    #[error("Invalid path pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Wind widget settings, as stored alongside the dashboard layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WindWidgetConfig {
    pub heading_path: String,
    pub heading_source: String,
    pub true_wind_angle_path: String,
    pub true_wind_angle_source: String,
    pub true_wind_speed_path: String,
    pub true_wind_speed_source: String,
    pub app_wind_angle_path: String,
    pub app_wind_angle_source: String,
    pub app_wind_speed_path: String,
    pub app_wind_speed_source: String,
    /// Speed display unit.
    pub unit_name: String,
    /// Width of the true wind sector window.
    pub wind_sector_window_seconds: u64,
    /// Layline angle off the wind, in degrees.
    pub layline_angle: f64,
}

impl Default for WindWidgetConfig {
    fn default() -> Self {
        Self {
            heading_path: "self.navigation.headingTrue".to_string(),
            heading_source: DEFAULT_SOURCE.to_string(),
            true_wind_angle_path: "self.environment.wind.angleTrueWater".to_string(),
            true_wind_angle_source: DEFAULT_SOURCE.to_string(),
            true_wind_speed_path: "self.environment.wind.speedTrue".to_string(),
            true_wind_speed_source: DEFAULT_SOURCE.to_string(),
            app_wind_angle_path: "self.environment.wind.angleApparent".to_string(),
            app_wind_angle_source: DEFAULT_SOURCE.to_string(),
            app_wind_speed_path: "self.environment.wind.speedApparent".to_string(),
            app_wind_speed_source: DEFAULT_SOURCE.to_string(),
            unit_name: "knots".to_string(),
            wind_sector_window_seconds: 30,
            layline_angle: 40.0,
        }
    }
}

impl WindWidgetConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !SPEED_UNITS.contains(&self.unit_name.as_str()) {
            return Err(ConfigError::UnknownUnit(self.unit_name.clone()));
        }
        if !(1..=MAX_WINDOW_SECONDS).contains(&self.wind_sector_window_seconds) {
            return Err(ConfigError::InvalidWindow(self.wind_sector_window_seconds));
        }
        Ok(())
    }

    /// `(path, source)` pairs, in subscription order.
    pub fn paths(&self) -> [(&str, &str); 5] {
        [
            (self.heading_path.as_str(), self.heading_source.as_str()),
            (self.app_wind_angle_path.as_str(), self.app_wind_angle_source.as_str()),
            (self.app_wind_speed_path.as_str(), self.app_wind_speed_source.as_str()),
            (self.true_wind_angle_path.as_str(), self.true_wind_angle_source.as_str()),
            (self.true_wind_speed_path.as_str(), self.true_wind_speed_source.as_str()),
        ]
    }

    /// Reset pinned sources the session has never seen for their path back
    /// to `default`. Paths not received yet are left alone.
    pub fn fallback_unknown_sources(&mut self, session: &Session) {
        let pairs = [
            (&self.heading_path, &mut self.heading_source),
            (&self.app_wind_angle_path, &mut self.app_wind_angle_source),
            (&self.app_wind_speed_path, &mut self.app_wind_speed_source),
            (&self.true_wind_angle_path, &mut self.true_wind_angle_source),
            (&self.true_wind_speed_path, &mut self.true_wind_speed_source),
        ];
        for (path, source) in pairs {
            if session.entry(path).is_none() {
                continue;
            }
            if !session.source_choices(path).contains(source) {
                tracing::debug!("Source {} unknown for {}, using default", source, path);
                *source = DEFAULT_SOURCE.to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_missing_fields_defaulted() {
        let config: WindWidgetConfig = serde_json::from_value(json!({
            "trueWindAnglePath": "self.environment.wind.directionTrue",
            "unitName": "m/s"
        }))
        .unwrap();

        assert_eq!(config.true_wind_angle_path, "self.environment.wind.directionTrue");
        assert_eq!(config.unit_name, "m/s");
        assert_eq!(config.heading_path, "self.navigation.headingTrue");
        assert_eq!(config.wind_sector_window_seconds, 30);
        assert_eq!(config.layline_angle, 40.0);
    }

    #[test]
    fn test_serializes_camel_case() {
        let value = serde_json::to_value(WindWidgetConfig::default()).unwrap();
        assert_eq!(value["appWindSpeedPath"], json!("self.environment.wind.speedApparent"));
        assert_eq!(value["windSectorWindowSeconds"], json!(30));
    }

    #[test]
    fn test_validate_unit() {
        let mut config = WindWidgetConfig::default();
        assert!(config.validate().is_ok());
        config.unit_name = "beaufort".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::UnknownUnit(unit)) if unit == "beaufort"));
    }

    #[test]
    fn test_validate_window() {
        let mut config = WindWidgetConfig {
            wind_sector_window_seconds: MAX_WINDOW_SECONDS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.wind_sector_window_seconds = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidWindow(0))));

        let parsed: WindWidgetConfig =
            serde_json::from_str(r#"{"windSectorWindowSeconds": 100000000000000000}"#).unwrap();
        assert!(matches!(
            parsed.validate(),
            Err(ConfigError::InvalidWindow(100_000_000_000_000_000))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("wind-widget-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"unitName": "km/h", "laylineAngle": 45}"#).unwrap();

        let config = WindWidgetConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.unit_name, "km/h");
        assert_eq!(config.layline_angle, 45.0);
        assert_eq!(config.heading_source, "default");
    }

    #[test]
    fn test_load_missing_file() {
        let result = WindWidgetConfig::load_from_file("/nonexistent/wind-widget.json");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_fallback_unknown_sources() {
        let mut session = Session::new();
        session.ingest_full(&json!({
            "self": "urn:v1",
            "navigation": {"headingTrue": {
                "value": 1.0, "timestamp": "2024-01-01T00:00:00Z", "$source": "gps1"
            }}
        }));

        let mut config = WindWidgetConfig {
            heading_source: "gps9".to_string(),
            true_wind_speed_source: "wind9".to_string(),
            ..Default::default()
        };
        config.fallback_unknown_sources(&session);

        assert_eq!(config.heading_source, "default");
        // Not received yet, so the choice is kept
        assert_eq!(config.true_wind_speed_source, "wind9");
    }
}
