// config.rs: host-supplied plugin configuration

use std::time::Duration;

use serde::Deserialize;

use crate::dimensions::{DEFAULT_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL};
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraOptions {
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            fov: 75.0,
            aspect: 640.0 / 360.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

/// Every field is optional in JSON; missing ones take the defaults below.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VrConfig {
    /// degrees per pixel of pointer drag
    pub move_multiplier: f32,
    /// gyroscope rate multiplier
    pub mobile_vibration_value: f32,
    pub start_in_stereo: bool,
    pub camera_options: CameraOptions,
    pub eye_separation: f32,
    pub dimension_poll_interval_ms: u64,
    pub dimension_poll_attempts: u32,
    /// Applied to the video element while a session is set up, e.g. `"anonymous"`.
    pub cross_origin: Option<String>,
    pub force_canvas_copy: bool,
}

impl Default for VrConfig {
    fn default() -> Self {
        Self {
            move_multiplier: 0.15,
            mobile_vibration_value: 0.02,
            start_in_stereo: false,
            camera_options: CameraOptions::default(),
            eye_separation: crate::stereo::DEFAULT_EYE_SEPARATION,
            dimension_poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            dimension_poll_attempts: DEFAULT_POLL_ATTEMPTS,
            cross_origin: None,
            force_canvas_copy: false,
        }
    }
}

impl VrConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: VrConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn dimension_poll_interval(&self) -> Duration {
        Duration::from_millis(self.dimension_poll_interval_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let cam = &self.camera_options;
        if !(cam.fov > 0.0 && cam.fov < 180.0) {
            return Err(ConfigError::Invalid(format!("fov {} out of range", cam.fov)));
        }
        if !(cam.near > 0.0 && cam.far > cam.near) {
            return Err(ConfigError::Invalid(format!(
                "near {} / far {} out of range",
                cam.near, cam.far
            )));
        }
        if cam.aspect <= 0.0 {
            return Err(ConfigError::Invalid("aspect must be positive".into()));
        }
        if self.dimension_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("dimensionPollIntervalMs must be at least 1".into()));
        }
        if self.dimension_poll_attempts == 0 {
            return Err(ConfigError::Invalid("dimensionPollAttempts must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_object_gives_defaults() {
        assert_eq!(VrConfig::from_json_str("{}").unwrap(), VrConfig::default());
    }

    #[test]
    fn partial_override() {
        let config = VrConfig::from_json_str(
            r#"{ "moveMultiplier": 0.3, "startInStereo": true, "cameraOptions": { "fov": 90 } }"#,
        )
        .unwrap();
        assert_eq!(config.move_multiplier, 0.3);
        assert!(config.start_in_stereo);
        assert_eq!(config.camera_options.fov, 90.0);
        assert_eq!(config.camera_options.far, 1000.0);
        assert_eq!(config.mobile_vibration_value, 0.02);
        assert_eq!(config.dimension_poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn rejects_bad_camera() {
        let err = VrConfig::from_json_str(r#"{ "cameraOptions": { "near": 5, "far": 1 } }"#);
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn rejects_zero_poll_settings() {
        for json in [
            r#"{ "dimensionPollIntervalMs": 0 }"#,
            r#"{ "dimensionPollAttempts": 0 }"#,
        ] {
            assert!(
                matches!(VrConfig::from_json_str(json), Err(ConfigError::Invalid(_))),
                "{json}"
            );
        }
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            VrConfig::from_json_str("{ moveMultiplier"),
            Err(ConfigError::Json(_))
        ));
    }
}
