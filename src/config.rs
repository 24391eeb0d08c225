//! Engine configuration.
//!
//! Mirrors the host audio context: one sample rate shared by every decode,
//! mix, and playback in a session, plus the starting playback rate.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings for one [`AudioContext`](crate::context::AudioContext).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Sample rate of the processing context in Hz.
    pub sample_rate: u32,
    /// Resample decoded audio to `sample_rate` so the mixer always sees a
    /// common rate.
    pub resample_on_decode: bool,
    /// Playback rate a fresh transport starts with.
    pub default_playback_rate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sample_rate: 44100,
            resample_on_decode: true,
            default_playback_rate: 1.0,
        }
    }
}

impl EngineConfig {
    /// Parse a config from JSON. Missing fields fall back to defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid {
                field: "sampleRate",
                message: "must be positive".to_string(),
            });
        }
        let rate = self.default_playback_rate;
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "defaultPlaybackRate",
                message: format!("must be finite and positive, got {rate}"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.sample_rate, 44100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = EngineConfig::from_json(r#"{ "sampleRate": 48000 }"#).unwrap();
        assert_eq!(config.sample_rate, 48000);
        assert!(config.resample_on_decode);
        assert_eq!(config.default_playback_rate, 1.0);
    }

    #[test]
    fn rejects_zero_sample_rate() {
        let err = EngineConfig::from_json(r#"{ "sampleRate": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "sampleRate", .. }));
    }

    #[test]
    fn rejects_non_positive_default_rate() {
        let err = EngineConfig::from_json(r#"{ "defaultPlaybackRate": 0.0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "defaultPlaybackRate", .. }));
    }

    #[test]
    fn fast_default_rate_is_accepted() {
        let config = EngineConfig::from_json(r#"{ "defaultPlaybackRate": 16.0 }"#).unwrap();
        assert_eq!(config.default_playback_rate, 16.0);
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(
            EngineConfig::from_json("{ not json"),
            Err(ConfigError::Json(_))
        ));
    }
}
