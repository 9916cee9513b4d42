//! Configuration types and defaults for the tagger
//!
//! Timings are milliseconds. Defaults match the standard overlay; the
//! `optimized()` preset scans more often with a shorter debounce window.

use serde::{Deserialize, Serialize};

use crate::tagger::error::{TaggerError, TaggerResult};
use crate::tagger::resolver::{DEFAULT_CONFIDENCE_FLOOR, DEFAULT_MIN_LABEL_LEN};

/// What a detected keyword does to matching page controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionPolicy {
    /// Only highlight tags for manual confirmation
    #[default]
    Highlight,
    /// Click matched, unchecked controls once and auto-assign their tag
    AutoActivate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaggerConfig {
    /// Periodic scan trigger. Default: 5000
    pub scan_interval_ms: u64,
    /// Debounce window for scan triggers. Default: 500
    pub debounce_ms: u64,
    /// Controls resolved per chunk before yielding. Default: 50
    pub chunk_size: usize,
    /// Resolver acceptance threshold (exclusive). Default: 0.7
    pub confidence_floor: f64,
    /// Minimum trimmed label length. Default: 3
    pub min_label_len: usize,
    /// Activity log capacity. Default: 8
    pub max_log_entries: usize,
    /// Window for the second key of `d` + digit. Default: 2000
    pub driver_shortcut_timeout_ms: u64,
    /// Delay before clearing tags after a submission. Default: 1000
    pub clear_after_submit_ms: u64,
    /// Playback speed increment. Default: 0.25
    pub speed_step: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    pub detection_policy: DetectionPolicy,
    /// Auto-detection state when nothing is persisted. Default: true
    pub auto_detection_default: bool,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 5_000,
            debounce_ms: 500,
            chunk_size: 50,
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
            min_label_len: DEFAULT_MIN_LABEL_LEN,
            max_log_entries: 8,
            driver_shortcut_timeout_ms: 2_000,
            clear_after_submit_ms: 1_000,
            speed_step: 0.25,
            min_speed: 0.25,
            max_speed: 3.0,
            detection_policy: DetectionPolicy::Highlight,
            auto_detection_default: true,
        }
    }
}

impl TaggerConfig {
    pub fn standard() -> Self {
        Self::default()
    }

    /// Faster cadence for pages that mutate often
    pub fn optimized() -> Self {
        Self {
            scan_interval_ms: 2_000,
            debounce_ms: 300,
            ..Self::default()
        }
    }

    /// Parse a (possibly partial) JSON config; missing fields take defaults
    pub fn from_json(json: &str) -> TaggerResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TaggerResult<()> {
        if self.chunk_size == 0 {
            return Err(TaggerError::Config("chunk_size must be > 0".into()));
        }
        if self.debounce_ms == 0 {
            return Err(TaggerError::Config("debounce_ms must be > 0".into()));
        }
        if self.scan_interval_ms == 0 {
            return Err(TaggerError::Config("scan_interval_ms must be > 0".into()));
        }
        if !(0.0..1.0).contains(&self.confidence_floor) {
            return Err(TaggerError::Config(format!(
                "confidence_floor {} outside [0, 1)",
                self.confidence_floor
            )));
        }
        if !(self.min_speed > 0.0 && self.min_speed <= self.max_speed) {
            return Err(TaggerError::Config(format!(
                "invalid speed range [{}, {}]",
                self.min_speed, self.max_speed
            )));
        }
        if self.speed_step <= 0.0 {
            return Err(TaggerError::Config("speed_step must be > 0".into()));
        }
        Ok(())
    }

    pub fn clamp_speed(&self, speed: f64) -> f64 {
        if !speed.is_finite() {
            return 1.0_f64.clamp(self.min_speed, self.max_speed);
        }
        speed.clamp(self.min_speed, self.max_speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(TaggerConfig::default().validate().is_ok());
        assert!(TaggerConfig::optimized().validate().is_ok());
        assert_eq!(TaggerConfig::default().chunk_size, 50);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = TaggerConfig::from_json(r#"{"chunk_size": 20, "detection_policy": "auto_activate"}"#).unwrap();
        assert_eq!(config.chunk_size, 20);
        assert_eq!(config.detection_policy, DetectionPolicy::AutoActivate);
        assert_eq!(config.debounce_ms, 500);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(TaggerConfig::from_json(r#"{"chunk_size": 0}"#).is_err());
        assert!(TaggerConfig::from_json(r#"{"confidence_floor": 1.5}"#).is_err());
        assert!(TaggerConfig::from_json(r#"{"min_speed": 4.0}"#).is_err());
        assert!(TaggerConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_clamp_speed() {
        let config = TaggerConfig::default();
        assert_eq!(config.clamp_speed(5.0), 3.0);
        assert_eq!(config.clamp_speed(0.0), 0.25);
        assert_eq!(config.clamp_speed(f64::NAN), 1.0);
    }
}
