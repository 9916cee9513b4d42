//! Persisted overlay state
//!
//! Stored as one camelCase JSON blob. Older blobs used `selectedTags` and
//! `speed`/`currentSpeed`; both spellings are accepted on load, and when a blob
//! carries several spellings the current name wins. A speed that is not a
//! positive number becomes 1.0 without discarding the rest. Anything else that
//! fails to parse falls back to defaults.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::tagger::catalog::TagKey;
use crate::tagger::error::TaggerResult;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanelPosition {
    pub top: f64,
    pub left: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanelSize {
    pub width: f64,
    /// `None` for an auto-sized panel
    #[serde(default, deserialize_with = "lenient_height")]
    pub height: Option<f64>,
}

/// Numbers become `Some`; `"auto"` or anything else becomes `None`
fn lenient_height<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_f64())
}

/// Non-numeric speeds become NaN and are reset to 1.0 by `from_json`
fn lenient_speed<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_f64().unwrap_or(f64::NAN))
}

const SELECTION_KEYS: [&str; 2] = ["selectedTagKeys", "selectedTags"];
const SPEED_KEYS: [&str; 3] = ["playbackSpeed", "speed", "currentSpeed"];

/// Keep only the first present key of an alias group
fn dedupe_aliases(map: &mut serde_json::Map<String, serde_json::Value>, keys: &[&str]) {
    if let Some(first) = keys.iter().position(|k| map.contains_key(*k)) {
        for key in &keys[first + 1..] {
            map.remove(*key);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(alias = "selectedTags")]
    pub selected_tag_keys: Vec<TagKey>,
    #[serde(alias = "speed", alias = "currentSpeed", deserialize_with = "lenient_speed")]
    pub playback_speed: f64,
    pub auto_detection_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panel_position: Option<PanelPosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panel_size: Option<PanelSize>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            selected_tag_keys: Vec::new(),
            playback_speed: 1.0,
            auto_detection_enabled: true,
            panel_position: None,
            panel_size: None,
        }
    }
}

impl PersistedState {
    pub fn from_json(json: &str) -> TaggerResult<Self> {
        let mut value: serde_json::Value = serde_json::from_str(json)?;
        if let Some(map) = value.as_object_mut() {
            dedupe_aliases(map, &SELECTION_KEYS);
            dedupe_aliases(map, &SPEED_KEYS);
        }
        let mut state: Self = serde_json::from_value(value)?;
        if !state.playback_speed.is_finite() || state.playback_speed <= 0.0 {
            state.playback_speed = 1.0;
        }
        Ok(state)
    }

    pub fn to_json(&self) -> TaggerResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a stored blob, falling back to defaults when absent or corrupt
    pub fn load_or_default(raw: Option<&str>) -> Self {
        match raw {
            None => Self::default(),
            Some(json) => Self::from_json(json).unwrap_or_else(|e| {
                warn!("[Settings] stored state unreadable, using defaults: {}", e);
                Self::default()
            }),
        }
    }
}
