//! Scene configuration.

use crate::connector::DEFAULT_LINE_WIDTH;
use crate::layout::{DEFAULT_FONT_SIZE, LayoutParams};
use kurbo::{Point, Size};
use serde::{Deserialize, Serialize};

/// Maximum number of undo steps to keep.
pub const DEFAULT_UNDO_CAP: usize = 50;

/// Distance between grid lines.
pub const DEFAULT_GRID_STEP: f64 = 50.0;

/// Maximum vertical gap for position-based linking.
pub const DEFAULT_LINK_DISTANCE: f64 = 200.0;

/// Tunables for a [`Scene`](crate::Scene).
///
/// Every field has a default, so a partial JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Undo history depth.
    pub undo_cap: usize,
    /// Parameters for newly created text elements.
    pub text: LayoutParams,
    /// Content of a text element created without text.
    pub placeholder_text: String,
    /// Target width for newly created images.
    pub image_width: f64,
    pub hierarchy_line_width: f64,
    pub content_line_width: f64,
    pub grid_step: f64,
    pub canvas_size: Size,
    /// Where pasted content lands when no position is given.
    pub paste_origin: Point,
    /// Used by position-based linking.
    pub link_distance: f64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            undo_cap: DEFAULT_UNDO_CAP,
            text: LayoutParams::default(),
            placeholder_text: "请输入文本".to_string(),
            image_width: DEFAULT_FONT_SIZE,
            hierarchy_line_width: DEFAULT_LINE_WIDTH,
            content_line_width: DEFAULT_LINE_WIDTH,
            grid_step: DEFAULT_GRID_STEP,
            canvas_size: Size::new(800.0, 1000.0),
            paste_origin: Point::new(100.0, 100.0),
            link_distance: DEFAULT_LINK_DISTANCE,
        }
    }
}

impl SceneConfig {
    /// Parse a config from JSON, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SceneConfig::default();
        assert_eq!(config.undo_cap, 50);
        assert_eq!(config.text.font_family, "SimSun");
        assert_eq!(config.text.chars_per_column, 15);
        assert!((config.grid_step - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_json() {
        let config = SceneConfig::from_json(r#"{ "undo_cap": 10, "grid_step": 25.0 }"#).unwrap();
        assert_eq!(config.undo_cap, 10);
        assert!((config.grid_step - 25.0).abs() < f64::EPSILON);
        assert_eq!(config.text, LayoutParams::default());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = SceneConfig::default();
        let json = config.to_json().unwrap();
        assert_eq!(SceneConfig::from_json(&json).unwrap(), config);
    }
}
