//! Ken Burns camera-motion effects.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Start/end zoom and pan offsets of a camera move.
///
/// Offsets are fractions of the frame width (x) and height (y).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KenBurnsParams {
    pub zoom_start: f64,
    pub zoom_end: f64,
    pub x_start: f64,
    pub x_end: f64,
    pub y_start: f64,
    pub y_end: f64,
}

/// Named camera move applied to a still image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum KenBurnsEffect {
    #[default]
    ZoomIn,
    ZoomOut,
    PanLeft,
    PanRight,
    PanUp,
    PanDown,
}

impl KenBurnsEffect {
    pub const ALL: [KenBurnsEffect; 6] = [
        KenBurnsEffect::ZoomIn,
        KenBurnsEffect::ZoomOut,
        KenBurnsEffect::PanLeft,
        KenBurnsEffect::PanRight,
        KenBurnsEffect::PanUp,
        KenBurnsEffect::PanDown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KenBurnsEffect::ZoomIn => "zoom_in",
            KenBurnsEffect::ZoomOut => "zoom_out",
            KenBurnsEffect::PanLeft => "pan_left",
            KenBurnsEffect::PanRight => "pan_right",
            KenBurnsEffect::PanUp => "pan_up",
            KenBurnsEffect::PanDown => "pan_down",
        }
    }

    /// Look up an effect by name. Unknown names resolve to `zoom_in`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "zoom_out" => KenBurnsEffect::ZoomOut,
            "pan_left" => KenBurnsEffect::PanLeft,
            "pan_right" => KenBurnsEffect::PanRight,
            "pan_up" => KenBurnsEffect::PanUp,
            "pan_down" => KenBurnsEffect::PanDown,
            _ => KenBurnsEffect::ZoomIn,
        }
    }

    pub fn params(&self) -> KenBurnsParams {
        let (zoom_start, zoom_end, x_start, x_end, y_start, y_end) = match self {
            KenBurnsEffect::ZoomIn => (1.0, 1.3, 0.0, 0.0, 0.0, 0.0),
            KenBurnsEffect::ZoomOut => (1.3, 1.0, 0.0, 0.0, 0.0, 0.0),
            KenBurnsEffect::PanLeft => (1.2, 1.2, 0.1, -0.1, 0.0, 0.0),
            KenBurnsEffect::PanRight => (1.2, 1.2, -0.1, 0.1, 0.0, 0.0),
            KenBurnsEffect::PanUp => (1.2, 1.2, 0.0, 0.0, 0.1, -0.1),
            KenBurnsEffect::PanDown => (1.2, 1.2, 0.0, 0.0, -0.1, 0.1),
        };
        KenBurnsParams {
            zoom_start,
            zoom_end,
            x_start,
            x_end,
            y_start,
            y_end,
        }
    }
}

impl fmt::Display for KenBurnsEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
