//! Logo overlay applied as the last compositing step.
//!
//! # Architecture
//!
//! - `WatermarkConfig`: builder for image, corner, margin and opacity
//! - `Corner`: where the logo sits in the frame
//! - `build_overlay_filter`: the ffmpeg filter graph for the overlay

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{MediaError, MediaResult};

/// Default distance from the frame edges in pixels.
pub const DEFAULT_MARGIN: u32 = 20;

/// Frame corner the watermark is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

impl Corner {
    pub fn as_str(&self) -> &'static str {
        match self {
            Corner::TopLeft => "top_left",
            Corner::TopRight => "top_right",
            Corner::BottomLeft => "bottom_left",
            Corner::BottomRight => "bottom_right",
        }
    }

    /// Overlay `x:y` expression for this corner.
    ///
    /// `W`/`H` are the main frame size, `w`/`h` the logo size.
    pub fn position(&self, margin: u32) -> String {
        match self {
            Corner::TopLeft => format!("{m}:{m}", m = margin),
            Corner::TopRight => format!("W-w-{m}:{m}", m = margin),
            Corner::BottomLeft => format!("{m}:H-h-{m}", m = margin),
            Corner::BottomRight => format!("W-w-{m}:H-h-{m}", m = margin),
        }
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Corner {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "top_left" => Ok(Corner::TopLeft),
            "top_right" => Ok(Corner::TopRight),
            "bottom_left" => Ok(Corner::BottomLeft),
            "bottom_right" => Ok(Corner::BottomRight),
            other => Err(MediaError::invalid_input(format!("unknown corner: {}", other))),
        }
    }
}

/// Configuration for the logo overlay.
///
/// ```ignore
/// let config = WatermarkConfig::new("assets/logo.png")
///     .with_corner(Corner::TopRight)
///     .with_opacity(0.8);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkConfig {
    /// Path to the logo image (PNG with transparency)
    pub image_path: PathBuf,
    pub corner: Corner,
    /// Distance from the anchored edges in pixels
    pub margin: u32,
    /// Opacity (0.0 to 1.0)
    pub opacity: f32,
}

impl WatermarkConfig {
    pub fn new(image_path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: image_path.into(),
            corner: Corner::default(),
            margin: DEFAULT_MARGIN,
            opacity: 1.0,
        }
    }

    pub fn with_corner(mut self, corner: Corner) -> Self {
        self.corner = corner;
        self
    }

    pub fn with_margin(mut self, margin: u32) -> Self {
        self.margin = margin;
        self
    }

    /// Set watermark opacity (0.0 = invisible, 1.0 = fully opaque).
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    /// Check if the watermark image exists.
    pub fn is_available(&self) -> bool {
        self.image_path.exists()
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    pub fn validate(&self) -> MediaResult<()> {
        if !self.is_available() {
            return Err(MediaError::FileNotFound(self.image_path.clone()));
        }
        Ok(())
    }
}

/// Build the filter complex overlaying input 1 on input 0.
pub fn build_overlay_filter(config: &WatermarkConfig) -> String {
    let position = config.corner.position(config.margin);
    if config.opacity < 1.0 {
        // Apply opacity via colorchannelmixer alpha channel
        format!(
            "[1:v]format=rgba,colorchannelmixer=aa={:.2}[wm];[0:v][wm]overlay={}:format=auto",
            config.opacity, position
        )
    } else {
        format!("[0:v][1:v]overlay={}:format=auto", position)
    }
}
