//! Per-item render segment.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::effect::KenBurnsEffect;

/// A rendered visual clip for one news item.
///
/// `duration_secs` always equals the duration of the item's narration audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderSegment {
    pub item_index: usize,
    /// Still image the clip was rendered from
    pub source_image: PathBuf,
    pub effect: KenBurnsEffect,
    pub duration_secs: f64,
    pub output_clip: PathBuf,
    /// Whether the source image is a generated placeholder
    #[serde(default)]
    pub used_placeholder: bool,
}
