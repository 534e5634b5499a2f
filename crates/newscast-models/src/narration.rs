//! Narration plan and synthesized audio segments.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::{ModelError, ModelResult};

/// Silence inserted between narration segments.
pub const DEFAULT_SEGMENT_GAP_SECS: f64 = 0.5;

/// Role of a narration segment within the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Intro,
    Item,
    Outro,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::Intro => "intro",
            SegmentKind::Item => "item",
            SegmentKind::Outro => "outro",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One spoken unit of the narration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NarrationSegment {
    pub kind: SegmentKind,
    /// Text to synthesize
    pub text: String,
    /// Index of the news item (item segments only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_index: Option<usize>,
    /// Title shown on the item's visual
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Expected spoken length, advisory only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_duration_secs: Option<f64>,
}

impl NarrationSegment {
    pub fn intro(text: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Intro,
            text: text.into(),
            item_index: None,
            title: None,
            target_duration_secs: None,
        }
    }

    pub fn item(index: usize, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Item,
            text: text.into(),
            item_index: Some(index),
            title: Some(title.into()),
            target_duration_secs: None,
        }
    }

    pub fn outro(text: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Outro,
            text: text.into(),
            item_index: None,
            title: None,
            target_duration_secs: None,
        }
    }

    pub fn with_target_duration(mut self, secs: f64) -> Self {
        self.target_duration_secs = Some(secs);
        self
    }

    /// Stable label used in file names and logs (`intro`, `item_03`, `outro`).
    pub fn label(&self) -> String {
        match (self.kind, self.item_index) {
            (SegmentKind::Item, Some(i)) => format!("item_{:02}", i + 1),
            (kind, _) => kind.as_str().to_string(),
        }
    }
}

/// Ordered narration produced once per run by the script composer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NarrationPlan {
    pub segments: Vec<NarrationSegment>,
}

impl NarrationPlan {
    pub fn new(segments: Vec<NarrationSegment>) -> Self {
        Self { segments }
    }

    pub fn intro(&self) -> Option<&NarrationSegment> {
        self.segments.iter().find(|s| s.kind == SegmentKind::Intro)
    }

    pub fn outro(&self) -> Option<&NarrationSegment> {
        self.segments.iter().find(|s| s.kind == SegmentKind::Outro)
    }

    pub fn items(&self) -> impl Iterator<Item = &NarrationSegment> {
        self.segments.iter().filter(|s| s.kind == SegmentKind::Item)
    }

    pub fn item_count(&self) -> usize {
        self.items().count()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Check the plan's ordering rules.
    ///
    /// Intro may only be first, outro only last, item indices run 0, 1, 2...
    /// and no segment may be blank.
    pub fn validate(&self) -> ModelResult<()> {
        if self.segments.is_empty() {
            return Err(ModelError::invalid_plan("plan has no segments"));
        }
        if self.item_count() == 0 {
            return Err(ModelError::invalid_plan("plan has no item segments"));
        }

        let last = self.segments.len() - 1;
        let mut next_index = 0usize;
        for (pos, seg) in self.segments.iter().enumerate() {
            if seg.text.trim().is_empty() {
                return Err(ModelError::invalid_plan(format!(
                    "segment {} ({}) has empty text",
                    pos, seg.kind
                )));
            }
            match seg.kind {
                SegmentKind::Intro if pos != 0 => {
                    return Err(ModelError::invalid_plan("intro must be the first segment"));
                }
                SegmentKind::Outro if pos != last => {
                    return Err(ModelError::invalid_plan("outro must be the last segment"));
                }
                SegmentKind::Item => {
                    if seg.item_index != Some(next_index) {
                        return Err(ModelError::invalid_plan(format!(
                            "item at position {} has index {:?}, expected {}",
                            pos, seg.item_index, next_index
                        )));
                    }
                    next_index += 1;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Synthesized audio for one narration segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AudioSegment {
    pub kind: SegmentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_index: Option<usize>,
    pub file_path: PathBuf,
    /// Measured duration in seconds
    pub duration_secs: f64,
}

/// Length of the narration track after joining segments with `gap_secs` of
/// silence between each pair.
pub fn combined_duration(durations: &[f64], gap_secs: f64) -> f64 {
    if durations.is_empty() {
        return 0.0;
    }
    durations.iter().sum::<f64>() + gap_secs * (durations.len() - 1) as f64
}
