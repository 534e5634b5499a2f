//! In-memory [`RenderBackend`] for tests.
//!
//! Records every op, writes a small stand-in file at each op's output, and
//! answers probes from durations it has seen or been told about.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::backend::{RenderBackend, RenderOp};
use crate::error::{MediaError, MediaResult};
use crate::probe::MediaInfo;

type FailurePredicate = Box<dyn Fn(&RenderOp) -> bool + Send + Sync>;

/// Recording fake backend.
pub struct RecordingBackend {
    ops: Mutex<Vec<RenderOp>>,
    infos: Mutex<HashMap<PathBuf, MediaInfo>>,
    default_info: MediaInfo,
    failures: Vec<FailurePredicate>,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            ops: Mutex::new(Vec::new()),
            infos: Mutex::new(HashMap::new()),
            default_info: MediaInfo {
                duration: 10.0,
                width: 1920,
                height: 1080,
                fps: 30.0,
                video_codec: Some("h264".to_string()),
                audio_codec: Some("aac".to_string()),
                size: 1024,
            },
            failures: Vec::new(),
        }
    }

    /// Fail every op matching `predicate`.
    pub fn fail_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&RenderOp) -> bool + Send + Sync + 'static,
    {
        self.failures.push(Box::new(predicate));
        self
    }

    /// Answer probes for `path` with `info`.
    pub fn set_info(&self, path: impl Into<PathBuf>, info: MediaInfo) {
        if let Ok(mut infos) = self.infos.lock() {
            infos.insert(path.into(), info);
        }
    }

    /// Answer probes for `path` with the default info and `secs` duration.
    pub fn set_duration(&self, path: impl Into<PathBuf>, secs: f64) {
        let info = MediaInfo {
            duration: secs,
            ..self.default_info.clone()
        };
        self.set_info(path, info);
    }

    /// All ops executed so far, in order.
    pub fn ops(&self) -> Vec<RenderOp> {
        self.ops.lock().map(|ops| ops.clone()).unwrap_or_default()
    }

    /// Executed ops of one kind (see [`RenderOp::kind`]).
    pub fn ops_of_kind(&self, kind: &str) -> Vec<RenderOp> {
        self.ops().into_iter().filter(|op| op.kind() == kind).collect()
    }

    fn known_duration(&self, path: &Path) -> f64 {
        self.infos
            .lock()
            .ok()
            .and_then(|infos| infos.get(path).map(|i| i.duration))
            .unwrap_or(self.default_info.duration)
    }

    fn output_duration(&self, op: &RenderOp) -> Option<f64> {
        match op {
            RenderOp::KenBurns { duration_secs, .. } => Some(*duration_secs),
            RenderOp::ConcatVideo { clips, .. } => Some(clips.iter().map(|c| self.known_duration(c)).sum()),
            RenderOp::ConcatAudio { inputs, gap_secs, .. } => {
                let total: f64 = inputs.iter().map(|i| self.known_duration(i)).sum();
                Some(total + gap_secs * inputs.len().saturating_sub(1) as f64)
            }
            RenderOp::LayerNarration { video, .. }
            | RenderOp::MixMusic { video, .. }
            | RenderOp::Overlay { video, .. } => Some(self.known_duration(video)),
            RenderOp::Placeholder { .. } | RenderOp::Thumbnail { .. } => None,
        }
    }
}

#[async_trait]
impl RenderBackend for RecordingBackend {
    async fn execute(&self, op: &RenderOp) -> MediaResult<PathBuf> {
        if let Ok(mut ops) = self.ops.lock() {
            ops.push(op.clone());
        }

        if self.failures.iter().any(|fails| fails(op)) {
            return Err(MediaError::ffmpeg_failed(
                format!("injected {} failure", op.kind()),
                Some("simulated stderr".to_string()),
                Some(1),
            ));
        }

        let output = op.output().to_path_buf();
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&output, op.kind().as_bytes())?;

        if let Some(duration) = self.output_duration(op) {
            self.set_duration(output.clone(), duration);
        }
        Ok(output)
    }

    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        let known = self.infos.lock().ok().and_then(|infos| infos.get(path).cloned());
        Ok(known.unwrap_or_else(|| self.default_info.clone()))
    }
}
