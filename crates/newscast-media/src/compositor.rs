//! Final video compositing.
//!
//! Composition runs as independent steps, each writing its own
//! intermediate file:
//!
//! 1. concat: intro, item clips and outro joined by stream copy
//! 2. narration: the narration track replaces the clip audio
//! 3. music: optional background bed looped and mixed under the narration
//! 4. watermark: optional logo overlay
//!
//! Intermediates are kept on disk; a failed step never yields a final file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use newscast_models::EncodingConfig;

use crate::backend::{probe_within, RenderBackend, RenderOp};
use crate::error::MediaError;
use crate::probe::{MediaInfo, DEFAULT_PROBE_TIMEOUT_SECS};
use crate::watermark::WatermarkConfig;

/// Default background music level relative to narration.
pub const DEFAULT_MUSIC_VOLUME: f64 = 0.15;

/// Compositing step, reported with failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositionStep {
    /// Probing clips for a common format
    Validate,
    Concat,
    Narration,
    Music,
    Watermark,
}

impl CompositionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositionStep::Validate => "validate",
            CompositionStep::Concat => "concat",
            CompositionStep::Narration => "narration",
            CompositionStep::Music => "music",
            CompositionStep::Watermark => "watermark",
        }
    }
}

impl fmt::Display for CompositionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A compositing step failed.
#[derive(Debug, Error)]
#[error("{step} step failed: {source}")]
pub struct CompositionError {
    pub step: CompositionStep,
    #[source]
    pub source: MediaError,
}

impl CompositionError {
    pub fn new(step: CompositionStep, source: MediaError) -> Self {
        Self { step, source }
    }
}

/// Clips in playback order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipSequence {
    pub intro: Option<PathBuf>,
    pub items: Vec<PathBuf>,
    pub outro: Option<PathBuf>,
}

impl ClipSequence {
    pub fn new(items: Vec<PathBuf>) -> Self {
        Self {
            intro: None,
            items,
            outro: None,
        }
    }

    pub fn with_intro(mut self, intro: Option<PathBuf>) -> Self {
        self.intro = intro;
        self
    }

    pub fn with_outro(mut self, outro: Option<PathBuf>) -> Self {
        self.outro = outro;
        self
    }

    /// `[intro?, item1..itemN, outro?]`
    pub fn ordered(&self) -> Vec<PathBuf> {
        self.intro
            .iter()
            .chain(self.items.iter())
            .chain(self.outro.iter())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len() + self.intro.is_some() as usize + self.outro.is_some() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start time of each clip given the clip durations in playback order.
    pub fn boundaries(durations: &[f64]) -> Vec<f64> {
        let mut at = 0.0;
        durations
            .iter()
            .map(|d| {
                let start = at;
                at += d;
                start
            })
            .collect()
    }
}

/// Background music bed.
#[derive(Debug, Clone, PartialEq)]
pub struct MusicBed {
    pub path: PathBuf,
    pub volume: f64,
}

impl MusicBed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            volume: DEFAULT_MUSIC_VOLUME,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume.max(0.0);
        self
    }
}

/// Filter mixing a looped music input (1) under the main audio (0).
pub fn music_mix_filter(volume: f64) -> String {
    format!(
        "[1:a]volume={:.2}[a1];[0:a][a1]amix=inputs=2:duration=first[aout]",
        volume
    )
}

/// Everything needed for one composition.
#[derive(Debug, Clone)]
pub struct CompositionRequest {
    pub sequence: ClipSequence,
    pub narration: PathBuf,
    pub music: Option<MusicBed>,
    pub watermark: Option<WatermarkConfig>,
    /// Directory for intermediates and the final file
    pub work_dir: PathBuf,
    /// Prefix for file names
    pub tag: String,
}

/// Output of a successful composition.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub output: PathBuf,
    /// Files written by each step, in order
    pub intermediates: Vec<PathBuf>,
    pub clip_count: usize,
}

/// Composes clips, narration, music and watermark through a [`RenderBackend`].
pub struct SegmentCompositor {
    backend: Arc<dyn RenderBackend>,
    encoding: EncodingConfig,
    probe_timeout: Duration,
}

impl SegmentCompositor {
    pub fn new(backend: Arc<dyn RenderBackend>, encoding: EncodingConfig) -> Self {
        Self {
            backend,
            encoding,
            probe_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
        }
    }

    /// Limit for each clip probe during validation.
    pub fn with_probe_timeout(mut self, limit: Duration) -> Self {
        self.probe_timeout = limit;
        self
    }

    fn step_path(request: &CompositionRequest, step: &str, ext: &str) -> PathBuf {
        request.work_dir.join(format!("{}_{}.{}", request.tag, step, ext))
    }

    async fn probe(&self, clip: &Path) -> Result<MediaInfo, MediaError> {
        probe_within(self.backend.as_ref(), clip, self.probe_timeout).await
    }

    /// Probe every clip and require the format of the first.
    async fn check_compatible(&self, clips: &[PathBuf]) -> Result<(), CompositionError> {
        let fail = |e| CompositionError::new(CompositionStep::Validate, e);
        let first = clips
            .first()
            .ok_or_else(|| fail(MediaError::invalid_input("no clips to compose")))?;
        let reference = self.probe(first).await.map_err(fail)?;

        for clip in &clips[1..] {
            let info = self.probe(clip).await.map_err(fail)?;
            if let Some(reason) = reference.incompatibility(&info) {
                return Err(fail(MediaError::incompatible(format!(
                    "{}: {}",
                    clip.display(),
                    reason
                ))));
            }
        }
        Ok(())
    }

    async fn run_step(&self, step: CompositionStep, op: RenderOp) -> Result<PathBuf, CompositionError> {
        self.backend.execute(&op).await.map_err(|e| {
            warn!(step = %step, error = %e, "Composition step failed");
            CompositionError::new(step, e)
        })
    }

    /// Run all compositing steps.
    pub async fn compose(&self, request: &CompositionRequest) -> Result<Composition, CompositionError> {
        let clips = request.sequence.ordered();
        self.check_compatible(&clips).await?;

        let mut intermediates = Vec::new();

        // Concat
        let joined = self
            .run_step(
                CompositionStep::Concat,
                RenderOp::ConcatVideo {
                    clips: clips.clone(),
                    list_file: Self::step_path(request, "concat", "txt"),
                    output: Self::step_path(request, "concat", "mp4"),
                },
            )
            .await?;
        intermediates.push(joined.clone());

        // Narration
        let mut current = self
            .run_step(
                CompositionStep::Narration,
                RenderOp::LayerNarration {
                    video: joined,
                    narration: request.narration.clone(),
                    output: Self::step_path(request, "narrated", "mp4"),
                    audio_codec: self.encoding.audio_codec.clone(),
                    audio_bitrate: self.encoding.audio_bitrate.clone(),
                },
            )
            .await?;
        intermediates.push(current.clone());

        // Music
        if let Some(music) = &request.music {
            current = self
                .run_step(
                    CompositionStep::Music,
                    RenderOp::MixMusic {
                        video: current,
                        music: music.path.clone(),
                        volume: music.volume,
                        output: Self::step_path(request, "music", "mp4"),
                        audio_codec: self.encoding.audio_codec.clone(),
                    },
                )
                .await?;
            intermediates.push(current.clone());
        }

        // Watermark
        if let Some(watermark) = &request.watermark {
            current = self
                .run_step(
                    CompositionStep::Watermark,
                    RenderOp::Overlay {
                        video: current,
                        watermark: watermark.clone(),
                        output: Self::step_path(request, "watermarked", "mp4"),
                        encoding: self.encoding.clone(),
                    },
                )
                .await?;
            intermediates.push(current.clone());
        }

        info!(
            clips = clips.len(),
            output = %current.display(),
            "Composition finished"
        );

        Ok(Composition {
            output: current,
            intermediates,
            clip_count: clips.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingBackend;
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn request(dir: &TempDir, music: bool, watermark: bool) -> CompositionRequest {
        CompositionRequest {
            sequence: ClipSequence::new(vec![dir.path().join("item_01.mp4"), dir.path().join("item_02.mp4")]),
            narration: dir.path().join("narration.m4a"),
            music: music.then(|| MusicBed::new(dir.path().join("bed.mp3"))),
            watermark: watermark.then(|| WatermarkConfig::new(dir.path().join("logo.png"))),
            work_dir: dir.path().to_path_buf(),
            tag: "production_7".to_string(),
        }
    }

    #[tokio::test]
    async fn test_compose_runs_steps_in_order() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(RecordingBackend::new());
        let compositor = SegmentCompositor::new(backend.clone(), EncodingConfig::default());

        let composition = compositor.compose(&request(&dir, true, true)).await.unwrap();

        let kinds: Vec<_> = backend.ops().iter().map(|op| op.kind()).collect();
        assert_eq!(kinds, vec!["concat_video", "layer_narration", "mix_music", "overlay"]);
        assert_eq!(composition.intermediates.len(), 4);
        assert_eq!(composition.clip_count, 2);
        assert_eq!(composition.output, dir.path().join("production_7_watermarked.mp4"));
        assert!(composition.output.exists());
    }

    #[tokio::test]
    async fn test_compose_skips_optional_layers() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(RecordingBackend::new());
        let compositor = SegmentCompositor::new(backend.clone(), EncodingConfig::default());

        let composition = compositor.compose(&request(&dir, false, false)).await.unwrap();

        assert_eq!(backend.ops().len(), 2);
        assert_eq!(composition.output, dir.path().join("production_7_narrated.mp4"));
    }

    #[tokio::test]
    async fn test_music_failure_names_step() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(RecordingBackend::new().fail_when(|op| matches!(op, RenderOp::MixMusic { .. })));
        let compositor = SegmentCompositor::new(backend.clone(), EncodingConfig::default());

        let err = compositor.compose(&request(&dir, true, true)).await.unwrap_err();

        assert_eq!(err.step, CompositionStep::Music);
        // Watermark never ran
        assert!(backend.ops().iter().all(|op| !matches!(op, RenderOp::Overlay { .. })));
    }

    #[tokio::test]
    async fn test_incompatible_clip_rejected_before_concat() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(RecordingBackend::new());
        let mut info = backend.probe(Path::new("x")).await.unwrap();
        info.width = 1280;
        info.height = 720;
        backend.set_info(dir.path().join("item_02.mp4"), info);
        let compositor = SegmentCompositor::new(backend.clone(), EncodingConfig::default());

        let err = compositor.compose(&request(&dir, false, false)).await.unwrap_err();

        assert_eq!(err.step, CompositionStep::Validate);
        assert!(matches!(err.source, MediaError::IncompatibleClips(_)));
        assert!(backend.ops().is_empty());
    }

    /// Executes through a recording backend but never answers probes.
    struct SilentBackend(RecordingBackend);

    #[async_trait]
    impl RenderBackend for SilentBackend {
        async fn execute(&self, op: &RenderOp) -> crate::error::MediaResult<PathBuf> {
            self.0.execute(op).await
        }

        async fn probe(&self, _path: &Path) -> crate::error::MediaResult<MediaInfo> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_unanswered_clip_query_times_out_in_validation() {
        let dir = TempDir::new().unwrap();
        let compositor = SegmentCompositor::new(Arc::new(SilentBackend(RecordingBackend::new())), EncodingConfig::default())
            .with_probe_timeout(Duration::from_millis(50));

        let err = tokio::time::timeout(Duration::from_secs(5), compositor.compose(&request(&dir, false, false)))
            .await
            .expect("compose must not hang")
            .unwrap_err();

        assert_eq!(err.step, CompositionStep::Validate);
        assert!(err.source.is_timeout());
    }

    #[test]
    fn test_sequence_order() {
        let seq = ClipSequence::new(vec!["a.mp4".into(), "b.mp4".into()])
            .with_intro(Some("intro.mp4".into()))
            .with_outro(Some("outro.mp4".into()));
        let ordered = seq.ordered();
        assert_eq!(
            ordered,
            vec![
                PathBuf::from("intro.mp4"),
                PathBuf::from("a.mp4"),
                PathBuf::from("b.mp4"),
                PathBuf::from("outro.mp4")
            ]
        );
        assert_eq!(seq.len(), 4);
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(ClipSequence::boundaries(&[3.0, 5.0, 2.5]), vec![0.0, 3.0, 8.0]);
        assert!(ClipSequence::boundaries(&[]).is_empty());
    }

    #[test]
    fn test_music_filter() {
        assert_eq!(
            music_mix_filter(DEFAULT_MUSIC_VOLUME),
            "[1:a]volume=0.15[a1];[0:a][a1]amix=inputs=2:duration=first[aout]"
        );
    }

    #[test]
    fn test_error_display_names_step() {
        let err = CompositionError::new(CompositionStep::Music, MediaError::Timeout(30));
        assert_eq!(err.to_string(), "music step failed: Operation timed out after 30 seconds");
    }
}
