//! Ken Burns segment rendering.
//!
//! A still image is turned into a clip with a slow zoom or pan. The camera
//! path interpolates linearly from the effect's start tuple to its end tuple
//! over `round(duration * fps)` frames.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use newscast_models::{EncodingConfig, KenBurnsEffect, KenBurnsParams, RenderSegment};

use crate::backend::{RenderBackend, RenderOp};
use crate::error::{MediaError, MediaResult};
use crate::placeholder::{create_placeholder, placeholder_title};

/// Camera state for a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    pub zoom: f64,
    /// Horizontal offset as a fraction of the frame width
    pub x_offset: f64,
    /// Vertical offset as a fraction of the frame height
    pub y_offset: f64,
}

/// Linear camera path of one effect over a fixed number of frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPath {
    pub params: KenBurnsParams,
    pub total_frames: u64,
}

impl CameraPath {
    pub fn new(effect: KenBurnsEffect, total_frames: u64) -> Self {
        Self::from_params(effect.params(), total_frames)
    }

    pub fn from_params(params: KenBurnsParams, total_frames: u64) -> Self {
        Self {
            params,
            total_frames: total_frames.max(1),
        }
    }

    /// Camera state at frame `n` (0-based).
    pub fn at(&self, n: u64) -> CameraFrame {
        let t = n.min(self.total_frames) as f64 / self.total_frames as f64;
        let p = &self.params;
        CameraFrame {
            zoom: p.zoom_start + (p.zoom_end - p.zoom_start) * t,
            x_offset: p.x_start + (p.x_end - p.x_start) * t,
            y_offset: p.y_start + (p.y_end - p.y_start) * t,
        }
    }
}

/// Build the scale+zoompan filter that plays `path`.
///
/// The expressions interpolate between the path's first and last frame with
/// `on` (zoompan's output frame counter) in place of `n`. The source is
/// upscaled to twice the output size first so the zoom stays sharp.
pub fn zoompan_filter(path: &CameraPath, encoding: &EncodingConfig) -> String {
    let total = path.total_frames;
    let (start, end) = (path.at(0), path.at(total));
    let (w, h) = (encoding.width, encoding.height);
    format!(
        "scale={sw}:{sh},zoompan=z='{zs}+(on/{t})*({ze}-{zs})':\
         x='iw/2-(iw/zoom/2)+({xs}+({xe}-{xs})*(on/{t}))*iw':\
         y='ih/2-(ih/zoom/2)+({ys}+({ye}-{ys})*(on/{t}))*ih':\
         d={t}:s={w}x{h}:fps={fps}",
        sw = w * 2,
        sh = h * 2,
        zs = start.zoom,
        ze = end.zoom,
        xs = start.x_offset,
        xe = end.x_offset,
        ys = start.y_offset,
        ye = end.y_offset,
        t = total,
        w = w,
        h = h,
        fps = encoding.fps,
    )
}

/// How an effect is chosen when the caller does not pin one.
#[derive(Debug)]
pub enum EffectSelector {
    /// Always the same effect
    Fixed(KenBurnsEffect),
    /// Reproducible sequence from a seed
    Seeded(StdRng),
    /// Fresh randomness on every pick
    Unseeded,
}

impl EffectSelector {
    pub fn seeded(seed: u64) -> Self {
        Self::Seeded(StdRng::seed_from_u64(seed))
    }

    pub fn next_effect(&mut self) -> KenBurnsEffect {
        let all = KenBurnsEffect::ALL;
        match self {
            EffectSelector::Fixed(effect) => *effect,
            EffectSelector::Seeded(rng) => all[rng.random_range(0..all.len())],
            EffectSelector::Unseeded => all[rand::rng().random_range(0..all.len())],
        }
    }
}

/// Input for one item clip.
#[derive(Debug, Clone)]
pub struct SegmentRequest {
    pub item_index: usize,
    /// Source image; `None` or a missing file renders from a placeholder
    pub image: Option<PathBuf>,
    /// Title drawn on the placeholder
    pub title: String,
    /// Pinned effect; overrides the selector
    pub effect: Option<KenBurnsEffect>,
    pub duration_secs: f64,
    pub output: PathBuf,
}

/// Renders still images into Ken Burns clips through a [`RenderBackend`].
pub struct SegmentRenderer {
    backend: Arc<dyn RenderBackend>,
    encoding: EncodingConfig,
    selector: Mutex<EffectSelector>,
}

impl SegmentRenderer {
    pub fn new(backend: Arc<dyn RenderBackend>, encoding: EncodingConfig, selector: EffectSelector) -> Self {
        Self {
            backend,
            encoding,
            selector: Mutex::new(selector),
        }
    }

    pub fn encoding(&self) -> &EncodingConfig {
        &self.encoding
    }

    fn pick_effect(&self, pinned: Option<KenBurnsEffect>) -> KenBurnsEffect {
        if let Some(effect) = pinned {
            return effect;
        }
        match self.selector.lock() {
            Ok(mut selector) => selector.next_effect(),
            Err(poisoned) => poisoned.into_inner().next_effect(),
        }
    }

    /// Render one item clip whose length equals `duration_secs`.
    pub async fn render(&self, request: SegmentRequest) -> MediaResult<RenderSegment> {
        if !request.duration_secs.is_finite() || request.duration_secs <= 0.0 {
            return Err(MediaError::invalid_input(format!(
                "segment {} has invalid duration {}",
                request.item_index, request.duration_secs
            )));
        }

        let effect = self.pick_effect(request.effect);
        let (source_image, used_placeholder) = match request.image.as_deref() {
            Some(path) if path.exists() => (path.to_path_buf(), false),
            other => {
                if let Some(missing) = other {
                    warn!(
                        item = request.item_index,
                        image = %missing.display(),
                        "Source image missing, using placeholder"
                    );
                }
                let placeholder = placeholder_path(&request.output);
                create_placeholder(
                    self.backend.as_ref(),
                    &placeholder_title(&request.title, request.item_index),
                    &placeholder,
                    self.encoding.width,
                    self.encoding.height,
                )
                .await?;
                (placeholder, true)
            }
        };

        let total_frames = self.encoding.frame_count(request.duration_secs);
        debug!(
            item = request.item_index,
            effect = %effect,
            frames = total_frames,
            "Rendering Ken Burns segment"
        );

        let op = RenderOp::KenBurns {
            image: source_image.clone(),
            output: request.output.clone(),
            params: effect.params(),
            duration_secs: request.duration_secs,
            encoding: self.encoding.clone(),
        };
        let output = self.backend.execute(&op).await?;

        info!(
            item = request.item_index,
            effect = %effect,
            duration = request.duration_secs,
            placeholder = used_placeholder,
            "Segment rendered"
        );

        Ok(RenderSegment {
            item_index: request.item_index,
            source_image,
            effect,
            duration_secs: request.duration_secs,
            output_clip: output,
            used_placeholder,
        })
    }
}

fn placeholder_path(clip: &Path) -> PathBuf {
    let stem = clip
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "segment".to_string());
    clip.with_file_name(format!("{}_placeholder.png", stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingBackend;

    #[test]
    fn test_camera_path_endpoints() {
        let path = CameraPath::new(KenBurnsEffect::ZoomIn, 300);
        assert_eq!(path.at(0).zoom, 1.0);
        assert!((path.at(150).zoom - 1.15).abs() < 1e-9);
        assert!((path.at(300).zoom - 1.3).abs() < 1e-9);
        // Past the end stays at the end
        assert!((path.at(400).zoom - 1.3).abs() < 1e-9);
    }

    #[test]
    fn test_camera_path_pan() {
        let path = CameraPath::new(KenBurnsEffect::PanRight, 100);
        assert!((path.at(0).x_offset + 0.1).abs() < 1e-9);
        assert!(path.at(50).x_offset.abs() < 1e-9);
        assert!((path.at(100).x_offset - 0.1).abs() < 1e-9);
        assert_eq!(path.at(50).y_offset, 0.0);
    }

    #[test]
    fn test_zoompan_filter() {
        let filter = zoompan_filter(&CameraPath::new(KenBurnsEffect::ZoomIn, 300), &EncodingConfig::default());
        assert!(filter.starts_with("scale=3840:2160,zoompan="));
        assert!(filter.contains("z='1+(on/300)*(1.3-1)'"));
        assert!(filter.contains("d=300:s=1920x1080:fps=30"));
    }

    #[test]
    fn test_zoompan_filter_follows_camera_path() {
        for effect in KenBurnsEffect::ALL {
            let path = CameraPath::new(effect, 120);
            let (first, last) = (path.at(0), path.at(120));
            let filter = zoompan_filter(&path, &EncodingConfig::default());

            let zoom = format!("z='{}+(on/120)*({}-{})'", first.zoom, last.zoom, first.zoom);
            let x = format!("({}+({}-{})*(on/120))*iw", first.x_offset, last.x_offset, first.x_offset);
            let y = format!("({}+({}-{})*(on/120))*ih", first.y_offset, last.y_offset, first.y_offset);
            assert!(filter.contains(&zoom), "{}: {}", effect, filter);
            assert!(filter.contains(&x), "{}: {}", effect, filter);
            assert!(filter.contains(&y), "{}: {}", effect, filter);
        }
    }

    #[test]
    fn test_seeded_selection_is_reproducible() {
        let mut a = EffectSelector::seeded(42);
        let mut b = EffectSelector::seeded(42);
        let seq_a: Vec<_> = (0..10).map(|_| a.next_effect()).collect();
        let seq_b: Vec<_> = (0..10).map(|_| b.next_effect()).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[tokio::test]
    async fn test_pinned_effect_wins() {
        let backend = Arc::new(RecordingBackend::new());
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("img.jpg");
        std::fs::write(&image, b"jpg").unwrap();

        let renderer = SegmentRenderer::new(
            backend.clone(),
            EncodingConfig::default(),
            EffectSelector::Fixed(KenBurnsEffect::PanUp),
        );
        let segment = renderer
            .render(SegmentRequest {
                item_index: 0,
                image: Some(image.clone()),
                title: "Title".into(),
                effect: Some(KenBurnsEffect::ZoomOut),
                duration_secs: 12.5,
                output: dir.path().join("clip.mp4"),
            })
            .await
            .unwrap();

        assert_eq!(segment.effect, KenBurnsEffect::ZoomOut);
        assert_eq!(segment.source_image, image);
        assert!(!segment.used_placeholder);
        assert_eq!(segment.duration_secs, 12.5);
    }

    #[tokio::test]
    async fn test_missing_image_uses_placeholder() {
        let backend = Arc::new(RecordingBackend::new());
        let dir = tempfile::tempdir().unwrap();
        let renderer = SegmentRenderer::new(
            backend.clone(),
            EncodingConfig::default(),
            EffectSelector::Fixed(KenBurnsEffect::ZoomIn),
        );

        let segment = renderer
            .render(SegmentRequest {
                item_index: 3,
                image: Some(dir.path().join("missing.jpg")),
                title: "Storm warning".into(),
                effect: None,
                duration_secs: 4.0,
                output: dir.path().join("item_04.mp4"),
            })
            .await
            .unwrap();

        assert!(segment.used_placeholder);
        let ops = backend.ops();
        assert!(matches!(ops[0], RenderOp::Placeholder { .. }));
        assert!(matches!(ops[1], RenderOp::KenBurns { .. }));
    }

    #[tokio::test]
    async fn test_placeholder_title_is_shortened() {
        let backend = Arc::new(RecordingBackend::new());
        let dir = tempfile::tempdir().unwrap();
        let renderer = SegmentRenderer::new(
            backend.clone(),
            EncodingConfig::default(),
            EffectSelector::Fixed(KenBurnsEffect::ZoomIn),
        );
        let title = "A very long headline that keeps going and going past any sensible width";

        renderer
            .render(SegmentRequest {
                item_index: 0,
                image: None,
                title: title.into(),
                effect: None,
                duration_secs: 3.0,
                output: dir.path().join("item_01.mp4"),
            })
            .await
            .unwrap();

        match &backend.ops()[0] {
            RenderOp::Placeholder { title: drawn, .. } => {
                assert!(drawn.chars().count() <= 30, "{:?}", drawn);
                assert!(drawn.starts_with("A very long headline"));
                assert!(drawn.ends_with("..."));
            }
            other => panic!("expected placeholder, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rejects_non_positive_duration() {
        let renderer = SegmentRenderer::new(
            Arc::new(RecordingBackend::new()),
            EncodingConfig::default(),
            EffectSelector::Unseeded,
        );
        let result = renderer
            .render(SegmentRequest {
                item_index: 0,
                image: None,
                title: String::new(),
                effect: None,
                duration_secs: 0.0,
                output: PathBuf::from("x.mp4"),
            })
            .await;
        assert!(matches!(result, Err(MediaError::InvalidInput(_))));
    }
}
