//! FFmpeg CLI wrapper for narrated news videos.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with per-call timeouts
//! - A `RenderBackend` trait describing every media operation declaratively
//! - Ken Burns segment rendering from still images
//! - Multi-step compositing (concat, narration, music, watermark)
//! - Narration assembly, placeholders and thumbnails

pub mod backend;
pub mod command;
pub mod compositor;
pub mod error;
pub mod fs_utils;
pub mod ken_burns;
pub mod narration;
pub mod placeholder;
pub mod probe;
pub mod progress;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
pub mod thumbnail;
pub mod watermark;

pub use backend::{probe_within, FfmpegBackend, RenderBackend, RenderOp};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use compositor::{
    ClipSequence, Composition, CompositionError, CompositionRequest, CompositionStep, MusicBed,
    SegmentCompositor,
};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{ensure_dir, move_file};
pub use ken_burns::{CameraPath, EffectSelector, SegmentRenderer, SegmentRequest};
pub use narration::{assemble_narration, NarrationTrack};
pub use placeholder::create_placeholder;
pub use probe::{get_duration, probe_media, probe_media_with_timeout, MediaInfo, DEFAULT_PROBE_TIMEOUT_SECS};
pub use progress::FfmpegProgress;
pub use thumbnail::generate_thumbnail;
pub use watermark::{Corner, WatermarkConfig};
