//! Rendering backend abstraction.
//!
//! Pipeline code describes each media operation as a [`RenderOp`] and hands
//! it to a [`RenderBackend`]. [`FfmpegBackend`] turns every op into a single
//! ffmpeg invocation with a per-call timeout.

use async_trait::async_trait;
use metrics::{counter, histogram};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;
use tracing::{debug, info};

use newscast_models::{EncodingConfig, KenBurnsParams};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::compositor::music_mix_filter;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::ensure_parent;
use crate::ken_burns::{zoompan_filter, CameraPath};
use crate::narration::concat_audio_filter;
use crate::placeholder::{centered_text_filter, scaled_font_size, text_file_for};
use crate::probe::{probe_media_with_timeout, MediaInfo, DEFAULT_PROBE_TIMEOUT_SECS};
use crate::thumbnail::thumbnail_filter;
use crate::watermark::{build_overlay_filter, WatermarkConfig};

/// Histogram of backend call durations, labelled by op.
pub const RENDER_OP_DURATION: &str = "newscast_render_op_duration_seconds";
/// Counter of failed backend calls, labelled by op.
pub const RENDER_OP_FAILURES: &str = "newscast_render_op_failures_total";

/// Default per-call timeout.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 600;

/// A declarative media operation.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOp {
    /// Still image to a Ken Burns clip without audio
    KenBurns {
        image: PathBuf,
        output: PathBuf,
        params: KenBurnsParams,
        duration_secs: f64,
        encoding: EncodingConfig,
    },
    /// Solid background still with a centred title
    Placeholder {
        title: String,
        output: PathBuf,
        width: u32,
        height: u32,
    },
    /// Join clips in order by stream copy
    ConcatVideo {
        clips: Vec<PathBuf>,
        list_file: PathBuf,
        output: PathBuf,
    },
    /// Replace the video's audio with the narration track
    LayerNarration {
        video: PathBuf,
        narration: PathBuf,
        output: PathBuf,
        audio_codec: String,
        audio_bitrate: String,
    },
    /// Loop music under the existing audio
    MixMusic {
        video: PathBuf,
        music: PathBuf,
        volume: f64,
        output: PathBuf,
        audio_codec: String,
    },
    /// Overlay a logo image
    Overlay {
        video: PathBuf,
        watermark: WatermarkConfig,
        output: PathBuf,
        encoding: EncodingConfig,
    },
    /// Join audio files with silence between them
    ConcatAudio {
        inputs: Vec<PathBuf>,
        gap_secs: f64,
        output: PathBuf,
        audio_codec: String,
        audio_bitrate: String,
    },
    /// Titled still taken from a video
    Thumbnail {
        video: PathBuf,
        at_secs: f64,
        title: String,
        width: u32,
        height: u32,
        output: PathBuf,
    },
}

impl RenderOp {
    /// Short name used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderOp::KenBurns { .. } => "ken_burns",
            RenderOp::Placeholder { .. } => "placeholder",
            RenderOp::ConcatVideo { .. } => "concat_video",
            RenderOp::LayerNarration { .. } => "layer_narration",
            RenderOp::MixMusic { .. } => "mix_music",
            RenderOp::Overlay { .. } => "overlay",
            RenderOp::ConcatAudio { .. } => "concat_audio",
            RenderOp::Thumbnail { .. } => "thumbnail",
        }
    }

    pub fn output(&self) -> &Path {
        match self {
            RenderOp::KenBurns { output, .. }
            | RenderOp::Placeholder { output, .. }
            | RenderOp::ConcatVideo { output, .. }
            | RenderOp::LayerNarration { output, .. }
            | RenderOp::MixMusic { output, .. }
            | RenderOp::Overlay { output, .. }
            | RenderOp::ConcatAudio { output, .. }
            | RenderOp::Thumbnail { output, .. } => output,
        }
    }

    /// Files the op reads.
    pub fn inputs(&self) -> Vec<&Path> {
        match self {
            RenderOp::KenBurns { image, .. } => vec![image.as_path()],
            RenderOp::Placeholder { .. } => Vec::new(),
            RenderOp::ConcatVideo { clips, .. } => clips.iter().map(PathBuf::as_path).collect(),
            RenderOp::LayerNarration { video, narration, .. } => vec![video.as_path(), narration.as_path()],
            RenderOp::MixMusic { video, music, .. } => vec![video.as_path(), music.as_path()],
            RenderOp::Overlay { video, watermark, .. } => vec![video.as_path(), watermark.image_path()],
            RenderOp::ConcatAudio { inputs, .. } => inputs.iter().map(PathBuf::as_path).collect(),
            RenderOp::Thumbnail { video, .. } => vec![video.as_path()],
        }
    }

    /// Expected output length, when the op knows it.
    pub fn expected_duration(&self) -> Option<f64> {
        match self {
            RenderOp::KenBurns { duration_secs, .. } => Some(*duration_secs),
            _ => None,
        }
    }
}

/// Executes render operations.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Run `op` and return the path of the file it wrote.
    async fn execute(&self, op: &RenderOp) -> MediaResult<PathBuf>;

    /// Inspect a media file.
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo>;
}

/// Probe through `backend`, giving up after `limit`.
pub async fn probe_within(backend: &dyn RenderBackend, path: &Path, limit: Duration) -> MediaResult<MediaInfo> {
    tokio::time::timeout(limit, backend.probe(path))
        .await
        .map_err(|_| MediaError::Timeout(limit.as_secs()))?
}

/// [`RenderBackend`] backed by the ffmpeg and ffprobe binaries.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    runner: FfmpegRunner,
    font_file: Option<PathBuf>,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new(DEFAULT_CALL_TIMEOUT_SECS)
    }
}

impl FfmpegBackend {
    pub fn new(call_timeout_secs: u64) -> Self {
        Self {
            runner: FfmpegRunner::new().with_timeout(call_timeout_secs),
            font_file: None,
        }
    }

    /// Font used for drawn titles; ffmpeg's default font otherwise.
    pub fn with_font(mut self, font_file: Option<PathBuf>) -> Self {
        self.font_file = font_file;
        self
    }

    /// Build the ffmpeg command for `op`.
    ///
    /// Side files referenced by the command are written by [`Self::prepare`].
    pub fn command_for(&self, op: &RenderOp) -> FfmpegCommand {
        match op {
            RenderOp::KenBurns {
                image,
                output,
                params,
                duration_secs,
                encoding,
            } => {
                let frames = encoding.frame_count(*duration_secs);
                FfmpegCommand::to_output(output)
                    .input(image)
                    .loop_image()
                    .video_filter(zoompan_filter(&CameraPath::from_params(*params, frames), encoding))
                    .output_args(encoding.to_video_args())
                    .duration(*duration_secs)
                    .no_audio()
            }
            RenderOp::Placeholder {
                output,
                width,
                height,
                ..
            } => FfmpegCommand::to_output(output)
                .input_source(format!("color=c=0x1e1e1e:s={}x{}:d=1", width, height))
                .format("lavfi")
                .video_filter(centered_text_filter(
                    &text_file_for(output),
                    self.font_file.as_deref(),
                    scaled_font_size(*height),
                    "0xc8c8c8",
                ))
                .single_frame(),
            RenderOp::ConcatVideo {
                list_file, output, ..
            } => FfmpegCommand::to_output(output)
                .input(list_file)
                .format("concat")
                .input_args(["-safe", "0"])
                .output_args(["-c", "copy"]),
            RenderOp::LayerNarration {
                video,
                narration,
                output,
                audio_codec,
                audio_bitrate,
            } => FfmpegCommand::to_output(output)
                .input(video)
                .input(narration)
                .map("0:v")
                .map("1:a")
                .video_codec("copy")
                .audio_codec(audio_codec)
                .audio_bitrate(audio_bitrate)
                .shortest(),
            RenderOp::MixMusic {
                video,
                music,
                volume,
                output,
                audio_codec,
            } => FfmpegCommand::to_output(output)
                .input(video)
                .input(music)
                .loop_stream()
                .filter_complex(music_mix_filter(*volume))
                .map("0:v")
                .map("[aout]")
                .video_codec("copy")
                .audio_codec(audio_codec),
            RenderOp::Overlay {
                video,
                watermark,
                output,
                encoding,
            } => FfmpegCommand::to_output(output)
                .input(video)
                .input(watermark.image_path())
                .filter_complex(build_overlay_filter(watermark))
                .output_args(encoding.to_video_args())
                .audio_codec("copy"),
            RenderOp::ConcatAudio {
                inputs,
                gap_secs,
                output,
                audio_codec,
                audio_bitrate,
            } => inputs
                .iter()
                .fold(FfmpegCommand::to_output(output), |cmd, input| cmd.input(input))
                .filter_complex(concat_audio_filter(inputs.len(), *gap_secs))
                .map("[aout]")
                .audio_codec(audio_codec)
                .audio_bitrate(audio_bitrate),
            RenderOp::Thumbnail {
                video,
                at_secs,
                width,
                height,
                output,
                ..
            } => FfmpegCommand::to_output(output)
                .input(video)
                .seek(*at_secs)
                .video_filter(thumbnail_filter(
                    *width,
                    *height,
                    &text_file_for(output),
                    self.font_file.as_deref(),
                ))
                .single_frame(),
        }
    }

    /// Write side files the command reads (concat lists, drawtext sources).
    pub async fn prepare(&self, op: &RenderOp) -> MediaResult<()> {
        match op {
            RenderOp::ConcatVideo {
                clips, list_file, ..
            } => {
                let mut list = String::new();
                for clip in clips {
                    let absolute = fs::canonicalize(clip).await?;
                    list.push_str(&concat_list_line(&absolute));
                    list.push('\n');
                }
                ensure_parent(list_file).await?;
                fs::write(list_file, list).await?;
            }
            RenderOp::Placeholder { title, output, .. } | RenderOp::Thumbnail { title, output, .. } => {
                let text_file = text_file_for(output);
                ensure_parent(&text_file).await?;
                fs::write(&text_file, title).await?;
            }
            _ => {}
        }
        Ok(())
    }
}

/// One `file '...'` line of a concat demuxer list.
pub fn concat_list_line(path: &Path) -> String {
    format!("file '{}'", path.to_string_lossy().replace('\'', "'\\''"))
}

#[async_trait]
impl RenderBackend for FfmpegBackend {
    async fn execute(&self, op: &RenderOp) -> MediaResult<PathBuf> {
        let kind = op.kind();
        for input in op.inputs() {
            if !input.exists() {
                counter!(RENDER_OP_FAILURES, "op" => kind).increment(1);
                return Err(MediaError::FileNotFound(input.to_path_buf()));
            }
        }

        ensure_parent(op.output()).await?;
        self.prepare(op).await?;

        let cmd = self.command_for(op);
        let started = Instant::now();
        let expected = op.expected_duration();
        let result = self
            .runner
            .run_with_progress(&cmd, move |p| {
                if let Some(total) = expected {
                    debug!(op = kind, percent = p.percentage(total), "render progress");
                }
            })
            .await;
        histogram!(RENDER_OP_DURATION, "op" => kind).record(started.elapsed().as_secs_f64());

        if let Err(e) = result {
            counter!(RENDER_OP_FAILURES, "op" => kind).increment(1);
            return Err(e);
        }

        let output = op.output();
        if !output.exists() {
            counter!(RENDER_OP_FAILURES, "op" => kind).increment(1);
            return Err(MediaError::OutputMissing(output.to_path_buf()));
        }

        info!(op = kind, output = %output.display(), elapsed_ms = started.elapsed().as_millis() as u64, "Render op finished");
        Ok(output.to_path_buf())
    }

    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        let limit = self.runner.timeout_secs().unwrap_or(DEFAULT_PROBE_TIMEOUT_SECS);
        probe_media_with_timeout(path, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newscast_models::KenBurnsEffect;

    fn args_of(op: &RenderOp) -> String {
        FfmpegBackend::default().command_for(op).build_args().join(" ")
    }

    #[test]
    fn test_ken_burns_command() {
        let args = args_of(&RenderOp::KenBurns {
            image: "img.jpg".into(),
            output: "clip.mp4".into(),
            params: KenBurnsEffect::PanLeft.params(),
            duration_secs: 7.5,
            encoding: EncodingConfig::default(),
        });
        assert!(args.contains("-loop 1 -i img.jpg"));
        assert!(args.contains("d=225:s=1920x1080:fps=30"));
        assert!(args.contains("-t 7.500"));
        assert!(args.contains("-b:v 8000k"));
        assert!(args.contains("-an"));
    }

    #[test]
    fn test_concat_command_uses_stream_copy() {
        let args = args_of(&RenderOp::ConcatVideo {
            clips: vec!["a.mp4".into()],
            list_file: "list.txt".into(),
            output: "joined.mp4".into(),
        });
        assert!(args.contains("-f concat -safe 0 -i list.txt"));
        assert!(args.contains("-c copy"));
    }

    #[test]
    fn test_narration_command() {
        let args = args_of(&RenderOp::LayerNarration {
            video: "v.mp4".into(),
            narration: "n.m4a".into(),
            output: "out.mp4".into(),
            audio_codec: "aac".into(),
            audio_bitrate: "192k".into(),
        });
        assert!(args.contains("-map 0:v -map 1:a -c:v copy -c:a aac"));
        assert!(args.contains("-shortest"));
    }

    #[test]
    fn test_music_command_loops_music() {
        let args = args_of(&RenderOp::MixMusic {
            video: "v.mp4".into(),
            music: "bed.mp3".into(),
            volume: 0.15,
            output: "out.mp4".into(),
            audio_codec: "aac".into(),
        });
        assert!(args.contains("-i v.mp4 -stream_loop -1 -i bed.mp3"));
        assert!(args.contains("amix=inputs=2:duration=first"));
        assert!(args.contains("-map [aout]"));
    }

    #[test]
    fn test_overlay_command_copies_audio() {
        let args = args_of(&RenderOp::Overlay {
            video: "v.mp4".into(),
            watermark: WatermarkConfig::new("logo.png"),
            output: "out.mp4".into(),
            encoding: EncodingConfig::default(),
        });
        assert!(args.contains("-i v.mp4 -i logo.png"));
        assert!(args.contains("overlay=W-w-20:H-h-20"));
        assert!(args.contains("-c:a copy"));
    }

    #[test]
    fn test_concat_list_line_escapes_quotes() {
        assert_eq!(concat_list_line(Path::new("/tmp/it's.mp4")), "file '/tmp/it'\\''s.mp4'");
    }

    #[tokio::test]
    async fn test_prepare_writes_concat_list_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        let b = dir.path().join("b.mp4");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();
        let list_file = dir.path().join("list.txt");

        FfmpegBackend::default()
            .prepare(&RenderOp::ConcatVideo {
                clips: vec![b.clone(), a.clone()],
                list_file: list_file.clone(),
                output: dir.path().join("out.mp4"),
            })
            .await
            .unwrap();

        let list = std::fs::read_to_string(&list_file).unwrap();
        let lines: Vec<&str> = list.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("b.mp4'"));
        assert!(lines[1].ends_with("a.mp4'"));
    }

    #[tokio::test]
    async fn test_missing_input_fails_before_spawn() {
        let result = FfmpegBackend::default()
            .execute(&RenderOp::MixMusic {
                video: "/nonexistent/v.mp4".into(),
                music: "/nonexistent/m.mp3".into(),
                volume: 0.15,
                output: "/tmp/out.mp4".into(),
                audio_codec: "aac".into(),
            })
            .await;
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}
