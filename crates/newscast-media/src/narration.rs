//! Narration track assembly.

use std::path::{Path, PathBuf};
use tracing::info;

use newscast_models::{combined_duration, AudioSegment, EncodingConfig};

use crate::backend::{RenderBackend, RenderOp};
use crate::error::{MediaError, MediaResult};

/// Joined narration audio.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationTrack {
    pub path: PathBuf,
    /// Sum of segment durations plus the gaps between them
    pub duration_secs: f64,
    pub segment_count: usize,
}

/// Filter that pads every input but the last with `gap_secs` of silence and
/// concatenates them in order.
pub fn concat_audio_filter(inputs: usize, gap_secs: f64) -> String {
    let mut chains = Vec::with_capacity(inputs + 1);
    let mut labels = String::new();
    for i in 0..inputs {
        let mut chain = format!(
            "[{i}:a]aformat=sample_fmts=fltp:sample_rates=44100:channel_layouts=stereo",
            i = i
        );
        if i + 1 < inputs && gap_secs > 0.0 {
            chain.push_str(&format!(",apad=pad_dur={:.3}", gap_secs));
        }
        chain.push_str(&format!("[a{}]", i));
        chains.push(chain);
        labels.push_str(&format!("[a{}]", i));
    }
    chains.push(format!("{}concat=n={}:v=0:a=1[aout]", labels, inputs));
    chains.join(";")
}

/// Join per-segment narration files into one track with `gap_secs` of
/// silence between consecutive segments.
pub async fn assemble_narration(
    backend: &dyn RenderBackend,
    segments: &[AudioSegment],
    gap_secs: f64,
    encoding: &EncodingConfig,
    output: &Path,
) -> MediaResult<NarrationTrack> {
    if segments.is_empty() {
        return Err(MediaError::invalid_input("no narration segments to assemble"));
    }
    if gap_secs < 0.0 {
        return Err(MediaError::invalid_input("narration gap cannot be negative"));
    }

    let op = RenderOp::ConcatAudio {
        inputs: segments.iter().map(|s| s.file_path.clone()).collect(),
        gap_secs,
        output: output.to_path_buf(),
        audio_codec: encoding.audio_codec.clone(),
        audio_bitrate: encoding.audio_bitrate.clone(),
    };
    let path = backend.execute(&op).await?;

    let durations: Vec<f64> = segments.iter().map(|s| s.duration_secs).collect();
    let duration_secs = combined_duration(&durations, gap_secs);
    info!(
        segments = segments.len(),
        duration = duration_secs,
        output = %path.display(),
        "Narration assembled"
    );

    Ok(NarrationTrack {
        path,
        duration_secs,
        segment_count: segments.len(),
    })
}
