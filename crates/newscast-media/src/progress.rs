//! Parsing of ffmpeg `-progress pipe:2` output.

use serde::{Deserialize, Serialize};

/// Snapshot of an ffmpeg encode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Frames written so far
    pub frame: u64,
    /// Output position in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed relative to realtime
    pub speed: f64,
    /// ffmpeg reported `progress=end`
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Percentage of `total_secs` written, capped at 100.
    pub fn percentage(&self, total_secs: f64) -> f64 {
        if total_secs <= 0.0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / 1000.0 / total_secs) * 100.0).clamp(0.0, 100.0)
    }
}

/// Outcome of feeding one stderr line to the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressLine {
    /// A `key=value` progress field; `Some` when a block ended
    Progress(Option<FfmpegProgress>),
    /// Anything else ffmpeg printed (warnings, errors)
    Diagnostic(String),
}

/// Update `current` from one line of ffmpeg stderr.
pub fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> ProgressLine {
    let line = line.trim();
    let Some((key, value)) = line.split_once('=') else {
        return ProgressLine::Diagnostic(line.to_string());
    };

    match key {
        "out_time_us" | "out_time_ms" => {
            // ffmpeg reports microseconds under both keys
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            current.is_complete = value == "end";
            return ProgressLine::Progress(Some(current.clone()));
        }
        "fps" | "bitrate" | "total_size" | "out_time" | "dup_frames" | "drop_frames"
        | "stream_0_0_q" => {}
        _ if key.contains(' ') => return ProgressLine::Diagnostic(line.to_string()),
        _ => {}
    }

    ProgressLine::Progress(None)
}
