//! Narration synthesizers.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

/// Turns text into an audio file.
#[async_trait]
pub trait NarrationSynthesizer: Send + Sync {
    /// Write speech for `text` to `output` and return the written path.
    async fn synthesize(&self, text: &str, output: &Path) -> PipelineResult<PathBuf>;
}

/// Rate multiplier in the `+X%` / `-X%` form edge-tts expects.
pub fn format_rate(rate: f64) -> String {
    let percent = ((rate - 1.0) * 100.0).round() as i64;
    if percent >= 0 {
        format!("+{}%", percent)
    } else {
        format!("{}%", percent)
    }
}

/// Runs an external TTS command line (edge-tts compatible).
///
/// Invoked as `<program> --voice <voice> --rate=<rate> --text <text>
/// --write-media <output>`. The process is killed if the call is dropped,
/// so callers bound it with a timeout.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: String,
    voice: String,
    rate: String,
}

impl CommandSynthesizer {
    pub fn new(program: impl Into<String>, voice: impl Into<String>, speech_rate: f64) -> Self {
        Self {
            program: program.into(),
            voice: voice.into(),
            rate: format_rate(speech_rate),
        }
    }

    pub fn args(&self, text: &str, output: &Path) -> Vec<String> {
        vec![
            "--voice".to_string(),
            self.voice.clone(),
            format!("--rate={}", self.rate),
            "--text".to_string(),
            text.to_string(),
            "--write-media".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl NarrationSynthesizer for CommandSynthesizer {
    async fn synthesize(&self, text: &str, output: &Path) -> PipelineResult<PathBuf> {
        if text.trim().is_empty() {
            return Err(PipelineError::synthesis("empty narration text"));
        }
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        debug!(program = %self.program, voice = %self.voice, output = %output.display(), "Synthesizing");
        let result = Command::new(&self.program)
            .args(self.args(text, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        let out = match result {
            Ok(out) => out,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::synthesis(format!("{} not found in PATH", self.program)));
            }
            Err(e) => return Err(PipelineError::synthesis(format!("{}: {}", self.program, e))),
        };

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let last = stderr.lines().last().unwrap_or("").trim().to_string();
            return Err(PipelineError::synthesis(format!(
                "{} exited with {}: {}",
                self.program, out.status, last
            )));
        }
        if !output.exists() {
            return Err(PipelineError::synthesis(format!("{} wrote no audio", self.program)));
        }
        Ok(output.to_path_buf())
    }
}
