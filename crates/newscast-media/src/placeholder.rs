//! Placeholder stills for items without a usable image.

use std::path::{Path, PathBuf};
use tracing::warn;

use crate::backend::{RenderBackend, RenderOp};
use crate::command::escape_filter_path;
use crate::error::{MediaError, MediaResult};

/// Background colour (#1e1e1e).
pub const BACKGROUND_RGB: [u8; 3] = [30, 30, 30];
/// Title colour (#c8c8c8).
pub const TEXT_RGB: [u8; 3] = [200, 200, 200];
/// Title font size at 1080 lines.
pub const FONT_SIZE_1080P: u32 = 80;
/// Longest title drawn on a placeholder.
pub const MAX_TITLE_CHARS: usize = 30;

/// Shorten `title` to `max_chars`, marking the cut with "...".
pub fn truncate_title(title: &str, max_chars: usize) -> String {
    let title = title.trim();
    if title.chars().count() <= max_chars {
        return title.to_string();
    }
    let kept: String = title.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

/// Text shown for item `index` (0-based) when it has no title.
pub fn placeholder_title(title: &str, index: usize) -> String {
    if title.trim().is_empty() {
        format!("News {}", index + 1)
    } else {
        truncate_title(title, MAX_TITLE_CHARS)
    }
}

/// Sidecar file holding drawtext content for `output`.
pub fn text_file_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "text".to_string());
    output.with_file_name(format!("{}.txt", stem))
}

/// `drawtext` filter centring the contents of `text_file`.
pub fn centered_text_filter(text_file: &Path, font_file: Option<&Path>, font_size: u32, color: &str) -> String {
    let mut filter = format!(
        "drawtext=textfile='{}':expansion=none:fontcolor={}:fontsize={}:x=(w-text_w)/2:y=(h-text_h)/2",
        escape_filter_path(text_file),
        color,
        font_size
    );
    if let Some(font) = font_file {
        filter.push_str(&format!(":fontfile='{}'", escape_filter_path(font)));
    }
    filter
}

/// Font size scaled to the output height.
pub fn scaled_font_size(height: u32) -> u32 {
    (FONT_SIZE_1080P * height / 1080).max(12)
}

/// Write a placeholder still to `output`.
///
/// The backend draws the title; if that fails a plain background frame is
/// written directly so the item can still be rendered.
pub async fn create_placeholder(
    backend: &dyn RenderBackend,
    title: &str,
    output: &Path,
    width: u32,
    height: u32,
) -> MediaResult<PathBuf> {
    let op = RenderOp::Placeholder {
        title: title.to_string(),
        output: output.to_path_buf(),
        width,
        height,
    };

    match backend.execute(&op).await {
        Ok(path) => Ok(path),
        Err(e) => {
            warn!(error = %e, output = %output.display(), "Titled placeholder failed, writing plain frame");
            write_solid_frame(output, width, height).await?;
            Ok(output.to_path_buf())
        }
    }
}

/// Write a solid background image with the `image` crate.
pub async fn write_solid_frame(output: &Path, width: u32, height: u32) -> MediaResult<()> {
    if width == 0 || height == 0 {
        return Err(MediaError::invalid_input("placeholder size must be non-zero"));
    }
    let output = output.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb(BACKGROUND_RGB));
        img.save(&output)
    })
    .await
    .map_err(|e| MediaError::internal(format!("placeholder task failed: {}", e)))??;
    Ok(())
}
