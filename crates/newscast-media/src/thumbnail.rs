//! Thumbnail generation.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use newscast_models::encoding::{THUMBNAIL_HEIGHT, THUMBNAIL_TIMESTAMP_SECS, THUMBNAIL_WIDTH};

use crate::backend::{probe_within, RenderBackend, RenderOp};
use crate::command::escape_filter_path;
use crate::error::{MediaError, MediaResult};
use crate::placeholder::truncate_title;
use crate::probe::DEFAULT_PROBE_TIMEOUT_SECS;

/// Longest title drawn on a thumbnail.
pub const MAX_TITLE_CHARS: usize = 60;
/// Width of the white frame border.
pub const BORDER_PX: u32 = 5;

/// Blurred, darkened frame with the title centred and a white border.
pub fn thumbnail_filter(width: u32, height: u32, text_file: &Path, font_file: Option<&Path>) -> String {
    let mut text = format!(
        "drawtext=textfile='{}':expansion=none:fontcolor=white:fontsize={}:borderw=3:bordercolor=black:x=(w-text_w)/2:y=(h-text_h)/2",
        escape_filter_path(text_file),
        (height / 10).max(12)
    );
    if let Some(font) = font_file {
        text.push_str(&format!(":fontfile='{}'", escape_filter_path(font)));
    }
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},boxblur=8:2,eq=brightness=-0.25,{text},drawbox=x=0:y=0:w=iw:h=ih:color=white:t={b}",
        w = width,
        h = height,
        text = text,
        b = BORDER_PX
    )
}

/// Timestamp to grab, kept inside a video of `duration` seconds.
pub fn frame_timestamp(duration: f64) -> f64 {
    if duration <= 0.0 {
        return 0.0;
    }
    THUMBNAIL_TIMESTAMP_SECS.min(duration / 2.0)
}

/// Generate a thumbnail for `video`.
///
/// Falls back to a plain gradient image when the frame cannot be extracted.
pub async fn generate_thumbnail(
    backend: &dyn RenderBackend,
    video: &Path,
    title: &str,
    output: &Path,
) -> MediaResult<PathBuf> {
    let limit = Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS);
    let duration = probe_within(backend, video, limit).await.map(|i| i.duration).unwrap_or(0.0);
    let op = RenderOp::Thumbnail {
        video: video.to_path_buf(),
        at_secs: frame_timestamp(duration),
        title: truncate_title(title, MAX_TITLE_CHARS),
        width: THUMBNAIL_WIDTH,
        height: THUMBNAIL_HEIGHT,
        output: output.to_path_buf(),
    };

    match backend.execute(&op).await {
        Ok(path) => Ok(path),
        Err(e) => {
            warn!(error = %e, video = %video.display(), "Frame thumbnail failed, using gradient");
            write_gradient(output, THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT).await?;
            Ok(output.to_path_buf())
        }
    }
}

/// Vertical blue gradient with a white border.
pub async fn write_gradient(output: &Path, width: u32, height: u32) -> MediaResult<()> {
    if width <= BORDER_PX * 2 || height <= BORDER_PX * 2 {
        return Err(MediaError::invalid_input("thumbnail too small"));
    }
    let output = output.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            if x < BORDER_PX || y < BORDER_PX || x >= width - BORDER_PX || y >= height - BORDER_PX {
                return image::Rgb([255, 255, 255]);
            }
            let t = y as f32 / height as f32;
            image::Rgb([
                (20.0 + 20.0 * t) as u8,
                (40.0 + 40.0 * t) as u8,
                (90.0 + 110.0 * t) as u8,
            ])
        });
        img.save(&output)
    })
    .await
    .map_err(|e| MediaError::internal(format!("thumbnail task failed: {}", e)))??;
    Ok(())
}
