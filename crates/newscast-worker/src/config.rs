//! Pipeline configuration.
//!
//! Built once at startup (`NewscastConfig::from_env`) and passed into
//! constructors. Every value has a default so an empty environment yields a
//! runnable configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use newscast_media::compositor::DEFAULT_MUSIC_VOLUME;
use newscast_media::watermark::DEFAULT_MARGIN;
use newscast_media::Corner;
use newscast_models::narration::DEFAULT_SEGMENT_GAP_SECS;
use newscast_models::EncodingConfig;

use crate::error::PipelineError;

/// Read and parse an environment variable, falling back to `default` when it
/// is unset or unparsable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_opt(key).map(PathBuf::from)
}

/// Split a comma separated list, dropping blanks.
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// What to do when an item has no usable visual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisualFallback {
    /// Render from a placeholder; drop the item if that fails too
    #[default]
    Placeholder,
    /// Fail the run
    AbortRun,
}

impl FromStr for VisualFallback {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "placeholder" => Ok(VisualFallback::Placeholder),
            "abort" | "abort_run" => Ok(VisualFallback::AbortRun),
            other => Err(PipelineError::config(format!("unknown visual fallback: {}", other))),
        }
    }
}

/// Wall-clock time of day, `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTime {
    pub hour: u32,
    pub minute: u32,
}

impl Default for DailyTime {
    fn default() -> Self {
        Self { hour: 18, minute: 0 }
    }
}

impl FromStr for DailyTime {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || PipelineError::config(format!("invalid time of day: {:?}", s));
        let (h, m) = s.trim().split_once(':').ok_or_else(bad)?;
        let hour: u32 = h.parse().map_err(|_| bad())?;
        let minute: u32 = m.parse().map_err(|_| bad())?;
        if hour > 23 || minute > 59 {
            return Err(bad());
        }
        Ok(Self { hour, minute })
    }
}

/// Filesystem layout.
#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub database: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self::under(PathBuf::from("data"))
    }
}

impl PathsConfig {
    /// Default layout below `data_dir`.
    pub fn under(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            database: data_dir.join("newscast.db"),
            data_dir,
        }
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.data_dir.join("audio")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }

    pub fn work_dir(&self) -> PathBuf {
        self.data_dir.join("work")
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.data_dir.join("videos")
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        self.data_dir.join("thumbnails")
    }
}

/// Narration settings.
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Background music level relative to narration
    pub music_volume: f64,
    /// Silence between narration segments
    pub segment_gap_secs: f64,
    pub voice: String,
    /// Speaking rate multiplier, 1.0 is normal
    pub speech_rate: f64,
    /// Text-to-speech executable
    pub tts_command: String,
    /// Speaking speed used when a duration cannot be measured
    pub chars_per_second: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            music_volume: DEFAULT_MUSIC_VOLUME,
            segment_gap_secs: DEFAULT_SEGMENT_GAP_SECS,
            voice: "en-US-AriaNeural".to_string(),
            speech_rate: 1.0,
            tts_command: "edge-tts".to_string(),
            chars_per_second: 13.0,
        }
    }
}

/// Optional branding assets. Each is used only if its file exists.
#[derive(Debug, Clone)]
pub struct AssetsConfig {
    pub intro_video: Option<PathBuf>,
    pub outro_video: Option<PathBuf>,
    pub background_music: Option<PathBuf>,
    pub logo: Option<PathBuf>,
    pub watermark_corner: Corner,
    pub watermark_margin: u32,
    pub font_file: Option<PathBuf>,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            intro_video: None,
            outro_video: None,
            background_music: None,
            logo: None,
            watermark_corner: Corner::BottomRight,
            watermark_margin: DEFAULT_MARGIN,
            font_file: None,
        }
    }
}

impl AssetsConfig {
    /// `path` if configured and present on disk.
    pub fn existing(path: &Option<PathBuf>) -> Option<&Path> {
        path.as_deref().filter(|p| p.exists())
    }
}

/// Run behaviour.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub items_per_video: usize,
    pub visual_fallback: VisualFallback,
    /// Seed for Ken Burns effect selection; unseeded when `None`
    pub effect_seed: Option<u64>,
    /// Per backend call
    pub render_timeout: Duration,
    /// Per synthesized segment
    pub synth_timeout: Duration,
    /// Composer and publisher calls
    pub stage_timeout: Duration,
    /// Video title; `{date}` is replaced
    pub title_template: String,
    pub date_format: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            items_per_video: 7,
            visual_fallback: VisualFallback::Placeholder,
            effect_seed: None,
            render_timeout: Duration::from_secs(600),
            synth_timeout: Duration::from_secs(120),
            stage_timeout: Duration::from_secs(300),
            title_template: "Top News {date}".to_string(),
            date_format: "%d/%m/%Y".to_string(),
        }
    }
}

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub daily_run_time: DailyTime,
    /// Offset of the schedule's wall clock from UTC
    pub utc_offset_minutes: i32,
    pub poll_interval: Duration,
    /// Bound on waiting for in-flight jobs at stop
    pub shutdown_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            daily_run_time: DailyTime::default(),
            utc_offset_minutes: 0,
            poll_interval: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(60),
        }
    }
}

/// Content feeds.
#[derive(Debug, Clone)]
pub struct SupplierConfig {
    pub feed_urls: Vec<String>,
    pub limit_per_source: usize,
    pub request_timeout: Duration,
    /// Stock photo fallback keys; each provider is skipped when unset
    pub pexels_api_key: Option<String>,
    pub unsplash_api_key: Option<String>,
}

impl Default for SupplierConfig {
    fn default() -> Self {
        Self {
            feed_urls: Vec::new(),
            limit_per_source: 20,
            request_timeout: Duration::from_secs(30),
            pexels_api_key: None,
            unsplash_api_key: None,
        }
    }
}

/// Publishing endpoint and metadata.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Base URL; publishing is disabled when unset
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub tags: Vec<String>,
    pub category: String,
    pub privacy: String,
    /// Description; `{date}` and `{news_list}` are replaced
    pub description_template: String,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            token: None,
            tags: vec!["news".to_string(), "daily news".to_string()],
            category: "25".to_string(),
            privacy: "public".to_string(),
            description_template: "Top stories for {date}:\n{news_list}".to_string(),
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, Default)]
pub struct NewscastConfig {
    pub paths: PathsConfig,
    pub encoding: EncodingConfig,
    pub audio: AudioConfig,
    pub assets: AssetsConfig,
    pub pipeline: PipelineConfig,
    pub scheduler: SchedulerConfig,
    pub supplier: SupplierConfig,
    pub publisher: PublisherConfig,
}

impl NewscastConfig {
    /// Defaults with every path below `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            paths: PathsConfig::under(data_dir),
            ..Default::default()
        }
    }

    /// Create config from environment variables.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Self {
        let d = Self::default();

        let data_dir = env_path("NEWSCAST_DATA_DIR").unwrap_or(d.paths.data_dir);
        let mut paths = PathsConfig::under(data_dir);
        if let Some(db) = env_path("DATABASE_PATH") {
            paths.database = db;
        }

        let encoding = EncodingConfig::default()
            .with_resolution(
                env_or("VIDEO_WIDTH", d.encoding.width),
                env_or("VIDEO_HEIGHT", d.encoding.height),
            )
            .with_fps(env_or("VIDEO_FPS", d.encoding.fps))
            .with_bitrate(env_opt("VIDEO_BITRATE").unwrap_or(d.encoding.bitrate));

        let audio = AudioConfig {
            music_volume: env_or("MUSIC_VOLUME", d.audio.music_volume),
            segment_gap_secs: env_or("NARRATION_GAP_SECS", d.audio.segment_gap_secs),
            voice: env_opt("TTS_VOICE").unwrap_or(d.audio.voice),
            speech_rate: env_or("TTS_RATE", d.audio.speech_rate),
            tts_command: env_opt("TTS_COMMAND").unwrap_or(d.audio.tts_command),
            chars_per_second: env_or("TTS_CHARS_PER_SECOND", d.audio.chars_per_second),
        };

        let assets = AssetsConfig {
            intro_video: env_path("INTRO_VIDEO"),
            outro_video: env_path("OUTRO_VIDEO"),
            background_music: env_path("BACKGROUND_MUSIC"),
            logo: env_path("LOGO_PATH"),
            watermark_corner: env_or("WATERMARK_CORNER", d.assets.watermark_corner),
            watermark_margin: env_or("WATERMARK_MARGIN", d.assets.watermark_margin),
            font_file: env_path("FONT_FILE"),
        };

        let pipeline = PipelineConfig {
            items_per_video: env_or("ITEMS_PER_VIDEO", d.pipeline.items_per_video),
            visual_fallback: env_or("VISUAL_FALLBACK", d.pipeline.visual_fallback),
            effect_seed: env_opt("EFFECT_SEED").and_then(|s| s.parse().ok()),
            render_timeout: Duration::from_secs(env_or("RENDER_TIMEOUT_SECS", 600)),
            synth_timeout: Duration::from_secs(env_or("SYNTH_TIMEOUT_SECS", 120)),
            stage_timeout: Duration::from_secs(env_or("STAGE_TIMEOUT_SECS", 300)),
            title_template: env_opt("VIDEO_TITLE_TEMPLATE").unwrap_or(d.pipeline.title_template),
            date_format: env_opt("VIDEO_DATE_FORMAT").unwrap_or(d.pipeline.date_format),
        };

        let scheduler = SchedulerConfig {
            enabled: env_or("SCHEDULER_ENABLED", d.scheduler.enabled),
            daily_run_time: env_or("DAILY_RUN_TIME", d.scheduler.daily_run_time),
            utc_offset_minutes: env_or("SCHEDULER_UTC_OFFSET_MINUTES", d.scheduler.utc_offset_minutes),
            poll_interval: Duration::from_millis(env_or("SCHEDULER_POLL_MS", 1000)),
            shutdown_timeout: Duration::from_secs(env_or("SHUTDOWN_TIMEOUT_SECS", 60)),
        };

        let supplier = SupplierConfig {
            feed_urls: env_opt("NEWS_FEED_URLS").map(|v| parse_list(&v)).unwrap_or_default(),
            limit_per_source: env_or("FEED_LIMIT_PER_SOURCE", d.supplier.limit_per_source),
            request_timeout: Duration::from_secs(env_or("HTTP_TIMEOUT_SECS", 30)),
            pexels_api_key: env_opt("PEXELS_API_KEY"),
            unsplash_api_key: env_opt("UNSPLASH_API_KEY"),
        };

        let publisher = PublisherConfig {
            endpoint: env_opt("PUBLISH_ENDPOINT"),
            token: env_opt("PUBLISH_TOKEN"),
            tags: env_opt("PUBLISH_TAGS").map(|v| parse_list(&v)).unwrap_or(d.publisher.tags),
            category: env_opt("PUBLISH_CATEGORY").unwrap_or(d.publisher.category),
            privacy: env_opt("PUBLISH_PRIVACY").unwrap_or(d.publisher.privacy),
            description_template: env_opt("PUBLISH_DESCRIPTION_TEMPLATE")
                .unwrap_or(d.publisher.description_template),
        };

        Self {
            paths,
            encoding,
            audio,
            assets,
            pipeline,
            scheduler,
            supplier,
            publisher,
        }
    }
}
