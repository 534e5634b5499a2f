//! Production orchestrator.
//!
//! Drives one production run through its stages:
//!
//! 1. selection: claim unselected articles, create the production row
//! 2. planning: narration plan from the script composer
//! 3. synthesis: one audio file per segment, joined into one track
//! 4. rendering: one Ken Burns clip per item
//! 5. composition: clips, narration, music and watermark into the final file
//! 6. thumbnail (non-fatal)
//! 7. completion
//! 8. publish (optional; failure keeps the production completed)
//!
//! Any stage error before completion marks the production failed with the
//! stage and message. Running out of content creates no row at all.

use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{warn, Instrument};

use newscast_media::{
    assemble_narration, generate_thumbnail, move_file, probe_within, ClipSequence, CompositionRequest, EffectSelector,
    FfmpegBackend, MediaError, MediaInfo, MediaResult, MusicBed, RenderBackend, SegmentCompositor, SegmentRenderer,
    SegmentRequest, WatermarkConfig,
};
use newscast_models::{
    Article, AudioSegment, EngagementMetrics, ModelError, NarrationPlan, Production, ProductionId, ProductionStatus,
    PublishRequest, PublishResult, SegmentKind, Stage,
};
use newscast_store::Store;

use crate::composer::{estimate_duration, ScriptComposer, TemplateComposer};
use crate::config::{AssetsConfig, NewscastConfig, VisualFallback};
use crate::error::{PipelineError, PipelineResult};
use crate::images::{HttpImageFetcher, ImageSource, StockImageSearch, StockProvider};
use crate::logging::RunLogger;
use crate::metrics;
use crate::publisher::{render_description, render_title, HttpPublisher, Publisher};
use crate::synth::{CommandSynthesizer, NarrationSynthesizer};

/// Options for one run.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Publish after completion when a publisher is configured
    pub publish: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { publish: true }
    }
}

/// Outcome of one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub ok: bool,
    pub message: String,
}

/// What a run did.
///
/// `production_id` is `None` only when the run stopped before a production
/// row was created; `publish_error` separates "produced but not published"
/// from a failed run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub production_id: Option<ProductionId>,
    pub status: ProductionStatus,
    pub stages: Vec<StageOutcome>,
    pub failed_stage: Option<Stage>,
    pub failure_message: Option<String>,
    pub audio_path: Option<PathBuf>,
    pub video_path: Option<PathBuf>,
    pub thumbnail_path: Option<PathBuf>,
    pub duration_secs: Option<f64>,
    /// Items rendered from a placeholder image
    pub placeholder_items: Vec<usize>,
    /// Items left out of the video
    pub dropped_items: Vec<usize>,
    pub publish: Option<PublishResult>,
    pub publish_error: Option<String>,
}

impl RunReport {
    /// A video was produced.
    pub fn is_success(&self) -> bool {
        self.status.has_output()
    }

    /// Label of the failing stage, e.g. `"composition failed"`.
    pub fn failure_label(&self) -> Option<&'static str> {
        self.failed_stage.map(|s| s.failure_label())
    }

    /// `Err(RunFailed)` unless a video was produced.
    pub fn ensure_success(&self) -> PipelineResult<()> {
        if self.is_success() {
            return Ok(());
        }
        Err(PipelineError::RunFailed {
            stage: self.failed_stage.unwrap_or(Stage::Selection),
            message: self.failure_message.clone().unwrap_or_default(),
        })
    }

    fn record(&mut self, stage: Stage, ok: bool, message: impl Into<String>) {
        self.stages.push(StageOutcome {
            stage,
            ok,
            message: message.into(),
        });
    }
}

/// A stage error that ends the run.
#[derive(Debug)]
struct StageFailure {
    stage: Stage,
    message: String,
}

impl StageFailure {
    fn new(stage: Stage, error: impl fmt::Display) -> Self {
        Self {
            stage,
            message: error.to_string(),
        }
    }

    /// `map_err` adapter.
    fn at<E: fmt::Display>(stage: Stage) -> impl FnOnce(E) -> StageFailure {
        move |e| StageFailure::new(stage, e)
    }
}

type StageResult<T> = Result<T, StageFailure>;

/// Await `fut` for at most `limit`; a timeout is a failure of `stage`.
async fn bounded<T, F>(stage: Stage, limit: Duration, what: &str, fut: F) -> StageResult<T>
where
    F: Future<Output = PipelineResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(StageFailure::at(stage)),
        Err(_) => Err(StageFailure::new(
            stage,
            format!("{} timed out after {}s", what, limit.as_secs()),
        )),
    }
}

/// Collaborators the orchestrator calls through their traits.
#[derive(Clone)]
pub struct Collaborators {
    pub composer: Arc<dyn ScriptComposer>,
    pub synthesizer: Arc<dyn NarrationSynthesizer>,
    pub images: Arc<dyn ImageSource>,
    /// Publishing is skipped when `None`
    pub publisher: Option<Arc<dyn Publisher>>,
}

/// Runs productions end to end.
pub struct ProductionOrchestrator {
    config: Arc<NewscastConfig>,
    store: Store,
    backend: Arc<dyn RenderBackend>,
    renderer: SegmentRenderer,
    compositor: SegmentCompositor,
    collaborators: Collaborators,
}

impl ProductionOrchestrator {
    pub fn new(
        config: Arc<NewscastConfig>,
        store: Store,
        backend: Arc<dyn RenderBackend>,
        collaborators: Collaborators,
    ) -> Self {
        let selector = match config.pipeline.effect_seed {
            Some(seed) => EffectSelector::seeded(seed),
            None => EffectSelector::Unseeded,
        };
        let renderer = SegmentRenderer::new(backend.clone(), config.encoding.clone(), selector);
        let compositor = SegmentCompositor::new(backend.clone(), config.encoding.clone())
            .with_probe_timeout(config.pipeline.render_timeout);
        Self {
            config,
            store,
            backend,
            renderer,
            compositor,
            collaborators,
        }
    }

    /// Orchestrator with the shipped collaborators: ffmpeg, the TTS command,
    /// HTTP image downloads, and the HTTP publisher when an endpoint is set.
    pub fn from_config(config: Arc<NewscastConfig>, store: Store) -> PipelineResult<Self> {
        let backend = FfmpegBackend::new(config.pipeline.render_timeout.as_secs())
            .with_font(config.assets.font_file.clone());

        let user_agent = concat!("newscast/", env!("CARGO_PKG_VERSION"));
        let image_client = reqwest::Client::builder()
            .timeout(config.supplier.request_timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| PipelineError::config(format!("HTTP client: {}", e)))?;
        // Uploads are bounded by the stage timeout instead of a client timeout.
        let upload_client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| PipelineError::config(format!("HTTP client: {}", e)))?;

        let publisher = HttpPublisher::from_config(&config.publisher, upload_client)
            .map(|p| Arc::new(p) as Arc<dyn Publisher>);
        if publisher.is_none() {
            tracing::info!("No publish endpoint configured, publishing disabled");
        }

        let mut images = HttpImageFetcher::new(image_client);
        let stock_keys = [
            (StockProvider::Pexels, &config.supplier.pexels_api_key),
            (StockProvider::Unsplash, &config.supplier.unsplash_api_key),
        ];
        for (provider, key) in stock_keys {
            if let Some(key) = key {
                images = images.with_stock_search(StockImageSearch::new(provider, key.clone()));
            }
        }

        let collaborators = Collaborators {
            composer: Arc::new(TemplateComposer::new(config.audio.chars_per_second)),
            synthesizer: Arc::new(CommandSynthesizer::new(
                config.audio.tts_command.clone(),
                config.audio.voice.clone(),
                config.audio.speech_rate,
            )),
            images: Arc::new(images),
            publisher,
        };
        Ok(Self::new(config, store, Arc::new(backend), collaborators))
    }

    pub fn config(&self) -> &NewscastConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn has_publisher(&self) -> bool {
        self.collaborators.publisher.is_some()
    }

    /// Run one production. Never returns an error: every outcome is in the
    /// report and, once a row exists, on the production record.
    pub async fn run(&self, options: RunOptions) -> RunReport {
        let logger = RunLogger::new("create_video");
        let span = logger.create_span();
        self.run_logged(options, logger).instrument(span).await
    }

    async fn run_logged(&self, options: RunOptions, logger: RunLogger) -> RunReport {
        let mut report = RunReport::default();
        logger.log_start("selecting articles");

        // Selection
        let started = Instant::now();
        let articles = match self
            .store
            .articles()
            .claim_for_production(self.config.pipeline.items_per_video)
            .await
        {
            Ok(articles) if !articles.is_empty() => articles,
            Ok(_) => return self.abort_without_row(report, &logger, "no unselected articles"),
            Err(e) => return self.abort_without_row(report, &logger, &e.to_string()),
        };

        let title = render_title(
            &self.config.pipeline.title_template,
            Utc::now(),
            &self.config.pipeline.date_format,
        );
        let mut production = match self.open_production(&title, &articles).await {
            Ok(production) => production,
            Err(e) => return self.abort_without_row(report, &logger, &e.to_string()),
        };
        let logger = logger.with_production(production.id);
        report.production_id = Some(production.id);
        report.status = production.status;
        report.record(Stage::Selection, true, format!("{} articles", articles.len()));
        metrics::record_stage_duration(Stage::Selection, started.elapsed().as_secs_f64());
        logger.log_stage(Stage::Selection, &format!("claimed {} articles", articles.len()));

        if let Err(failure) = self.produce(&mut production, &articles, &mut report, &logger).await {
            return self.finish_failed(production, failure, report, &logger).await;
        }
        report.status = production.status;
        logger.log_completion(&format!(
            "video {} ({:.1}s)",
            production.video_path.as_deref().map(|p| p.display().to_string()).unwrap_or_default(),
            production.duration_secs.unwrap_or_default()
        ));

        // Publish
        if options.publish {
            if let Some(publisher) = self.collaborators.publisher.as_deref() {
                match self.publish_production(publisher, &mut production, &articles).await {
                    Ok(result) => {
                        report.record(Stage::Publish, true, result.url.clone());
                        logger.log_stage(Stage::Publish, &format!("published as {}", result.url));
                        report.publish = Some(result);
                    }
                    Err(e) => {
                        metrics::record_publish_failure();
                        logger.log_warning(Stage::Publish, &e.to_string());
                        report.record(Stage::Publish, false, e.to_string());
                        report.publish_error = Some(e.to_string());
                    }
                }
            }
        }

        report.status = production.status;
        metrics::record_production(report.status, None);
        report
    }

    /// Stages two to seven. Updates `production` and persists after each.
    async fn produce(
        &self,
        production: &mut Production,
        articles: &[Article],
        report: &mut RunReport,
        logger: &RunLogger,
    ) -> StageResult<()> {
        let tag = format!("production_{}", production.id);
        let paths = &self.config.paths;

        // Planning
        let started = Instant::now();
        let plan = self.plan(articles).await?;
        production.narration = Some(serde_json::to_string(&plan).map_err(StageFailure::at(Stage::Planning))?);
        self.save(production, Stage::Planning).await?;
        report.record(Stage::Planning, true, format!("{} segments", plan.segments.len()));
        metrics::record_stage_duration(Stage::Planning, started.elapsed().as_secs_f64());
        logger.log_stage(Stage::Planning, &format!("{} segments", plan.segments.len()));

        // Synthesis
        let started = Instant::now();
        let audio_dir = paths.audio_dir().join(&tag);
        let segments = self.synthesize(&plan, &audio_dir).await?;
        let track = assemble_narration(
            self.backend.as_ref(),
            &segments,
            self.config.audio.segment_gap_secs,
            &self.config.encoding,
            &audio_dir.join("narration.m4a"),
        )
        .await
        .map_err(StageFailure::at(Stage::Synthesis))?;
        production.audio_path = Some(track.path.clone());
        self.save(production, Stage::Synthesis).await?;
        report.audio_path = Some(track.path.clone());
        report.record(Stage::Synthesis, true, format!("{:.1}s narration", track.duration_secs));
        metrics::record_stage_duration(Stage::Synthesis, started.elapsed().as_secs_f64());
        logger.log_stage(Stage::Synthesis, &format!("{:.1}s narration", track.duration_secs));

        // Rendering
        let started = Instant::now();
        let clips = self.render_items(&plan, &segments, articles, &tag, report, logger).await?;
        report.record(
            Stage::Rendering,
            true,
            format!("{} clips, {} dropped", clips.len(), report.dropped_items.len()),
        );
        metrics::record_stage_duration(Stage::Rendering, started.elapsed().as_secs_f64());
        logger.log_stage(Stage::Rendering, &format!("{} clips", clips.len()));

        // Composition
        let started = Instant::now();
        let (video_path, duration) = self.compose(clips, &track.path, track.duration_secs, &tag).await?;
        report.record(Stage::Composition, true, video_path.display().to_string());
        metrics::record_stage_duration(Stage::Composition, started.elapsed().as_secs_f64());
        logger.log_stage(Stage::Composition, &format!("{:.1}s video", duration));

        // Thumbnail
        let thumb_path = paths.thumbnails_dir().join(format!("{}.jpg", tag));
        let limit = self.config.pipeline.render_timeout;
        let thumbnail = tokio::time::timeout(
            limit,
            generate_thumbnail(self.backend.as_ref(), &video_path, &production.title, &thumb_path),
        )
        .await
        .unwrap_or(Err(MediaError::Timeout(limit.as_secs())));
        match thumbnail {
            Ok(path) => {
                report.record(Stage::Thumbnail, true, path.display().to_string());
                report.thumbnail_path = Some(path.clone());
                production.thumbnail_path = Some(path);
            }
            Err(e) => {
                logger.log_warning(Stage::Thumbnail, &e.to_string());
                report.record(Stage::Thumbnail, false, e.to_string());
            }
        }

        // Completed is adopted only once it is stored
        let mut completed = production.clone();
        completed
            .complete(video_path.clone(), duration)
            .map_err(StageFailure::at(Stage::Composition))?;
        self.save(&completed, Stage::Composition).await?;
        *production = completed;
        report.video_path = Some(video_path);
        report.duration_secs = Some(duration);
        Ok(())
    }

    async fn plan(&self, articles: &[Article]) -> StageResult<NarrationPlan> {
        let plan = bounded(
            Stage::Planning,
            self.config.pipeline.stage_timeout,
            "script composer",
            self.collaborators.composer.compose(articles),
        )
        .await?;
        plan.validate().map_err(StageFailure::at(Stage::Planning))?;
        if plan.item_count() > articles.len() {
            return Err(StageFailure::new(
                Stage::Planning,
                format!("plan has {} items for {} articles", plan.item_count(), articles.len()),
            ));
        }
        Ok(plan)
    }

    async fn synthesize(&self, plan: &NarrationPlan, audio_dir: &Path) -> StageResult<Vec<AudioSegment>> {
        let mut segments = Vec::with_capacity(plan.segments.len());
        for segment in &plan.segments {
            let output = audio_dir.join(format!("{}.mp3", segment.label()));
            let path = bounded(
                Stage::Synthesis,
                self.config.pipeline.synth_timeout,
                &format!("synthesis of {}", segment.label()),
                self.collaborators.synthesizer.synthesize(&segment.text, &output),
            )
            .await?;
            let duration_secs = self.measure_duration(&path, &segment.text).await;
            segments.push(AudioSegment {
                kind: segment.kind,
                item_index: segment.item_index,
                file_path: path,
                duration_secs,
            });
        }
        Ok(segments)
    }

    /// Backend probe bounded by the per-call render timeout.
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        probe_within(self.backend.as_ref(), path, self.config.pipeline.render_timeout).await
    }

    /// Probed duration, or a reading-speed estimate when probing fails.
    async fn measure_duration(&self, path: &Path, text: &str) -> f64 {
        match self.probe(path).await {
            Ok(info) if info.duration > 0.0 => info.duration,
            Ok(_) => {
                warn!(path = %path.display(), "Probe reported no duration, estimating");
                estimate_duration(text, self.config.audio.chars_per_second)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Probe failed, estimating duration");
                estimate_duration(text, self.config.audio.chars_per_second)
            }
        }
    }

    async fn render_items(
        &self,
        plan: &NarrationPlan,
        segments: &[AudioSegment],
        articles: &[Article],
        tag: &str,
        report: &mut RunReport,
        logger: &RunLogger,
    ) -> StageResult<Vec<PathBuf>> {
        let policy = self.config.pipeline.visual_fallback;
        let images_dir = self.config.paths.images_dir().join(tag);
        let clips_dir = self.config.paths.work_dir().join(tag).join("clips");
        let mut clips = Vec::new();

        for audio in segments.iter().filter(|s| s.kind == SegmentKind::Item) {
            let Some(index) = audio.item_index else { continue };
            let Some(article) = articles.get(index) else { continue };
            let title = plan
                .items()
                .find(|s| s.item_index == Some(index))
                .and_then(|s| s.title.clone())
                .unwrap_or_else(|| article.title.clone());

            let image = match self.collaborators.images.fetch(article, &images_dir).await {
                Ok(path) => Some(path),
                Err(e) => {
                    logger.log_warning(Stage::Rendering, &format!("item {}: image unavailable: {}", index + 1, e));
                    if policy == VisualFallback::AbortRun {
                        return Err(StageFailure::new(
                            Stage::Rendering,
                            format!("item {} has no image: {}", index + 1, e),
                        ));
                    }
                    None
                }
            };

            let request = SegmentRequest {
                item_index: index,
                image,
                title,
                effect: None,
                duration_secs: audio.duration_secs,
                output: clips_dir.join(format!("item_{:02}.mp4", index + 1)),
            };

            let rendered = match self.renderer.render(request.clone()).await {
                Ok(segment) => Some(segment),
                Err(e) if policy == VisualFallback::AbortRun => {
                    return Err(StageFailure::new(Stage::Rendering, format!("item {}: {}", index + 1, e)));
                }
                Err(e) => {
                    logger.log_warning(
                        Stage::Rendering,
                        &format!("item {} failed, retrying from placeholder: {}", index + 1, e),
                    );
                    let retry = SegmentRequest { image: None, ..request };
                    match self.renderer.render(retry).await {
                        Ok(segment) => Some(segment),
                        Err(e) => {
                            logger.log_warning(Stage::Rendering, &format!("item {} dropped: {}", index + 1, e));
                            None
                        }
                    }
                }
            };

            match rendered {
                Some(segment) => {
                    metrics::record_segment(segment.used_placeholder);
                    if segment.used_placeholder {
                        report.placeholder_items.push(index);
                    }
                    clips.push(segment.output_clip);
                }
                None => {
                    metrics::record_segment_dropped();
                    report.dropped_items.push(index);
                }
            }
        }

        if clips.is_empty() {
            return Err(StageFailure::new(Stage::Rendering, "no item clips rendered"));
        }
        Ok(clips)
    }

    /// Compose and move the result into the videos directory. Returns the
    /// final path and its probed duration.
    async fn compose(
        &self,
        clips: Vec<PathBuf>,
        narration: &Path,
        narration_secs: f64,
        tag: &str,
    ) -> StageResult<(PathBuf, f64)> {
        let assets = &self.config.assets;
        let sequence = ClipSequence::new(clips)
            .with_intro(AssetsConfig::existing(&assets.intro_video).map(Path::to_path_buf))
            .with_outro(AssetsConfig::existing(&assets.outro_video).map(Path::to_path_buf));
        let music = AssetsConfig::existing(&assets.background_music)
            .map(|p| MusicBed::new(p).with_volume(self.config.audio.music_volume));
        let watermark = AssetsConfig::existing(&assets.logo).map(|p| {
            WatermarkConfig::new(p)
                .with_corner(assets.watermark_corner)
                .with_margin(assets.watermark_margin)
        });

        let request = CompositionRequest {
            sequence,
            narration: narration.to_path_buf(),
            music,
            watermark,
            work_dir: self.config.paths.work_dir().join(tag),
            tag: tag.to_string(),
        };
        let composition = self
            .compositor
            .compose(&request)
            .await
            .map_err(StageFailure::at(Stage::Composition))?;

        let final_path = self.config.paths.videos_dir().join(format!("{}.mp4", tag));
        move_file(&composition.output, &final_path)
            .await
            .map_err(StageFailure::at(Stage::Composition))?;

        let duration = match self.probe(&final_path).await {
            Ok(info) if info.duration > 0.0 => info.duration,
            _ => {
                warn!(path = %final_path.display(), "Could not probe final video, using narration length");
                narration_secs
            }
        };
        Ok((final_path, duration))
    }

    async fn open_production(&self, title: &str, articles: &[Article]) -> PipelineResult<Production> {
        let ids: Vec<_> = articles.iter().map(|a| a.id).collect();
        let mut production = self.store.productions().create(title, &ids).await?;
        self.store.articles().attach_to_production(&ids, production.id).await?;
        production.start_processing()?;
        self.store.productions().save(&production).await?;
        Ok(production)
    }

    async fn save(&self, production: &Production, stage: Stage) -> StageResult<()> {
        self.store
            .productions()
            .save(production)
            .await
            .map_err(StageFailure::at(stage))
    }

    fn abort_without_row(&self, mut report: RunReport, logger: &RunLogger, message: &str) -> RunReport {
        logger.log_error(Stage::Selection, message);
        report.status = ProductionStatus::Failed;
        report.failed_stage = Some(Stage::Selection);
        report.failure_message = Some(message.to_string());
        report.record(Stage::Selection, false, message);
        metrics::record_production(ProductionStatus::Failed, Some(Stage::Selection));
        report
    }

    async fn finish_failed(
        &self,
        mut production: Production,
        failure: StageFailure,
        mut report: RunReport,
        logger: &RunLogger,
    ) -> RunReport {
        logger.log_error(failure.stage, &failure.message);
        if let Err(e) = production.fail(failure.stage, &failure.message) {
            warn!(error = %e, "Production could not be marked failed");
        }
        if let Err(e) = self.store.productions().save(&production).await {
            warn!(error = %e, "Failed production could not be saved");
        }

        report.status = production.status;
        report.failed_stage = Some(failure.stage);
        report.failure_message = Some(failure.message.clone());
        report.record(failure.stage, false, failure.message);
        metrics::record_production(report.status, Some(failure.stage));
        report
    }

    async fn publish_production(
        &self,
        publisher: &dyn Publisher,
        production: &mut Production,
        articles: &[Article],
    ) -> PipelineResult<PublishResult> {
        let video_path = production
            .video_path
            .clone()
            .ok_or_else(|| PipelineError::publish(format!("production {} has no video", production.id)))?;
        let publisher_config = &self.config.publisher;
        let request = PublishRequest {
            video_path,
            thumbnail_path: production.thumbnail_path.clone(),
            title: production.title.clone(),
            description: render_description(
                &publisher_config.description_template,
                Utc::now(),
                &self.config.pipeline.date_format,
                articles,
            ),
            tags: publisher_config.tags.clone(),
            category: Some(publisher_config.category.clone()),
            privacy: publisher_config.privacy.clone(),
        };

        let limit = self.config.pipeline.stage_timeout;
        let result = match tokio::time::timeout(limit, publisher.publish(&request)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(PipelineError::publish(format!(
                    "publisher timed out after {}s",
                    limit.as_secs()
                )))
            }
        };
        production.mark_uploaded(&result)?;
        self.store.productions().save(production).await?;
        Ok(result)
    }

    /// Publish a completed production outside a run.
    pub async fn publish_existing(&self, id: ProductionId) -> PipelineResult<PublishResult> {
        let publisher = self
            .collaborators
            .publisher
            .as_deref()
            .ok_or_else(|| PipelineError::config("publishing is not configured"))?;
        let mut production = self.store.productions().require(id).await?;
        if production.status != ProductionStatus::Completed {
            return Err(ModelError::InvalidTransition {
                from: production.status,
                to: ProductionStatus::Uploaded,
            }
            .into());
        }
        let articles = self.store.articles().get_many(&production.article_ids).await?;
        let result = self.publish_production(publisher, &mut production, &articles).await;
        match &result {
            Ok(published) => tracing::info!(production_id = %id, url = %published.url, "Production published"),
            Err(e) => {
                metrics::record_publish_failure();
                warn!(production_id = %id, error = %e, "Publishing failed");
            }
        }
        result
    }

    /// Poll the publisher for engagement counters and store them.
    pub async fn refresh_metrics(&self, id: ProductionId) -> PipelineResult<EngagementMetrics> {
        let publisher = self
            .collaborators
            .publisher
            .as_deref()
            .ok_or_else(|| PipelineError::config("publishing is not configured"))?;
        let production = self.store.productions().require(id).await?;
        let external_id = production
            .external_id
            .as_deref()
            .ok_or_else(|| PipelineError::publish(format!("production {} was never published", id)))?;

        let metrics = publisher.fetch_metrics(external_id).await?;
        self.store.productions().update_metrics(id, &metrics).await?;
        Ok(metrics)
    }
}
