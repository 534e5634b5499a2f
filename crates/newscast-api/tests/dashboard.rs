//! Dashboard routes against an in-memory store and the recording backend.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use tower::ServiceExt;

use newscast_api::{create_router, AppState};
use newscast_media::testing::RecordingBackend;
use newscast_media::RenderBackend;
use newscast_models::{Article, ArticleDraft, EngagementMetrics, PublishRequest, PublishResult};
use newscast_store::Store;
use newscast_worker::{
    jobs, Collaborators, ImageSource, NarrationSynthesizer, NewscastConfig, PipelineResult, ProductionOrchestrator,
    Publisher, RunOptions, ScheduleRunner, TemplateComposer, Trigger,
};

struct FakeSynth;

#[async_trait]
impl NarrationSynthesizer for FakeSynth {
    async fn synthesize(&self, _text: &str, output: &Path) -> PipelineResult<PathBuf> {
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(output, b"speech")?;
        Ok(output.to_path_buf())
    }
}

struct FakeImages;

#[async_trait]
impl ImageSource for FakeImages {
    async fn fetch(&self, article: &Article, dest_dir: &Path) -> PipelineResult<PathBuf> {
        std::fs::create_dir_all(dest_dir)?;
        let path = dest_dir.join(format!("article_{}.jpg", article.id));
        std::fs::write(&path, b"jpeg")?;
        Ok(path)
    }
}

struct FakePublisher;

#[async_trait]
impl Publisher for FakePublisher {
    async fn publish(&self, _request: &PublishRequest) -> PipelineResult<PublishResult> {
        Ok(PublishResult {
            external_id: "vid-9".to_string(),
            url: "https://video.example/vid-9".to_string(),
        })
    }

    async fn fetch_metrics(&self, _external_id: &str) -> PipelineResult<EngagementMetrics> {
        Ok(EngagementMetrics::default())
    }
}

struct TestApp {
    _dir: TempDir,
    store: Store,
    orchestrator: Arc<ProductionOrchestrator>,
    scheduler: ScheduleRunner,
}

impl TestApp {
    async fn new(articles: usize) -> Self {
        Self::build(articles, None).await
    }

    async fn with_publisher(articles: usize) -> Self {
        Self::build(articles, Some(Arc::new(FakePublisher))).await
    }

    async fn build(articles: usize, publisher: Option<Arc<dyn Publisher>>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_in_memory().unwrap();
        store.init_schema().await.unwrap();
        let drafts: Vec<_> = (0..articles)
            .map(|i| ArticleDraft::new("wire", format!("Story {}", i), format!("https://n.example/{}", i)))
            .collect();
        store.articles().insert_drafts(&drafts).await.unwrap();

        let mut config = NewscastConfig::with_data_dir(dir.path());
        config.pipeline.effect_seed = Some(3);
        let collaborators = Collaborators {
            composer: Arc::new(TemplateComposer::default()),
            synthesizer: Arc::new(FakeSynth),
            images: Arc::new(FakeImages),
            publisher,
        };
        let orchestrator = Arc::new(ProductionOrchestrator::new(
            Arc::new(config),
            store.clone(),
            Arc::new(RecordingBackend::new()) as Arc<dyn RenderBackend>,
            collaborators,
        ));
        let scheduler = ScheduleRunner::new(Duration::from_millis(10), Duration::from_secs(2));

        Self {
            _dir: dir,
            store,
            orchestrator,
            scheduler,
        }
    }

    fn router(&self) -> Router {
        create_router(AppState::new(self.orchestrator.clone(), self.scheduler.clone()), None)
    }

    async fn call(&self, method: &str, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    async fn call_json(&self, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }
}

#[tokio::test]
async fn test_health_reports_store_and_scheduler() {
    let app = TestApp::new(4).await;
    let (status, body) = app.call("GET", "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["unselected_articles"], 4);
    assert_eq!(body["scheduler_running"], false);
}

#[tokio::test]
async fn test_missing_production_is_404() {
    let app = TestApp::new(0).await;

    let (status, body) = app.call("GET", "/productions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Array(Vec::new()));

    let (status, body) = app.call("GET", "/productions/42").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_run_daily_job_produces_video() {
    let app = TestApp::new(5).await;
    jobs::schedule_daily_production(&app.scheduler, app.orchestrator.clone(), RunOptions { publish: false });

    let (status, body) = app.call("GET", "/jobs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], jobs::DAILY_JOB_ID);
    assert_eq!(body[0]["running"], false);

    let (status, body) = app.call("POST", "/jobs/daily_video_generation/run").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "started");

    for _ in 0..200 {
        if !app.scheduler.is_running(jobs::DAILY_JOB_ID) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!app.scheduler.is_running(jobs::DAILY_JOB_ID));

    let (status, body) = app.call("GET", "/productions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    let id = body[0]["id"].as_i64().unwrap();

    let (status, body) = app.call("GET", &format!("/productions/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(app.store.articles().count_unselected().await.unwrap(), 0);
}

#[tokio::test]
async fn test_running_job_conflicts() {
    let app = TestApp::new(0).await;
    let release = Arc::new(Notify::new());
    let gate = release.clone();
    app.scheduler.schedule("slow", Trigger::Every(Duration::from_secs(3600)), move || {
        let gate = gate.clone();
        async move {
            gate.notified().await;
            Ok(())
        }
    });

    let (status, _) = app.call("POST", "/jobs/slow/run").await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = app.call("POST", "/jobs/slow/run").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (_, body) = app.call("GET", "/jobs").await;
    assert_eq!(body[0]["running"], true);

    release.notify_one();
}

#[tokio::test]
async fn test_unknown_job_is_404() {
    let app = TestApp::new(0).await;
    let (status, body) = app.call("POST", "/jobs/nope/run").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_publish_without_publisher_is_unavailable() {
    let app = TestApp::new(0).await;
    let (status, body) = app.call("POST", "/productions/1/publish").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["detail"].as_str().unwrap().contains("publishing is not configured"));

    let (status, _) = app.call("POST", "/productions/1/metrics").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_schedule_upload_without_publisher_is_unavailable() {
    let app = TestApp::new(0).await;
    let (status, body) = app
        .call_json("POST", "/productions/1/schedule", serde_json::json!({}))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "unavailable");
    assert!(app.scheduler.list_jobs().is_empty());
}

#[tokio::test]
async fn test_schedule_upload_registers_one_off_job() {
    let app = TestApp::with_publisher(3).await;

    let (status, _) = app
        .call_json("POST", "/productions/7/schedule", serde_json::json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let report = app.orchestrator.run(RunOptions { publish: false }).await;
    let id = report.production_id.unwrap();
    let at = chrono::Utc::now() + chrono::Duration::hours(2);

    let (status, body) = app
        .call_json(
            "POST",
            &format!("/productions/{}/schedule", id),
            serde_json::json!({ "at": at.to_rfc3339() }),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["job_id"], jobs::upload_job_id(id));
    assert!(body["next_run"].is_string());

    let (_, jobs_body) = app.call("GET", "/jobs").await;
    assert_eq!(jobs_body[0]["id"], jobs::upload_job_id(id));
    assert_eq!(jobs_body[0]["running"], false);
}

#[tokio::test]
async fn test_schedule_upload_of_published_production_conflicts() {
    let app = TestApp::with_publisher(2).await;
    let report = app.orchestrator.run(RunOptions::default()).await;
    let id = report.production_id.unwrap();

    let (status, body) = app
        .call_json("POST", &format!("/productions/{}/schedule", id), serde_json::json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["detail"].as_str().unwrap().contains("uploaded"));
    assert!(app.scheduler.list_jobs().is_empty());
}
