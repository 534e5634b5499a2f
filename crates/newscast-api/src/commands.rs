//! Command implementations.
//!
//! Each command returns the process exit code; errors that escape are
//! reported by the binary and exit 1.

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use newscast_store::Store;
use newscast_worker::{
    crawl, feed_suppliers, jobs, NewscastConfig, ProductionOrchestrator, RunOptions, RunReport, ScheduleRunner,
};

use crate::routes::create_router;
use crate::state::AppState;

/// Open the configured database and make sure the schema exists.
pub async fn open_store(config: &NewscastConfig) -> anyhow::Result<Store> {
    let store = Store::open(&config.paths.database)
        .with_context(|| format!("opening database {}", config.paths.database.display()))?;
    store.init_schema().await.context("creating schema")?;
    Ok(store)
}

async fn orchestrator(config: &Arc<NewscastConfig>) -> anyhow::Result<Arc<ProductionOrchestrator>> {
    let store = open_store(config).await?;
    let orchestrator = ProductionOrchestrator::from_config(config.clone(), store)?;
    Ok(Arc::new(orchestrator))
}

/// Scheduler with the daily production job registered when enabled.
fn scheduler(config: &NewscastConfig, orchestrator: Arc<ProductionOrchestrator>) -> ScheduleRunner {
    let runner = ScheduleRunner::from_config(&config.scheduler);
    if config.scheduler.enabled {
        let next = jobs::schedule_daily_production(&runner, orchestrator, RunOptions::default());
        info!(job_id = jobs::DAILY_JOB_ID, next_run = ?next, "Daily production scheduled");
    } else {
        warn!("Daily production disabled");
    }
    runner
}

pub async fn init_db(config: &NewscastConfig) -> anyhow::Result<ExitCode> {
    open_store(config).await?;
    println!("Database ready at {}", config.paths.database.display());
    Ok(ExitCode::SUCCESS)
}

/// Crawl every feed. Failures are reported but never change the exit code.
pub async fn crawl_news(config: &NewscastConfig, limit: Option<usize>) -> ExitCode {
    let limit = limit.unwrap_or(config.supplier.limit_per_source);
    let result = async {
        let store = open_store(config).await?;
        if config.supplier.feed_urls.is_empty() {
            warn!("No feeds configured (NEWS_FEED_URLS)");
        }
        let suppliers = feed_suppliers(&config.supplier.feed_urls, config.supplier.request_timeout)?;
        let summary = crawl(&suppliers, &store, limit).await?;
        anyhow::Ok(summary)
    }
    .await;

    match result {
        Ok(summary) => {
            println!("Stored {} new articles ({} fetched)", summary.inserted, summary.fetched);
            for (source, failure) in &summary.failures {
                println!("  {} failed: {}", source, failure);
            }
        }
        Err(e) => {
            error!(error = %e, "Crawl failed");
            println!("Stored 0 new articles ({:#})", e);
        }
    }
    ExitCode::SUCCESS
}

/// Human-readable run summary.
pub fn describe_report(report: &RunReport) -> String {
    if let Some(label) = report.failure_label() {
        return format!(
            "Failed: {}: {}",
            label,
            report.failure_message.as_deref().unwrap_or("unknown error")
        );
    }

    let mut lines = vec![format!(
        "Production {} {}: {} ({:.1}s)",
        report.production_id.map(|id| id.to_string()).unwrap_or_default(),
        report.status,
        report.video_path.as_deref().map(|p| p.display().to_string()).unwrap_or_default(),
        report.duration_secs.unwrap_or_default()
    )];
    if !report.placeholder_items.is_empty() {
        lines.push(format!("  placeholder visuals for {} item(s)", report.placeholder_items.len()));
    }
    if !report.dropped_items.is_empty() {
        lines.push(format!("  dropped {} item(s)", report.dropped_items.len()));
    }
    if let Some(published) = &report.publish {
        lines.push(format!("  published: {}", published.url));
    }
    if let Some(err) = &report.publish_error {
        lines.push(format!("  not published: {}", err));
    }
    lines.join("\n")
}

/// Produce one video. Exit 0 when a video was produced, 1 otherwise.
pub async fn create_video(config: Arc<NewscastConfig>, no_upload: bool) -> anyhow::Result<ExitCode> {
    let orchestrator = orchestrator(&config).await?;
    let report = orchestrator.run(RunOptions { publish: !no_upload }).await;
    println!("{}", describe_report(&report));
    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
    }
    info!("Received shutdown signal");
}

pub async fn run_scheduler(config: Arc<NewscastConfig>) -> anyhow::Result<ExitCode> {
    let orchestrator = orchestrator(&config).await?;
    let runner = scheduler(&config, orchestrator);
    runner.start();
    println!("Scheduler running, press Ctrl-C to stop");

    wait_for_ctrl_c().await;
    let still_running = runner.stop().await;
    if still_running > 0 {
        warn!(still_running, "Jobs abandoned at shutdown");
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn web_dashboard(
    config: Arc<NewscastConfig>,
    addr: SocketAddr,
    metrics_handle: Option<PrometheusHandle>,
) -> anyhow::Result<ExitCode> {
    let orchestrator = orchestrator(&config).await?;
    let runner = scheduler(&config, orchestrator.clone());
    runner.start();

    let app = create_router(AppState::new(orchestrator, runner.clone()), metrics_handle);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Dashboard listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_ctrl_c())
        .await
        .context("serving dashboard")?;

    runner.stop().await;
    info!("Dashboard shutdown complete");
    Ok(ExitCode::SUCCESS)
}
