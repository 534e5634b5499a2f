//! `newscast` binary.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newscast_api::cli::{Cli, Command};
use newscast_api::{commands, metrics};
use newscast_worker::config::PathsConfig;
use newscast_worker::NewscastConfig;

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("newscast=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing();

    let mut config = NewscastConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config.paths = PathsConfig::under(dir);
    }
    info!(data_dir = %config.paths.data_dir.display(), "Starting newscast");

    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);
    let metrics_handle = if metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "Metrics disabled");
                None
            }
        }
    } else {
        None
    };

    let config = Arc::new(config);
    let result = match cli.command {
        Command::InitDb => commands::init_db(&config).await,
        Command::CrawlNews { limit } => Ok(commands::crawl_news(&config, limit).await),
        Command::CreateVideo { no_upload } => commands::create_video(config, no_upload).await,
        Command::RunScheduler => commands::run_scheduler(config).await,
        Command::WebDashboard { addr } => commands::web_dashboard(config, addr, metrics_handle).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
