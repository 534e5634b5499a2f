//! Command line interface.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "newscast", version, about = "Automated narrated news video production")]
pub struct Cli {
    /// Data directory for the database and media (overrides NEWSCAST_DATA_DIR)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Create the database schema
    InitDb,
    /// Fetch news from the configured feeds into the store
    CrawlNews {
        /// Items to take from each feed
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Produce one video now
    CreateVideo {
        /// Keep the video local even when publishing is configured
        #[arg(long)]
        no_upload: bool,
    },
    /// Run the daily scheduler until interrupted
    RunScheduler,
    /// Serve the dashboard, with the scheduler running alongside
    WebDashboard {
        #[arg(long, env = "DASHBOARD_ADDR", default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_video() {
        let cli = Cli::try_parse_from(["newscast", "create-video", "--no-upload"]).unwrap();
        assert_eq!(cli.command, Command::CreateVideo { no_upload: true });

        let cli = Cli::try_parse_from(["newscast", "--data-dir", "/tmp/nc", "create-video"]).unwrap();
        assert_eq!(cli.command, Command::CreateVideo { no_upload: false });
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/nc")));
    }

    #[test]
    fn test_parse_other_commands() {
        assert_eq!(Cli::try_parse_from(["newscast", "init-db"]).unwrap().command, Command::InitDb);
        assert_eq!(
            Cli::try_parse_from(["newscast", "crawl-news", "--limit", "5"]).unwrap().command,
            Command::CrawlNews { limit: Some(5) }
        );
        let cli = Cli::try_parse_from(["newscast", "web-dashboard", "--addr", "0.0.0.0:9000"]).unwrap();
        assert_eq!(
            cli.command,
            Command::WebDashboard {
                addr: "0.0.0.0:9000".parse().unwrap()
            }
        );
        assert!(Cli::try_parse_from(["newscast", "render-everything"]).is_err());
    }
}
