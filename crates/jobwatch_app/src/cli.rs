use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use jobwatch_core::PageSet;
use jobwatch_logging::LogDestination;
use log::LevelFilter;

/// Start a site generation job and follow it until it finishes.
#[derive(Debug, Parser)]
#[command(name = "jobwatch", version)]
pub struct Cli {
    /// Company the site is generated for.
    pub company: String,

    /// Number of pages to generate: small, medium or full.
    #[arg(long)]
    pub page_set: Option<PageSet>,

    /// Root URL of the job service API.
    #[arg(long, env = "JOBWATCH_BASE_URL")]
    pub base_url: Option<String>,

    /// Create endpoint, relative to the base URL.
    #[arg(long)]
    pub create_path: Option<String>,

    /// RON settings file; command line flags take precedence.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Status polling interval used when the event stream drops.
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    #[arg(long, value_enum, default_value_t = LogTarget::File)]
    pub log: LogTarget,

    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    /// Write to ./jobwatch.log, replacing the previous run's log.
    File,
    Terminal,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::File => LogDestination::File,
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::Both => LogDestination::Both,
        }
    }
}
