mod cli;
mod config;
mod render;

use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use jobwatch_core::{JobRequest, JobStatus, JobView};
use jobwatch_engine::{JobTracker, TrackerError};
use jobwatch_logging::{watch_info, watch_warn};
use tokio::sync::mpsc;

use crate::cli::Cli;
use crate::config::AppConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    jobwatch_logging::initialize(cli.log.into(), cli.log_level);

    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    let mut settings = config.tracker_settings();
    if let Some(base_url) = &cli.base_url {
        settings.client.base_url = base_url.clone();
    }
    if let Some(create_path) = &cli.create_path {
        settings.client.create_path = create_path.clone();
    }
    if let Some(ms) = cli.poll_interval_ms {
        settings.polling.interval = Duration::from_millis(ms);
    }
    let page_set = match cli.page_set {
        Some(page_set) => page_set,
        None => config.page_set()?.unwrap_or_default(),
    };
    let request = JobRequest::new(cli.company.as_str()).with_page_set(page_set);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("could not start the async runtime")?;
    runtime.block_on(async {
        let tracker = JobTracker::connect(settings).context("invalid job service settings")?;
        watch(&tracker, request).await
    })
}

async fn watch(tracker: &JobTracker, request: JobRequest) -> anyhow::Result<()> {
    let (views, mut updates) = mpsc::unbounded_channel::<JobView>();
    let subscription = tracker.subscribe(move |view| {
        let _ = views.send(view.clone());
    });

    println!(
        "Generating a {} site for {}",
        request.page_set(),
        request.company()
    );
    match tracker.start(request).await {
        Ok(handle) => println!("Job {handle} accepted"),
        // The view carries the failure and is reported below.
        Err(TrackerError::Transport(err)) => watch_warn!("Job creation failed: {}", err),
        Err(err) => return Err(err.into()),
    }

    let mut last_line = String::new();
    let outcome = loop {
        let view = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                watch_info!("Interrupted; disposing the tracker");
                tracker.dispose();
                println!();
                println!("Cancelled.");
                break None;
            }
            view = updates.recv() => view,
        };
        let view = view.unwrap_or_else(|| tracker.view());

        let line = render::progress_line(&view);
        if line != last_line {
            println!("{line}");
            last_line = line;
        }

        match view.status {
            // The listing request is bounded by the client's request timeout.
            JobStatus::Completed if view.pages_settled => break Some(view),
            JobStatus::Failed => break Some(view),
            _ => {}
        }
    };
    subscription.unsubscribe();

    let Some(view) = outcome else {
        return Ok(());
    };
    println!();
    for line in render::summary(&view) {
        println!("{line}");
    }
    if view.status == JobStatus::Failed {
        bail!(
            "job failed: {}",
            view.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
