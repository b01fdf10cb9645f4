//! Optional RON settings file.
//!
//! Every field may be omitted; omitted fields keep the library defaults.
//! Durations are given in milliseconds:
//!
//! ```ron
//! (
//!     base_url: Some("https://sites.example.com/api/"),
//!     poll_interval_ms: Some(1500),
//! )
//! ```
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use jobwatch_core::PageSet;
use jobwatch_engine::TrackerSettings;
use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub base_url: Option<String>,
    pub create_path: Option<String>,
    pub page_set: Option<String>,
    pub connect_timeout_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
    pub stream_idle_timeout_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub max_poll_failures: Option<u32>,
}

impl AppConfig {
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        ron::from_str(text).context("invalid settings file")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("could not read settings from {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn page_set(&self) -> anyhow::Result<Option<PageSet>> {
        self.page_set
            .as_deref()
            .map(str::parse::<PageSet>)
            .transpose()
            .context("invalid page_set in settings file")
    }

    /// Library defaults with this file's values applied on top.
    pub fn tracker_settings(&self) -> TrackerSettings {
        let mut settings = TrackerSettings::default();
        let client = &mut settings.client;
        if let Some(base_url) = &self.base_url {
            client.base_url = base_url.clone();
        }
        if let Some(create_path) = &self.create_path {
            client.create_path = create_path.clone();
        }
        if let Some(ms) = self.connect_timeout_ms {
            client.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.request_timeout_ms {
            client.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.stream_idle_timeout_ms {
            client.stream_idle_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.poll_interval_ms {
            settings.polling.interval = Duration::from_millis(ms);
        }
        if let Some(max) = self.max_poll_failures {
            settings.polling.max_consecutive_failures = max;
        }
        settings
    }
}
