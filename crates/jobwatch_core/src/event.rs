//! Inputs to the reducer: decoded stream events, polled snapshots and the
//! final page listing.
use std::fmt;

/// Name of the log event emitted when one page finished generating.
pub const PAGE_DONE: &str = "page_done";

/// Opaque identifier the remote service assigns to a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job status as reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RemoteStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RemoteStatus::Completed | RemoteStatus::Failed)
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RemoteStatus::Pending => "pending",
            RemoteStatus::Running => "running",
            RemoteStatus::Completed => "completed",
            RemoteStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Token counters as reported by one message. Any of them may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TokenReport {
    pub input: Option<u64>,
    pub output: Option<u64>,
    pub cost_usd: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Log(LogEvent),
    Status(StatusEvent),
    Done(DoneEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Generator event name, e.g. [`PAGE_DONE`]. Raw text lines use `"message"`.
    pub name: String,
    pub payload: LogPayload,
}

impl LogEvent {
    pub fn page_done(title: impl Into<String>) -> Self {
        Self {
            name: PAGE_DONE.to_string(),
            payload: LogPayload {
                title: Some(title.into()),
                ..LogPayload::default()
            },
        }
    }

    pub fn is_page_done(&self) -> bool {
        self.name == PAGE_DONE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogPayload {
    pub title: Option<String>,
    pub done: Option<u32>,
    pub total: Option<u32>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    pub status: RemoteStatus,
    pub progress: Option<u32>,
    pub pages_done: Option<u32>,
    pub current_page: Option<String>,
    pub tokens: TokenReport,
}

impl StatusEvent {
    pub fn new(status: RemoteStatus) -> Self {
        Self {
            status,
            progress: None,
            pages_done: None,
            current_page: None,
            tokens: TokenReport::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoneEvent {
    /// Anything other than [`RemoteStatus::Completed`] finishes the job as failed.
    pub status: RemoteStatus,
    pub tokens: TokenReport,
    pub duration_seconds: Option<f64>,
    pub error: Option<String>,
}

impl DoneEvent {
    pub fn new(status: RemoteStatus) -> Self {
        Self {
            status,
            tokens: TokenReport::default(),
            duration_seconds: None,
            error: None,
        }
    }
}

/// One-shot status read from the polling fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub status: RemoteStatus,
    pub progress: Option<u32>,
    pub pages_done: Option<u32>,
    pub pages_total: Option<u32>,
    pub current_page: Option<String>,
    pub tokens: TokenReport,
    pub duration_seconds: Option<f64>,
    pub error: Option<String>,
}

impl StatusSnapshot {
    pub fn new(status: RemoteStatus) -> Self {
        Self {
            status,
            progress: None,
            pages_done: None,
            pages_total: None,
            current_page: None,
            tokens: TokenReport::default(),
            duration_seconds: None,
            error: None,
        }
    }
}

/// One generated page from the final listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageSummary {
    pub filename: String,
    pub path: String,
    pub title: String,
    pub slug: String,
    pub layout: String,
    pub content: String,
}
