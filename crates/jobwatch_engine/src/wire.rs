//! JSON shapes exchanged with the job service and their mapping onto core types.
use jobwatch_core::{
    DoneEvent, JobHandle, JobRequest, LogEvent, LogPayload, PageSummary, RemoteStatus,
    StatusEvent, StatusSnapshot, StreamEvent, TokenReport,
};
use serde::{Deserialize, Serialize};

use crate::client::CreatedJob;
use crate::ProtocolError;

/// Log event name used for raw text lines the generator printed.
pub(crate) const RAW_MESSAGE_EVENT: &str = "message";

#[derive(Debug, Serialize)]
pub(crate) struct WireCreateRequest<'a> {
    company: &'a str,
    page_set: &'a str,
}

impl<'a> From<&'a JobRequest> for WireCreateRequest<'a> {
    fn from(request: &'a JobRequest) -> Self {
        Self {
            company: request.company(),
            page_set: request.page_set().as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum WireStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl From<WireStatus> for RemoteStatus {
    fn from(status: WireStatus) -> Self {
        match status {
            WireStatus::Pending => RemoteStatus::Pending,
            WireStatus::Running => RemoteStatus::Running,
            WireStatus::Completed => RemoteStatus::Completed,
            WireStatus::Failed => RemoteStatus::Failed,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireMessage {
    Log(WireLog),
    Status(WireStatusEvent),
    Done(WireDone),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireLog {
    event: Option<WireLogEvent>,
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireLogEvent {
    event: Option<String>,
    title: Option<String>,
    done: Option<u32>,
    total: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireStatusEvent {
    status: WireStatus,
    #[serde(default)]
    progress: Option<u32>,
    #[serde(default)]
    pages_done: Option<u32>,
    #[serde(default)]
    current_page: Option<String>,
    #[serde(flatten)]
    tokens: WireTokens,
}

#[derive(Debug, Deserialize)]
struct WireDone {
    status: WireStatus,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    duration_sec: Option<f64>,
    #[serde(flatten)]
    tokens: WireTokens,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireTokens {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
    cost_usd: Option<f64>,
}

impl From<WireTokens> for TokenReport {
    fn from(tokens: WireTokens) -> Self {
        TokenReport {
            input: tokens.input_tokens,
            output: tokens.output_tokens,
            cost_usd: tokens.cost_usd,
        }
    }
}

/// Body of `GET /jobs/{id}` and of the create response.
#[derive(Debug, Deserialize)]
pub(crate) struct WireJob {
    #[serde(default)]
    job_id: Option<String>,
    status: WireStatus,
    #[serde(default)]
    progress: Option<u32>,
    #[serde(default)]
    current_page: Option<String>,
    #[serde(default)]
    pages_done: Option<u32>,
    #[serde(default)]
    pages_total: Option<u32>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    duration_sec: Option<f64>,
    #[serde(flatten)]
    tokens: WireTokens,
}

impl WireJob {
    pub(crate) fn into_created(self) -> Option<CreatedJob> {
        let job_id = self.job_id.filter(|id| !id.trim().is_empty())?;
        Some(CreatedJob {
            handle: JobHandle::new(job_id),
            pages_total: self.pages_total.filter(|total| *total > 0),
        })
    }

    pub(crate) fn into_snapshot(self) -> StatusSnapshot {
        StatusSnapshot {
            status: self.status.into(),
            progress: self.progress,
            pages_done: self.pages_done,
            pages_total: self.pages_total,
            current_page: self.current_page,
            tokens: self.tokens.into(),
            duration_seconds: self.duration_sec,
            error: self.error,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WirePages {
    pages: Vec<WirePage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WirePage {
    filename: Option<String>,
    path: Option<String>,
    title: Option<String>,
    slug: Option<String>,
    layout: Option<String>,
    content: Option<String>,
}

impl WirePages {
    pub(crate) fn into_pages(self) -> Vec<PageSummary> {
        self.pages
            .into_iter()
            .map(|page| PageSummary {
                filename: page.filename.unwrap_or_default(),
                path: page.path.unwrap_or_default(),
                title: page.title.unwrap_or_default(),
                slug: page.slug.unwrap_or_default(),
                layout: page.layout.unwrap_or_default(),
                content: page.content.unwrap_or_default(),
            })
            .collect()
    }
}

/// Decode one JSON stream message (`{"type": "log" | "status" | "done", ...}`).
pub fn decode_message(json: &str) -> Result<StreamEvent, ProtocolError> {
    let message: WireMessage = serde_json::from_str(json)
        .map_err(|err| ProtocolError::InvalidMessage(err.to_string()))?;
    match message {
        WireMessage::Log(log) => decode_log(log).map(StreamEvent::Log),
        WireMessage::Status(status) => Ok(StreamEvent::Status(StatusEvent {
            status: status.status.into(),
            progress: status.progress,
            pages_done: status.pages_done,
            current_page: status.current_page,
            tokens: status.tokens.into(),
        })),
        WireMessage::Done(done) => Ok(StreamEvent::Done(DoneEvent {
            status: done.status.into(),
            tokens: done.tokens.into(),
            duration_seconds: done.duration_sec,
            error: done.error,
        })),
    }
}

fn decode_log(log: WireLog) -> Result<LogEvent, ProtocolError> {
    match (log.event, log.message) {
        (Some(event), message) => Ok(LogEvent {
            name: event.event.unwrap_or_default(),
            payload: LogPayload {
                title: event.title,
                done: event.done,
                total: event.total,
                message,
            },
        }),
        (None, Some(message)) => Ok(LogEvent {
            name: RAW_MESSAGE_EVENT.to_string(),
            payload: LogPayload {
                message: Some(message),
                ..LogPayload::default()
            },
        }),
        (None, None) => Err(ProtocolError::InvalidMessage(
            "log message without event or message".to_string(),
        )),
    }
}
