#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use jobwatch_core::{JobHandle, JobRequest, PageSummary, StatusSnapshot};
use jobwatch_engine::{
    ApiError, CreatedJob, EventByteStream, JobApi, TransportError, TransportFailure,
};
use tokio::sync::Notify;

pub fn init_logging() {
    jobwatch_logging::initialize_for_tests();
}

pub fn network_error(message: &str) -> TransportError {
    TransportError::new(TransportFailure::Network, message)
}

pub fn page(title: &str, slug: &str) -> PageSummary {
    PageSummary {
        filename: format!("{slug}.md"),
        path: format!("content/{slug}.md"),
        title: title.to_string(),
        slug: slug.to_string(),
        layout: "page".to_string(),
        content: format!("# {title}"),
    }
}

/// How `open_events` answers.
pub enum EventScript {
    Fail(TransportError),
    /// Delivers the chunks, then ends the stream.
    Lines(Vec<String>),
    /// Delivers the chunks, then stays open without further data.
    LinesThenHold(Vec<String>),
    /// Delivers the chunks, then the transport breaks.
    LinesThenFail(Vec<String>, TransportError),
}

/// Blocks a fake call until the test releases it.
#[derive(Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

/// A `JobApi` that answers from a script and counts calls.
pub struct ScriptedApi {
    pub created: Mutex<Option<Result<CreatedJob, ApiError>>>,
    pub create_gate: Option<Gate>,
    pub events: Mutex<Option<EventScript>>,
    pub statuses: Mutex<VecDeque<Result<StatusSnapshot, TransportError>>>,
    pub pages: Mutex<Option<Result<Vec<PageSummary>, TransportError>>>,
    pub pages_gate: Option<Gate>,
    pub create_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub pages_calls: AtomicUsize,
    pub open_calls: AtomicUsize,
}

impl ScriptedApi {
    pub fn new(job_id: &str) -> Self {
        Self {
            created: Mutex::new(Some(Ok(CreatedJob {
                handle: JobHandle::new(job_id),
                pages_total: None,
            }))),
            create_gate: None,
            events: Mutex::new(None),
            statuses: Mutex::new(VecDeque::new()),
            pages: Mutex::new(Some(Ok(Vec::new()))),
            pages_gate: None,
            create_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            pages_calls: AtomicUsize::new(0),
            open_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_create(self, result: Result<CreatedJob, ApiError>) -> Self {
        *self.created.lock().unwrap() = Some(result);
        self
    }

    pub fn with_create_gate(mut self) -> Self {
        self.create_gate = Some(Gate::default());
        self
    }

    pub fn with_events(self, script: EventScript) -> Self {
        *self.events.lock().unwrap() = Some(script);
        self
    }

    pub fn with_statuses(
        self,
        statuses: impl IntoIterator<Item = Result<StatusSnapshot, TransportError>>,
    ) -> Self {
        self.statuses.lock().unwrap().extend(statuses);
        self
    }

    pub fn with_pages(self, result: Result<Vec<PageSummary>, TransportError>) -> Self {
        *self.pages.lock().unwrap() = Some(result);
        self
    }

    pub fn with_pages_gate(mut self) -> Self {
        self.pages_gate = Some(Gate::default());
        self
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl JobApi for ScriptedApi {
    async fn create_job(&self, request: &JobRequest) -> Result<CreatedJob, ApiError> {
        request.validate()?;
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.create_gate {
            gate.pass().await;
        }
        self.created
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(ApiError::Transport(network_error("create already used"))))
    }

    async fn fetch_status(&self, _handle: &JobHandle) -> Result<StatusSnapshot, TransportError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(network_error("connection refused")))
    }

    async fn fetch_pages(&self, _handle: &JobHandle) -> Result<Vec<PageSummary>, TransportError> {
        self.pages_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.pages_gate {
            gate.pass().await;
        }
        self.pages
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(network_error("no pages scripted")))
    }

    async fn open_events(&self, _handle: &JobHandle) -> Result<EventByteStream, TransportError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.events.lock().unwrap().take();
        match script {
            None => Err(network_error("no event stream scripted")),
            Some(EventScript::Fail(err)) => Err(err),
            Some(EventScript::Lines(lines)) => Ok(stream::iter(chunks(lines)).boxed()),
            Some(EventScript::LinesThenHold(lines)) => {
                Ok(stream::iter(chunks(lines)).chain(stream::pending()).boxed())
            }
            Some(EventScript::LinesThenFail(lines, err)) => {
                let mut chunks = chunks(lines);
                chunks.push(Err(err));
                Ok(stream::iter(chunks).boxed())
            }
        }
    }
}

fn chunks(lines: Vec<String>) -> Vec<Result<Bytes, TransportError>> {
    lines
        .into_iter()
        .map(|line| Ok(Bytes::from(format!("{line}\n"))))
        .collect()
}

/// Polls `condition` until it holds or two seconds pass.
pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Gives spawned tasks time to deliver anything they still hold.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(60)).await;
}

pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}
