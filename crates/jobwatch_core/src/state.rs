use crate::view_model::JobView;
use crate::{
    DoneEvent, JobHandle, JobStatus, LogEvent, PageSummary, RemoteStatus, StatusEvent,
    StatusSnapshot, TokenReport,
};

/// Monotonic counter identifying one `start`/`dispose` epoch.
pub type RunId = u64;

/// Shown when the service reports a failure without a message.
pub const GENERIC_FAILURE_MESSAGE: &str = "generation failed";

pub fn connectivity_message(consecutive_failures: u32) -> String {
    format!(
        "lost connection to the job service ({consecutive_failures} consecutive status checks failed)"
    )
}

/// Which source currently owns the progress feed. Never both at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Feed {
    #[default]
    Idle,
    Stream,
    Polling,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackerState {
    run: RunId,
    handle: Option<JobHandle>,
    feed: Feed,
    view: JobView,
    pages_requested: bool,
    dirty: bool,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> JobView {
        self.view.clone()
    }

    pub fn run(&self) -> RunId {
        self.run
    }

    pub fn handle(&self) -> Option<&JobHandle> {
        self.handle.as_ref()
    }

    pub fn feed(&self) -> Feed {
        self.feed
    }

    pub fn status(&self) -> JobStatus {
        self.view.status
    }

    /// `start` is accepted unless a run is pending or running.
    pub fn can_start(&self) -> bool {
        !self.view.status.is_active()
    }

    /// Returns whether the view changed since the last call, clearing the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn view_ref(&self) -> &JobView {
        &self.view
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.view.revision += 1;
        self.dirty = true;
    }

    pub(crate) fn begin_run(&mut self, pages_total: u32) {
        self.reset();
        self.view.status = JobStatus::Pending;
        self.view.pages_total = pages_total;
    }

    pub(crate) fn reset(&mut self) {
        self.run += 1;
        self.handle = None;
        self.feed = Feed::Idle;
        self.pages_requested = false;
        self.view = JobView {
            revision: self.view.revision,
            ..JobView::default()
        };
    }

    pub(crate) fn attach(&mut self, handle: JobHandle, pages_total: Option<u32>) {
        self.handle = Some(handle);
        self.feed = Feed::Stream;
        self.merge_pages_total(pages_total);
    }

    pub(crate) fn hand_over_to_polling(&mut self) {
        self.feed = Feed::Polling;
    }

    pub(crate) fn release_feed(&mut self) {
        self.feed = Feed::Idle;
    }

    /// Marks the page listing as requested; returns `false` if it already was.
    pub(crate) fn request_pages(&mut self) -> bool {
        !std::mem::replace(&mut self.pages_requested, true)
    }

    pub(crate) fn apply_status_event(&mut self, event: &StatusEvent) {
        self.advance_from_remote(event.status);
        self.merge_progress(event.progress);
        self.merge_pages_done(event.pages_done);
        self.view.current_page_label = event.current_page.clone();
        self.merge_tokens(&event.tokens);
    }

    pub(crate) fn apply_log_event(&mut self, event: &LogEvent) {
        if !event.is_page_done() {
            return;
        }
        self.advance_to(JobStatus::Running);
        self.merge_pages_total(event.payload.total);
        self.merge_pages_done(event.payload.done);
        if let Some(title) = event.payload.title.as_deref() {
            self.view.current_page_label = Some(title.to_string());
            let labels = &mut self.view.completed_page_labels;
            if labels.last().map(String::as_str) != Some(title) {
                labels.push(title.to_string());
            }
        }
    }

    pub(crate) fn apply_done(&mut self, event: &DoneEvent) {
        self.merge_tokens(&event.tokens);
        if event.status == RemoteStatus::Completed {
            self.complete(event.duration_seconds);
        } else {
            self.fail(event.error.clone(), event.duration_seconds);
        }
    }

    pub(crate) fn apply_snapshot(&mut self, snapshot: &StatusSnapshot) {
        self.merge_pages_total(snapshot.pages_total);
        self.merge_progress(snapshot.progress);
        self.merge_pages_done(snapshot.pages_done);
        if let Some(page) = snapshot.current_page.as_deref() {
            self.view.current_page_label = Some(page.to_string());
        }
        self.merge_tokens(&snapshot.tokens);
        match snapshot.status {
            RemoteStatus::Completed => self.complete(snapshot.duration_seconds),
            RemoteStatus::Failed => self.fail(snapshot.error.clone(), snapshot.duration_seconds),
            status => self.advance_from_remote(status),
        }
    }

    pub(crate) fn apply_pages(&mut self, pages: Vec<PageSummary>) {
        if self.view.status == JobStatus::Completed && !self.view.pages_settled {
            self.view.pages_settled = true;
            self.view.pages = pages;
        }
    }

    /// Settles the listing without pages; the run stays completed.
    pub(crate) fn pages_unavailable(&mut self) {
        if self.view.status == JobStatus::Completed {
            self.view.pages_settled = true;
        }
    }

    pub(crate) fn fail(&mut self, error: Option<String>, duration_seconds: Option<f64>) {
        let message = error
            .map(|msg| msg.trim().to_string())
            .filter(|msg| !msg.is_empty())
            .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
        self.view.status = JobStatus::Failed;
        self.view.error_message = Some(message);
        self.view.duration_seconds = duration_seconds;
    }

    fn complete(&mut self, duration_seconds: Option<f64>) {
        self.view.status = JobStatus::Completed;
        self.view.progress_percent = 100;
        self.view.current_page_label = None;
        self.view.duration_seconds = duration_seconds;
    }

    fn advance_from_remote(&mut self, status: RemoteStatus) {
        // Only terminal messages may finish a run; status payloads merely prove it started.
        if status != RemoteStatus::Pending {
            self.advance_to(JobStatus::Running);
        }
    }

    fn advance_to(&mut self, status: JobStatus) {
        if status > self.view.status {
            self.view.status = status;
        }
    }

    fn merge_progress(&mut self, incoming: Option<u32>) {
        if let Some(progress) = incoming {
            let progress = progress.min(100) as u8;
            self.view.progress_percent = self.view.progress_percent.max(progress);
        }
    }

    fn merge_pages_done(&mut self, incoming: Option<u32>) {
        if let Some(mut done) = incoming {
            if self.view.pages_total > 0 {
                done = done.min(self.view.pages_total);
            }
            self.view.pages_done = self.view.pages_done.max(done);
        }
    }

    fn merge_pages_total(&mut self, incoming: Option<u32>) {
        match incoming {
            Some(total) if total > 0 && total >= self.view.pages_done => {
                self.view.pages_total = total;
            }
            _ => {}
        }
    }

    fn merge_tokens(&mut self, tokens: &TokenReport) {
        let usage = &mut self.view.token_usage;
        if let Some(input) = tokens.input {
            usage.input = usage.input.max(input);
        }
        if let Some(output) = tokens.output {
            usage.output = usage.output.max(output);
        }
        if let Some(cost) = tokens.cost_usd.filter(|cost| cost.is_finite()) {
            if cost > usage.cost_usd {
                usage.cost_usd = cost;
            }
        }
    }
}
