use crate::state::connectivity_message;
use crate::{
    Effect, Feed, JobStatus, JobView, Msg, RemoteStatus, StreamEvent, TokenUsage, TrackerState,
};

/// Pure update function: applies a message to state and returns any effects.
///
/// The view is marked dirty (and its revision bumped) only when the message
/// actually changed it, so callers can notify listeners exactly once per mutation.
pub fn update(mut state: TrackerState, msg: Msg) -> (TrackerState, Vec<Effect>) {
    let before = ViewMark::of(state.view_ref());
    let effects = apply(&mut state, msg);
    if ViewMark::of(state.view_ref()) != before {
        state.mark_dirty();
    }
    (state, effects)
}

/// Cheap stand-in for comparing whole views.
///
/// Within a run the label list only grows and the page listing is written
/// once together with `pages_settled`, so their lengths are enough. A reset
/// clears both.
#[derive(Debug, PartialEq)]
struct ViewMark {
    status: JobStatus,
    progress_percent: u8,
    pages_done: u32,
    pages_total: u32,
    current_page_label: Option<String>,
    completed_labels: usize,
    token_usage: TokenUsage,
    duration_seconds: Option<f64>,
    error_message: Option<String>,
    pages: usize,
    pages_settled: bool,
}

impl ViewMark {
    fn of(view: &JobView) -> Self {
        Self {
            status: view.status,
            progress_percent: view.progress_percent,
            pages_done: view.pages_done,
            pages_total: view.pages_total,
            current_page_label: view.current_page_label.clone(),
            completed_labels: view.completed_page_labels.len(),
            token_usage: view.token_usage,
            duration_seconds: view.duration_seconds,
            error_message: view.error_message.clone(),
            pages: view.pages.len(),
            pages_settled: view.pages_settled,
        }
    }
}

fn apply(state: &mut TrackerState, msg: Msg) -> Vec<Effect> {
    match msg {
        Msg::StartRequested { pages_total } => {
            if !state.can_start() {
                return Vec::new();
            }
            state.begin_run(pages_total);
            vec![Effect::CloseStream, Effect::StopPolling]
        }
        Msg::JobCreated {
            handle,
            pages_total,
        } => {
            if !state.status().is_active() || state.handle().is_some() {
                return Vec::new();
            }
            state.attach(handle.clone(), pages_total);
            vec![Effect::OpenStream { handle }]
        }
        Msg::CreateFailed { message } => {
            if state.status().is_active() && state.handle().is_none() {
                state.fail(Some(message), None);
            }
            Vec::new()
        }
        Msg::Stream(event) => {
            if state.feed() != Feed::Stream || state.status().is_terminal() {
                return Vec::new();
            }
            match event {
                StreamEvent::Log(log) => {
                    state.apply_log_event(&log);
                    Vec::new()
                }
                StreamEvent::Status(status) => {
                    state.apply_status_event(&status);
                    Vec::new()
                }
                StreamEvent::Done(done) => {
                    state.apply_done(&done);
                    state.release_feed();
                    let mut effects = vec![Effect::CloseStream];
                    if done.status == RemoteStatus::Completed {
                        effects.extend(fetch_pages(state));
                    }
                    effects
                }
            }
        }
        Msg::StreamFailed { .. } => {
            if state.feed() != Feed::Stream {
                return Vec::new();
            }
            if state.status().is_terminal() {
                state.release_feed();
                return vec![Effect::CloseStream];
            }
            state.hand_over_to_polling();
            match state.handle() {
                Some(handle) => vec![
                    Effect::CloseStream,
                    Effect::StartPolling {
                        handle: handle.clone(),
                    },
                ],
                None => vec![Effect::CloseStream],
            }
        }
        Msg::Snapshot(snapshot) => {
            if state.feed() != Feed::Polling || state.status().is_terminal() {
                return Vec::new();
            }
            state.apply_snapshot(&snapshot);
            if !snapshot.status.is_terminal() {
                return Vec::new();
            }
            state.release_feed();
            let mut effects = vec![Effect::StopPolling];
            if snapshot.status == RemoteStatus::Completed {
                effects.extend(fetch_pages(state));
            }
            effects
        }
        Msg::PollingExhausted {
            consecutive_failures,
        } => {
            if state.feed() != Feed::Polling || state.status().is_terminal() {
                return Vec::new();
            }
            state.fail(Some(connectivity_message(consecutive_failures)), None);
            state.release_feed();
            vec![Effect::StopPolling]
        }
        Msg::PagesLoaded(pages) => {
            state.apply_pages(pages);
            Vec::new()
        }
        // The listing is best effort; the run stays completed without pages.
        Msg::PagesFailed { .. } => {
            state.pages_unavailable();
            Vec::new()
        }
        Msg::Disposed => {
            state.reset();
            vec![Effect::CloseStream, Effect::StopPolling]
        }
    }
}

fn fetch_pages(state: &mut TrackerState) -> Option<Effect> {
    let handle = state.handle()?.clone();
    state
        .request_pages()
        .then_some(Effect::FetchPages { handle })
}
