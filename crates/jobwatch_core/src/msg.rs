use crate::{JobHandle, PageSummary, StatusSnapshot, StreamEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Caller started a new run; `pages_total` comes from the requested page set.
    StartRequested { pages_total: u32 },
    /// The remote service accepted the job.
    JobCreated {
        handle: JobHandle,
        pages_total: Option<u32>,
    },
    /// The create request never produced a job.
    CreateFailed { message: String },
    /// A decoded message from the live event stream.
    Stream(StreamEvent),
    /// The live event stream terminated.
    StreamFailed { reason: String },
    /// A status snapshot returned by the polling fallback.
    Snapshot(StatusSnapshot),
    /// Polling gave up after too many consecutive transport failures.
    PollingExhausted { consecutive_failures: u32 },
    /// Final page listing arrived.
    PagesLoaded(Vec<PageSummary>),
    /// Final page listing could not be fetched.
    PagesFailed { message: String },
    /// Caller disposed the tracker.
    Disposed,
}
