//! Jobwatch core: pure job-progress state machine and view-model types.
mod effect;
mod event;
mod msg;
mod request;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use event::{
    DoneEvent, JobHandle, LogEvent, LogPayload, PageSummary, RemoteStatus, StatusEvent,
    StatusSnapshot, StreamEvent, TokenReport, PAGE_DONE,
};
pub use msg::Msg;
pub use request::{JobRequest, PageSet, ValidationError, MAX_COMPANY_LEN};
pub use state::{connectivity_message, Feed, RunId, TrackerState, GENERIC_FAILURE_MESSAGE};
pub use update::update;
pub use view_model::{JobStatus, JobView, TokenUsage};
