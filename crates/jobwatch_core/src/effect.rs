use crate::JobHandle;

/// Side effects requested by [`crate::update`]; executed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open the live event subscription for the job.
    OpenStream { handle: JobHandle },
    /// Release the event subscription, if any.
    CloseStream,
    /// Begin periodic status polling for the job.
    StartPolling { handle: JobHandle },
    /// Release the polling timer, if any.
    StopPolling,
    /// Fetch the final page listing. Emitted at most once per run.
    FetchPages { handle: JobHandle },
}
