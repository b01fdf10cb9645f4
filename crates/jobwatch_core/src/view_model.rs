use crate::PageSummary;

/// Lifecycle of one run as seen by the presentation layer.
///
/// Transitions only move forward: `Idle -> Pending -> Running -> {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum JobStatus {
    #[default]
    Idle,
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// A run is active while it can still receive progress.
    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub cost_usd: f64,
}

impl TokenUsage {
    pub fn total_tokens(&self) -> u64 {
        self.input.saturating_add(self.output)
    }
}

/// The canonical, externally observed job state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobView {
    pub status: JobStatus,
    pub progress_percent: u8,
    pub pages_done: u32,
    /// Zero while unknown.
    pub pages_total: u32,
    pub current_page_label: Option<String>,
    pub completed_page_labels: Vec<String>,
    pub token_usage: TokenUsage,
    pub duration_seconds: Option<f64>,
    pub error_message: Option<String>,
    /// Final page listing, filled once after completion.
    pub pages: Vec<PageSummary>,
    /// The listing request finished, with or without pages.
    pub pages_settled: bool,
    /// Incremented on every mutation; never reset, not even across runs.
    pub revision: u64,
}
