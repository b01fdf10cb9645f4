use jobwatch_core::{JobStatus, JobView, TokenUsage};

fn status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Idle => "idle",
        JobStatus::Pending => "pending",
        JobStatus::Running => "running",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
    }
}

/// One line describing the current state of the run.
pub fn progress_line(view: &JobView) -> String {
    let mut line = format!(
        "[{:>9}] {:>3}%  {}/{} pages",
        status_label(view.status),
        view.progress_percent,
        view.pages_done,
        view.pages_total
    );
    if let Some(page) = &view.current_page_label {
        line.push_str(&format!("  working on {page}"));
    }
    if view.token_usage.total_tokens() > 0 {
        line.push_str(&format!(
            "  {} tokens",
            format_tokens(view.token_usage.total_tokens())
        ));
    }
    if let Some(error) = &view.error_message {
        line.push_str(&format!("  error: {error}"));
    }
    line
}

/// Closing report printed once the run is terminal.
pub fn summary(view: &JobView) -> Vec<String> {
    let mut lines = Vec::new();
    let mut headline = match view.status {
        JobStatus::Completed => format!(
            "Generated {}/{} pages",
            view.pages_done, view.pages_total
        ),
        JobStatus::Failed => format!(
            "Generation failed: {}",
            view.error_message.as_deref().unwrap_or("unknown error")
        ),
        other => format!("Generation {}", status_label(other)),
    };
    if let Some(seconds) = view.duration_seconds {
        headline.push_str(&format!(" in {}", format_duration(seconds)));
    }
    lines.push(headline);

    if view.token_usage != TokenUsage::default() {
        lines.push(usage_line(&view.token_usage));
    }
    if !view.completed_page_labels.is_empty() {
        lines.push(format!(
            "Pages written: {}",
            view.completed_page_labels.join(", ")
        ));
    }
    for page in &view.pages {
        lines.push(format!("  {:<24} {}", page.title, page.path));
    }
    lines
}

fn usage_line(usage: &TokenUsage) -> String {
    format!(
        "Tokens: {} in / {} out ({} total), cost {}",
        format_tokens(usage.input),
        format_tokens(usage.output),
        format_tokens(usage.total_tokens()),
        format_cost(usage.cost_usd)
    )
}

pub fn format_tokens(count: u64) -> String {
    if count < 1000 {
        count.to_string()
    } else {
        format!("{:.1}k", count as f64 / 1000.0)
    }
}

pub fn format_cost(usd: f64) -> String {
    format!("${usd:.4}")
}

pub fn format_duration(seconds: f64) -> String {
    format!("{seconds:.1}s")
}
