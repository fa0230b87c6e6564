use chrono::{DateTime, Local};
use course_core::{ClientEvent, FileEntry, StatusSnapshot, StreamNotice, TaskStatus};

const BAR_WIDTH: usize = 30;

/// Terminal lines for one client event. Pure so the follow loop stays thin.
pub fn render_event(event: &ClientEvent, now: DateTime<Local>) -> Vec<String> {
    let stamp = now.format("%H:%M:%S");
    match event {
        ClientEvent::TaskStarted { task_id } => {
            vec![format!("[{stamp}] Tracking task {task_id}")]
        }
        ClientEvent::Progress(snapshot) => vec![format!("[{stamp}] {}", progress_line(snapshot))],
        ClientEvent::Stream(notice) => render_notice(notice)
            .map(|text| vec![format!("[{stamp}] {text}")])
            .unwrap_or_default(),
        // Listings arrive every few seconds; only the deltas are worth a line.
        ClientEvent::Files { .. } => Vec::new(),
        ClientEvent::NewFilesReady(files) => {
            let mut lines = vec![format!("[{stamp}] {} new file(s):", files.len())];
            lines.extend(files.iter().map(file_line));
            lines
        }
        ClientEvent::Results(listing) => {
            let total: u64 = listing.files.iter().map(|file| file.size).sum();
            let mut lines = vec![format!(
                "[{stamp}] Results: {} file(s), {}",
                listing.files.len(),
                format_size(total)
            )];
            lines.extend(listing.files.iter().map(file_line));
            lines
        }
        ClientEvent::Error(message) => vec![format!("[{stamp}] ERROR {message}")],
        ClientEvent::TaskFinished { task_id, status } => {
            vec![format!("[{stamp}] Task {task_id} {status}")]
        }
    }
}

fn render_notice(notice: &StreamNotice) -> Option<String> {
    let text = match notice {
        StreamNotice::Connecting => return None,
        StreamNotice::Connected => "log stream connected".to_string(),
        StreamNotice::Log(message) => format!("> {message}"),
        StreamNotice::Completed => "log stream complete".to_string(),
        StreamNotice::ServerError(message) => format!("backend error: {message}"),
        StreamNotice::ParseError(excerpt) => format!("unreadable log record: {excerpt}"),
        StreamNotice::Ended => "log stream ended".to_string(),
        StreamNotice::ConnectFailed(reason) => format!("log stream lost: {reason}"),
        StreamNotice::Reconnecting => "reconnecting to log stream...".to_string(),
        StreamNotice::Inactive => "no log output yet; the task may still be queued".to_string(),
    };
    Some(text)
}

pub fn progress_line(snapshot: &StatusSnapshot) -> String {
    let filled = (snapshot.progress.min(100) as usize * BAR_WIDTH) / 100;
    let bar = format!("{}{}", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled));
    let mut line = format!(
        "[{bar}] {:>3}% {}",
        snapshot.progress,
        status_label(&snapshot.status)
    );
    if let Some(stage) = snapshot.current_stage.as_deref().filter(|s| !s.is_empty()) {
        line.push_str(" - ");
        line.push_str(stage);
    }
    line
}

fn status_label(status: &TaskStatus) -> &str {
    match status {
        TaskStatus::Pending => "Pending",
        TaskStatus::Starting => "Starting",
        TaskStatus::Running => "Running",
        TaskStatus::Completed => "Completed",
        TaskStatus::Failed => "Failed",
        TaskStatus::Unknown(raw) => raw,
    }
}

pub fn file_line(file: &FileEntry) -> String {
    format!("    {:<50} {:>10}", file.path, format_size(file.size))
}

/// Human-readable byte count: `512 B`, `1.5 KB`, `3.2 MB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

pub fn format_with_commas(value: u64) -> String {
    let mut out = String::new();
    for (i, ch) in value.to_string().chars().rev().enumerate() {
        if i != 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out.chars().rev().collect()
}
