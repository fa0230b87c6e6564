use crate::{FileEntry, FileListing, StatusSnapshot, TaskId, TaskStatus};

/// Observations from the log stream reader, surfaced to the renderer as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamNotice {
    /// A connection attempt is starting.
    Connecting,
    /// The backend acknowledged the stream.
    Connected,
    /// A log line produced by the generation pipeline.
    Log(String),
    /// The backend reported the task finished; the stream is closed.
    Completed,
    /// The backend reported an error on the stream.
    ServerError(String),
    /// A `data:` record could not be decoded. Holds the truncated raw line.
    ParseError(String),
    /// The response body ended without a completion record.
    Ended,
    /// The request or the body read failed.
    ConnectFailed(String),
    /// A reconnect is scheduled.
    Reconnecting,
    /// No record arrived within the inactivity threshold.
    Inactive,
}

/// Everything the rendering layer is told about. Forward-only: the
/// orchestrator never inspects what the renderer does with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    TaskStarted {
        task_id: TaskId,
    },
    Progress(StatusSnapshot),
    Stream(StreamNotice),
    Files {
        files: Vec<FileEntry>,
        status: Option<TaskStatus>,
        new_files: Vec<FileEntry>,
    },
    /// New artifacts appeared while the task is still running.
    NewFilesReady(Vec<FileEntry>),
    Results(FileListing),
    Error(String),
    TaskFinished {
        task_id: TaskId,
        status: TaskStatus,
    },
}
