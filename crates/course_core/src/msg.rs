use crate::{FileEntry, FileListing, StatusSnapshot, StreamNotice, TaskId, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// The backend accepted a submission, or the user attached to an existing task.
    TaskStarted { task_id: TaskId },
    /// The generate request was rejected or never reached the backend.
    SubmitFailed { message: String },
    /// Status poller observation.
    StatusPolled {
        task_id: TaskId,
        snapshot: StatusSnapshot,
    },
    /// Log stream reader observation.
    Stream {
        task_id: TaskId,
        notice: StreamNotice,
    },
    /// File watcher observation, with the new-files diff already computed.
    FilesObserved {
        task_id: TaskId,
        files: Vec<FileEntry>,
        status: Option<TaskStatus>,
        new_files: Vec<FileEntry>,
    },
    /// One-shot results fetch after completion succeeded.
    ResultsLoaded {
        task_id: TaskId,
        listing: FileListing,
    },
    /// One-shot results fetch after completion failed.
    ResultsFailed { task_id: TaskId, message: String },
    /// Render the last snapshot again, e.g. after the display changed.
    Redisplay,
    /// Stop tracking and forget the current task.
    Reset,
}
