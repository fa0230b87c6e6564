use crate::view_model::AppViewModel;
use crate::{FileEntry, FileListing, StatusSnapshot, TaskId, TaskStatus};

/// Shown when a task fails without an error message.
pub const FAILED_FALLBACK_MESSAGE: &str = "task failed";

/// The active generation task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    id: TaskId,
}

impl TaskHandle {
    pub fn new(id: TaskId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TaskPhase {
    /// No task is tracked.
    #[default]
    Idle,
    /// Poller, log stream and file watcher are running.
    Tracking,
    /// Task completed; waiting for the final results listing.
    CollectingResults,
    /// Nothing more will be fetched for this task.
    Finished(TaskStatus),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    task: Option<TaskHandle>,
    phase: TaskPhase,
    last_snapshot: Option<StatusSnapshot>,
    files: Vec<FileEntry>,
    results: Option<FileListing>,
    log_lines: usize,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        let snapshot = self.last_snapshot.as_ref();
        AppViewModel {
            task_id: self.task.as_ref().map(|task| task.id().clone()),
            phase: self.phase.clone(),
            status: snapshot.map(|s| s.status.clone()),
            progress: snapshot.map(|s| s.progress),
            current_stage: snapshot.and_then(|s| s.current_stage.clone()),
            error: snapshot.and_then(|s| s.error.clone()),
            file_count: self.files.len(),
            log_lines: self.log_lines,
            has_results: self.results.is_some(),
            dirty: self.dirty,
        }
    }

    pub fn task(&self) -> Option<&TaskHandle> {
        self.task.as_ref()
    }

    pub fn phase(&self) -> &TaskPhase {
        &self.phase
    }

    pub fn last_snapshot(&self) -> Option<&StatusSnapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    pub fn results(&self) -> Option<&FileListing> {
        self.results.as_ref()
    }

    /// True when `task_id` names the active task.
    pub fn is_active(&self, task_id: &TaskId) -> bool {
        self.task.as_ref().is_some_and(|task| task.id() == task_id)
    }

    /// Returns whether anything changed since the last call, and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn replace_task(&mut self, task_id: TaskId) {
        *self = Self {
            task: Some(TaskHandle::new(task_id)),
            phase: TaskPhase::Tracking,
            dirty: true,
            ..Self::default()
        };
    }

    pub(crate) fn clear(&mut self) {
        *self = Self {
            dirty: true,
            ..Self::default()
        };
    }

    pub(crate) fn set_phase(&mut self, phase: TaskPhase) {
        self.phase = phase;
        self.dirty = true;
    }

    pub(crate) fn apply_snapshot(&mut self, snapshot: StatusSnapshot) {
        self.last_snapshot = Some(snapshot);
        self.dirty = true;
    }

    pub(crate) fn apply_files(&mut self, files: Vec<FileEntry>) {
        if self.files != files {
            self.files = files;
            self.dirty = true;
        }
    }

    pub(crate) fn apply_results(&mut self, listing: FileListing) {
        self.files = listing.files.clone();
        self.results = Some(listing);
        self.dirty = true;
    }

    pub(crate) fn record_log_line(&mut self) {
        self.log_lines += 1;
        self.dirty = true;
    }
}
