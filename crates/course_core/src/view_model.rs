use crate::{TaskId, TaskPhase, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub task_id: Option<TaskId>,
    pub phase: TaskPhase,
    pub status: Option<TaskStatus>,
    pub progress: Option<u32>,
    pub current_stage: Option<String>,
    pub error: Option<String>,
    pub file_count: usize,
    pub log_lines: usize,
    pub has_results: bool,
    pub dirty: bool,
}
