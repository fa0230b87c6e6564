use crate::{ClientEvent, TaskId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    StartPoller { task_id: TaskId },
    StartLogStream { task_id: TaskId },
    StartFileWatcher { task_id: TaskId },
    StopPoller,
    StopLogStream,
    StopFileWatcher,
    FetchResults { task_id: TaskId },
    Emit(ClientEvent),
}
