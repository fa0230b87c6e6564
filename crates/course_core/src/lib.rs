//! Course client core: wire model, pure task state machine and view-model helpers.
mod effect;
mod event;
mod known_files;
mod model;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use event::{ClientEvent, StreamNotice};
pub use known_files::KnownFiles;
pub use model::{
    CatalogEntry, CatalogList, CourseRequest, FileEntry, FileListing, HealthReport, LogEvent,
    StatusSnapshot, SubmitResponse, TaskId, TaskList, TaskStatus, TaskSummary,
};
pub use msg::Msg;
pub use state::{AppState, TaskHandle, TaskPhase, FAILED_FALLBACK_MESSAGE};
pub use update::update;
pub use view_model::AppViewModel;
