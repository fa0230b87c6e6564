//! Course engine: backend IO and the task-tracking collaborators.
mod api;
mod decode;
mod download;
mod framer;
mod orchestrator;
mod persist;
mod poller;
mod settings;
mod stream;
mod types;
mod watcher;

pub use api::{download_url, ByteStream, CourseApi, ReqwestApi};
pub use decode::{decode_line, LineOutcome, DATA_PREFIX};
pub use download::{download_artifact, DownloadError};
pub use framer::{CompleteLines, LineFramer};
pub use orchestrator::{ChannelEventSink, EventSink, OrchestratorHandle};
pub use persist::{ensure_output_dir, AtomicFileWriter, PendingFile, PersistError};
pub use poller::StatusPoller;
pub use settings::{ClientSettings, Timings, API_KEY_HEADER, DEFAULT_BASE_URL};
pub use stream::LogStreamReader;
pub use types::{ApiError, FailureKind};
pub use watcher::FileWatcher;
