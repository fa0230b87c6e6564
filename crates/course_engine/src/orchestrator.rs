use std::future::Future;
use std::sync::Arc;

use course_core::{update, AppState, ClientEvent, CourseRequest, Effect, Msg, TaskId};
use engine_logging::{engine_info, engine_warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::api::CourseApi;
use crate::poller::StatusPoller;
use crate::settings::Timings;
use crate::stream::LogStreamReader;
use crate::watcher::FileWatcher;

/// Receives every [`ClientEvent`]; the rendering layer implements this.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ClientEvent);
}

pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::UnboundedSender<ClientEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: ClientEvent) {
        let _ = self.tx.send(event);
    }
}

enum Command {
    Submit(CourseRequest),
    Dispatch(Msg),
    Shutdown,
}

/// Handle to a running orchestrator.
///
/// All task state is owned by one driver task; this handle only sends it
/// commands, so every method returns immediately.
pub struct OrchestratorHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
    driver: JoinHandle<AppState>,
}

impl OrchestratorHandle {
    /// Spawn the driver on the current tokio runtime.
    pub fn spawn(api: Arc<dyn CourseApi>, timings: Timings, sink: Arc<dyn EventSink>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let driver = Driver {
            api,
            timings,
            sink,
            msg_tx,
            state: AppState::new(),
            poller: None,
            stream: None,
            watcher: None,
        };
        let driver = tokio::spawn(driver.run(cmd_rx, msg_rx));
        Self { cmd_tx, driver }
    }

    /// Send a generation request; tracking starts once the backend assigns an id.
    pub fn submit(&self, request: CourseRequest) {
        let _ = self.cmd_tx.send(Command::Submit(request));
    }

    /// Track a task that was submitted elsewhere.
    pub fn attach(&self, task_id: TaskId) {
        self.dispatch(Msg::TaskStarted { task_id });
    }

    pub fn redisplay(&self) {
        self.dispatch(Msg::Redisplay);
    }

    pub fn reset(&self) {
        self.dispatch(Msg::Reset);
    }

    /// Stop every collaborator and return the final state.
    pub async fn shutdown(self) -> Option<AppState> {
        let _ = self.cmd_tx.send(Command::Shutdown);
        self.driver.await.ok()
    }

    fn dispatch(&self, msg: Msg) {
        let _ = self.cmd_tx.send(Command::Dispatch(msg));
    }
}

struct Driver {
    api: Arc<dyn CourseApi>,
    timings: Timings,
    sink: Arc<dyn EventSink>,
    msg_tx: mpsc::UnboundedSender<Msg>,
    state: AppState,
    poller: Option<DropGuard>,
    stream: Option<DropGuard>,
    watcher: Option<DropGuard>,
}

impl Driver {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::UnboundedReceiver<Command>,
        mut msg_rx: mpsc::UnboundedReceiver<Msg>,
    ) -> AppState {
        engine_info!("Orchestrator started");
        loop {
            let msg = tokio::select! {
                biased;
                command = cmd_rx.recv() => match command {
                    Some(Command::Submit(request)) => {
                        self.spawn_submit(request);
                        continue;
                    }
                    Some(Command::Dispatch(msg)) => msg,
                    Some(Command::Shutdown) | None => break,
                },
                Some(msg) = msg_rx.recv() => msg,
            };
            self.apply(msg);
        }

        self.poller = None;
        self.stream = None;
        self.watcher = None;
        engine_info!("Orchestrator stopped");
        self.state
    }

    fn apply(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        for effect in effects {
            self.execute(effect);
        }
    }

    fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::StartPoller { task_id } => {
                let poller = StatusPoller::new(
                    self.api.clone(),
                    task_id,
                    self.timings.status_interval,
                    self.msg_tx.clone(),
                );
                self.poller = Some(launch(|cancel| poller.run(cancel)));
            }
            Effect::StartLogStream { task_id } => {
                let reader =
                    LogStreamReader::new(self.api.clone(), task_id, &self.timings, self.msg_tx.clone())
                        .with_start_delay(self.timings.stream_start_delay);
                self.stream = Some(launch(|cancel| reader.run(cancel)));
            }
            Effect::StartFileWatcher { task_id } => {
                let watcher = FileWatcher::new(
                    self.api.clone(),
                    task_id,
                    self.timings.files_initial_delay,
                    self.timings.files_interval,
                    self.msg_tx.clone(),
                );
                self.watcher = Some(launch(|cancel| watcher.run(cancel)));
            }
            // Dropping a guard cancels its collaborator; stopping twice is a no-op.
            Effect::StopPoller => self.poller = None,
            Effect::StopLogStream => self.stream = None,
            Effect::StopFileWatcher => self.watcher = None,
            Effect::FetchResults { task_id } => self.spawn_fetch_results(task_id),
            Effect::Emit(event) => self.sink.emit(event),
        }
    }

    fn spawn_submit(&self, request: CourseRequest) {
        let api = self.api.clone();
        let msg_tx = self.msg_tx.clone();
        tokio::spawn(async move {
            let msg = match api.submit(&request).await {
                Ok(response) => {
                    engine_info!(
                        "Submitted course {:?}; task id {}",
                        request.course_name,
                        response.task_id
                    );
                    Msg::TaskStarted {
                        task_id: response.task_id,
                    }
                }
                Err(err) => {
                    engine_warn!("Submission of {:?} failed: {}", request.course_name, err);
                    Msg::SubmitFailed {
                        message: err.to_string(),
                    }
                }
            };
            let _ = msg_tx.send(msg);
        });
    }

    fn spawn_fetch_results(&self, task_id: TaskId) {
        let api = self.api.clone();
        let msg_tx = self.msg_tx.clone();
        tokio::spawn(async move {
            let msg = match api.files(&task_id).await {
                Ok(listing) => Msg::ResultsLoaded { task_id, listing },
                Err(err) => {
                    engine_warn!("Error loading results of task {}: {}", task_id, err);
                    Msg::ResultsFailed {
                        task_id,
                        message: err.to_string(),
                    }
                }
            };
            let _ = msg_tx.send(msg);
        });
    }
}

fn launch<F, Fut>(start: F) -> DropGuard
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let cancel = CancellationToken::new();
    tokio::spawn(start(cancel.clone()));
    cancel.drop_guard()
}
