use crate::{
    AppState, ClientEvent, Effect, Msg, StatusSnapshot, StreamNotice, TaskPhase, TaskStatus,
    FAILED_FALLBACK_MESSAGE,
};

/// Pure update function: applies a message to state and returns any effects.
///
/// Observations tagged with a task id other than the active one are dropped
/// without touching state, so collaborators of a superseded task are inert.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::TaskStarted { task_id } => {
            let mut effects = stop_all();
            state.replace_task(task_id.clone());
            effects.extend([
                Effect::Emit(ClientEvent::TaskStarted {
                    task_id: task_id.clone(),
                }),
                Effect::StartPoller {
                    task_id: task_id.clone(),
                },
                Effect::StartLogStream {
                    task_id: task_id.clone(),
                },
                Effect::StartFileWatcher { task_id },
            ]);
            effects
        }
        Msg::SubmitFailed { message } => vec![Effect::Emit(ClientEvent::Error(message))],
        Msg::StatusPolled { task_id, snapshot } => {
            if !state.is_active(&task_id) || *state.phase() != TaskPhase::Tracking {
                return (state, Vec::new());
            }
            let snapshot = snapshot.normalized();
            state.apply_snapshot(snapshot.clone());
            let mut effects = vec![Effect::Emit(ClientEvent::Progress(snapshot.clone()))];
            match snapshot.status {
                TaskStatus::Completed => {
                    state.set_phase(TaskPhase::CollectingResults);
                    effects.extend([
                        Effect::StopPoller,
                        Effect::StopLogStream,
                        Effect::StopFileWatcher,
                        Effect::FetchResults { task_id },
                    ]);
                }
                TaskStatus::Failed => {
                    state.set_phase(TaskPhase::Finished(TaskStatus::Failed));
                    effects.extend([
                        Effect::StopPoller,
                        Effect::StopLogStream,
                        Effect::StopFileWatcher,
                        Effect::Emit(ClientEvent::Error(failure_message(&snapshot))),
                        Effect::Emit(ClientEvent::TaskFinished {
                            task_id,
                            status: TaskStatus::Failed,
                        }),
                    ]);
                }
                _ => {}
            }
            effects
        }
        Msg::Stream { task_id, notice } => {
            if !state.is_active(&task_id) || *state.phase() != TaskPhase::Tracking {
                return (state, Vec::new());
            }
            if matches!(notice, StreamNotice::Log(_)) {
                state.record_log_line();
            }
            vec![Effect::Emit(ClientEvent::Stream(notice))]
        }
        Msg::FilesObserved {
            task_id,
            files,
            status,
            new_files,
        } => {
            if !state.is_active(&task_id) || *state.phase() != TaskPhase::Tracking {
                return (state, Vec::new());
            }
            state.apply_files(files.clone());
            let announce = status == Some(TaskStatus::Running) && !new_files.is_empty();
            let mut effects = vec![Effect::Emit(ClientEvent::Files {
                files,
                status,
                new_files: new_files.clone(),
            })];
            if announce {
                effects.push(Effect::Emit(ClientEvent::NewFilesReady(new_files)));
            }
            effects
        }
        Msg::ResultsLoaded { task_id, listing } => {
            if !state.is_active(&task_id) || *state.phase() != TaskPhase::CollectingResults {
                return (state, Vec::new());
            }
            state.apply_results(listing.clone());
            state.set_phase(TaskPhase::Finished(TaskStatus::Completed));
            vec![
                Effect::Emit(ClientEvent::Results(listing)),
                Effect::Emit(ClientEvent::TaskFinished {
                    task_id,
                    status: TaskStatus::Completed,
                }),
            ]
        }
        Msg::ResultsFailed { task_id, message } => {
            if !state.is_active(&task_id) || *state.phase() != TaskPhase::CollectingResults {
                return (state, Vec::new());
            }
            state.set_phase(TaskPhase::Finished(TaskStatus::Completed));
            vec![
                Effect::Emit(ClientEvent::Error(format!(
                    "failed to load results: {message}"
                ))),
                Effect::Emit(ClientEvent::TaskFinished {
                    task_id,
                    status: TaskStatus::Completed,
                }),
            ]
        }
        Msg::Redisplay => match state.last_snapshot() {
            Some(snapshot) => vec![Effect::Emit(ClientEvent::Progress(snapshot.clone()))],
            None => Vec::new(),
        },
        Msg::Reset => {
            if state.task().is_none() {
                return (state, Vec::new());
            }
            state.clear();
            stop_all()
        }
    };

    (state, effects)
}

fn stop_all() -> Vec<Effect> {
    vec![
        Effect::StopPoller,
        Effect::StopLogStream,
        Effect::StopFileWatcher,
    ]
}

fn failure_message(snapshot: &StatusSnapshot) -> String {
    snapshot
        .error
        .as_deref()
        .filter(|message| !message.is_empty())
        .unwrap_or(FAILED_FALLBACK_MESSAGE)
        .to_string()
}
