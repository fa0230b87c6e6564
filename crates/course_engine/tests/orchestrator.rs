mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{file, init_logging, network_error, record, FakeApi, StreamScript, Tail};
use course_core::{
    ClientEvent, CourseRequest, FileListing, StatusSnapshot, StreamNotice, SubmitResponse, TaskId,
    TaskPhase, TaskStatus,
};
use course_engine::{ChannelEventSink, OrchestratorHandle, Timings};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

fn submitted(task_id: &str) -> SubmitResponse {
    SubmitResponse {
        task_id: TaskId::new(task_id),
        status: Some("started".to_string()),
        message: None,
    }
}

fn running_listing(paths: &[&str]) -> FileListing {
    FileListing {
        files: paths.iter().map(|path| file(path, 120)).collect(),
        status: Some(TaskStatus::Running),
        exp_name: Some("default".to_string()),
    }
}

fn start(api: Arc<FakeApi>) -> (OrchestratorHandle, mpsc::UnboundedReceiver<ClientEvent>) {
    init_logging();
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = OrchestratorHandle::spawn(
        api,
        Timings::default(),
        Arc::new(ChannelEventSink::new(tx)),
    );
    (handle, rx)
}

/// Wait for the first event matching `pred`, discarding the others.
async fn wait_for(
    rx: &mut mpsc::UnboundedReceiver<ClientEvent>,
    pred: impl Fn(&ClientEvent) -> bool,
) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            let event = rx.recv().await.expect("sink open");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event arrived in time")
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ClientEvent>) -> Vec<ClientEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn new_files_are_announced_exactly_once() {
    let api = Arc::new(
        FakeApi::new()
            .with_submit(Ok(submitted("t1")))
            .with_statuses(vec![Ok(StatusSnapshot::new(TaskStatus::Running, 40))])
            .with_listings(vec![Ok(running_listing(&["a/b.md"]))]),
    );
    let (handle, mut rx) = start(api.clone());
    handle.submit(CourseRequest::new("Intro to ML"));

    let started = wait_for(&mut rx, |e| matches!(e, ClientEvent::TaskStarted { .. })).await;
    assert_eq!(
        started,
        ClientEvent::TaskStarted {
            task_id: TaskId::new("t1")
        }
    );

    let first = wait_for(&mut rx, |e| matches!(e, ClientEvent::Files { .. })).await;
    let ClientEvent::Files { new_files, .. } = first else {
        unreachable!()
    };
    assert_eq!(new_files, vec![file("a/b.md", 120)]);
    let ready = wait_for(&mut rx, |e| matches!(e, ClientEvent::NewFilesReady(_))).await;
    assert_eq!(ready, ClientEvent::NewFilesReady(vec![file("a/b.md", 120)]));

    let second = wait_for(&mut rx, |e| matches!(e, ClientEvent::Files { .. })).await;
    let ClientEvent::Files {
        files, new_files, ..
    } = second
    else {
        unreachable!()
    };
    assert_eq!(files.len(), 1);
    assert!(new_files.is_empty());

    let progress = wait_for(&mut rx, |e| matches!(e, ClientEvent::Progress(_))).await;
    assert_eq!(
        progress,
        ClientEvent::Progress(StatusSnapshot::new(TaskStatus::Running, 40))
    );
    assert_eq!(api.submit_calls.load(std::sync::atomic::Ordering::SeqCst), 1);

    let state = handle.shutdown().await.expect("driver finished");
    assert_eq!(*state.phase(), TaskPhase::Tracking);
    assert_eq!(state.files().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn completion_stops_collaborators_and_loads_results() {
    let results = FileListing {
        files: vec![file("a/b.md", 120), file("a/c.pdf", 4096)],
        status: Some(TaskStatus::Completed),
        exp_name: Some("default".to_string()),
    };
    let api = Arc::new(
        FakeApi::new()
            .with_statuses(vec![
                Ok(StatusSnapshot::new(TaskStatus::Running, 50)),
                Ok(StatusSnapshot::new(TaskStatus::Completed, 100)),
            ])
            .with_listings(vec![Ok(results.clone())]),
    );
    let (handle, mut rx) = start(api.clone());
    handle.attach(TaskId::new("t1"));

    let loaded = wait_for(&mut rx, |e| matches!(e, ClientEvent::Results(_))).await;
    assert_eq!(loaded, ClientEvent::Results(results));
    let finished = wait_for(&mut rx, |e| matches!(e, ClientEvent::TaskFinished { .. })).await;
    assert_eq!(
        finished,
        ClientEvent::TaskFinished {
            task_id: TaskId::new("t1"),
            status: TaskStatus::Completed
        }
    );

    let status_calls = api.status_calls();
    let files_calls = api.files_calls();
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(api.status_calls(), status_calls);
    assert_eq!(api.files_calls(), files_calls);
    assert!(drain(&mut rx).is_empty());

    let state = handle.shutdown().await.expect("driver finished");
    assert_eq!(*state.phase(), TaskPhase::Finished(TaskStatus::Completed));
    assert!(state.results().is_some());
}

#[tokio::test(start_paused = true)]
async fn failure_surfaces_backend_error() {
    let api = Arc::new(FakeApi::new().with_statuses(vec![Ok(StatusSnapshot {
        error: Some("model quota exceeded".to_string()),
        ..StatusSnapshot::new(TaskStatus::Failed, 30)
    })]));
    let (handle, mut rx) = start(api.clone());
    handle.attach(TaskId::new("t1"));

    let error = wait_for(&mut rx, |e| matches!(e, ClientEvent::Error(_))).await;
    assert_eq!(error, ClientEvent::Error("model quota exceeded".to_string()));
    let finished = wait_for(&mut rx, |e| matches!(e, ClientEvent::TaskFinished { .. })).await;
    assert_eq!(
        finished,
        ClientEvent::TaskFinished {
            task_id: TaskId::new("t1"),
            status: TaskStatus::Failed
        }
    );

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(api.status_calls(), 1);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn rejected_submission_starts_nothing() {
    let api = Arc::new(FakeApi::new().with_submit(Err(network_error("connection refused"))));
    let (handle, mut rx) = start(api.clone());
    handle.submit(CourseRequest::new("Intro to ML"));

    let error = wait_for(&mut rx, |e| matches!(e, ClientEvent::Error(_))).await;
    let ClientEvent::Error(message) = error else {
        unreachable!()
    };
    assert!(message.contains("connection refused"), "{message}");

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(api.status_calls(), 0);
    assert_eq!(api.files_calls(), 0);
    assert_eq!(api.stream_opens(), 0);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn log_records_reach_the_sink() {
    let api = Arc::new(
        FakeApi::new()
            .with_statuses(vec![Ok(StatusSnapshot::new(TaskStatus::Running, 10))])
            .with_listings(vec![Ok(running_listing(&[]))])
            .with_streams(vec![StreamScript::Body {
                chunks: vec![
                    record(r#"{"type": "connected", "message": "Log stream connected"}"#),
                    record(r#"{"type": "log", "message": "Generating outline"}"#),
                ],
                tail: Tail::Hang,
            }]),
    );
    let (handle, mut rx) = start(api.clone());
    handle.attach(TaskId::new("t1"));

    let connected = wait_for(&mut rx, |e| {
        matches!(e, ClientEvent::Stream(StreamNotice::Connected))
    })
    .await;
    assert_eq!(connected, ClientEvent::Stream(StreamNotice::Connected));
    let line = wait_for(&mut rx, |e| {
        matches!(e, ClientEvent::Stream(StreamNotice::Log(_)))
    })
    .await;
    assert_eq!(
        line,
        ClientEvent::Stream(StreamNotice::Log("Generating outline".to_string()))
    );

    let state = handle.shutdown().await.expect("driver finished");
    assert_eq!(state.view().log_lines, 1);
}

#[tokio::test(start_paused = true)]
async fn reset_silences_the_active_task() {
    let api = Arc::new(
        FakeApi::new()
            .with_statuses(vec![Ok(StatusSnapshot::new(TaskStatus::Running, 10))])
            .with_listings(vec![Ok(running_listing(&["a/b.md"]))]),
    );
    let (handle, mut rx) = start(api.clone());
    handle.attach(TaskId::new("t1"));
    wait_for(&mut rx, |e| matches!(e, ClientEvent::Progress(_))).await;

    drain(&mut rx);
    handle.reset();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let status_calls = api.status_calls();
    let files_calls = api.files_calls();

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(drain(&mut rx).is_empty());
    assert_eq!(api.status_calls(), status_calls);
    assert_eq!(api.files_calls(), files_calls);

    let state = handle.shutdown().await.expect("driver finished");
    assert_eq!(*state.phase(), TaskPhase::Idle);
    assert!(state.task().is_none());
}

#[tokio::test(start_paused = true)]
async fn redisplay_repeats_the_last_snapshot() {
    let api = Arc::new(
        FakeApi::new()
            .with_statuses(vec![Ok(StatusSnapshot::new(TaskStatus::Running, 40))])
            .with_listings(vec![Ok(running_listing(&[]))]),
    );
    let (handle, mut rx) = start(api.clone());
    handle.attach(TaskId::new("t1"));
    let first = wait_for(&mut rx, |e| matches!(e, ClientEvent::Progress(_))).await;

    handle.redisplay();
    let again = wait_for(&mut rx, |e| matches!(e, ClientEvent::Progress(_))).await;
    assert_eq!(again, first);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn attaching_a_new_task_replaces_the_old_one() {
    let api = Arc::new(
        FakeApi::new()
            .with_statuses(vec![Ok(StatusSnapshot::new(TaskStatus::Running, 40))])
            .with_listings(vec![Ok(running_listing(&["a/b.md"]))]),
    );
    let (handle, mut rx) = start(api.clone());
    handle.attach(TaskId::new("t1"));
    wait_for(&mut rx, |e| matches!(e, ClientEvent::Progress(_))).await;

    handle.attach(TaskId::new("t2"));
    let started = wait_for(&mut rx, |e| matches!(e, ClientEvent::TaskStarted { .. })).await;
    assert_eq!(
        started,
        ClientEvent::TaskStarted {
            task_id: TaskId::new("t2")
        }
    );
    // The replacement watcher starts from an empty known set.
    let files = wait_for(&mut rx, |e| matches!(e, ClientEvent::Files { .. })).await;
    let ClientEvent::Files { new_files, .. } = files else {
        unreachable!()
    };
    assert_eq!(new_files, vec![file("a/b.md", 120)]);

    let state = handle.shutdown().await.expect("driver finished");
    assert_eq!(state.task().map(|task| task.id().clone()), Some(TaskId::new("t2")));
}
