#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use course_core::{
    CourseRequest, FileEntry, FileListing, Msg, StatusSnapshot, StreamNotice, SubmitResponse,
    TaskId,
};
use course_engine::{ApiError, ByteStream, CourseApi, FailureKind};
use futures_util::stream::{self, StreamExt};
use tokio::sync::mpsc;

/// How a scripted log connection behaves.
pub enum StreamScript {
    /// `open_log_stream` itself fails.
    Refuse(ApiError),
    /// The body yields `chunks`, then behaves according to `tail`.
    Body { chunks: Vec<Vec<u8>>, tail: Tail },
}

pub enum Tail {
    End,
    Hang,
    Fail(ApiError),
}

/// Scripted backend. Status and listing scripts repeat their last entry once
/// exhausted; log connections are consumed one per open.
#[derive(Default)]
pub struct FakeApi {
    statuses: Mutex<VecDeque<Result<StatusSnapshot, ApiError>>>,
    listings: Mutex<VecDeque<Result<FileListing, ApiError>>>,
    streams: Mutex<VecDeque<StreamScript>>,
    submit_response: Mutex<Option<Result<SubmitResponse, ApiError>>>,
    pub status_calls: AtomicUsize,
    pub files_calls: AtomicUsize,
    pub stream_opens: AtomicUsize,
    pub submit_calls: AtomicUsize,
    pub chunks_read: Arc<AtomicUsize>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statuses(self, statuses: Vec<Result<StatusSnapshot, ApiError>>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    pub fn with_listings(self, listings: Vec<Result<FileListing, ApiError>>) -> Self {
        *self.listings.lock().unwrap() = listings.into();
        self
    }

    pub fn with_streams(self, streams: Vec<StreamScript>) -> Self {
        *self.streams.lock().unwrap() = streams.into();
        self
    }

    pub fn with_submit(self, response: Result<SubmitResponse, ApiError>) -> Self {
        *self.submit_response.lock().unwrap() = Some(response);
        self
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn files_calls(&self) -> usize {
        self.files_calls.load(Ordering::SeqCst)
    }

    pub fn stream_opens(&self) -> usize {
        self.stream_opens.load(Ordering::SeqCst)
    }

    pub fn chunks_read(&self) -> usize {
        self.chunks_read.load(Ordering::SeqCst)
    }
}

fn next_scripted<T: Clone>(queue: &Mutex<VecDeque<Result<T, ApiError>>>) -> Result<T, ApiError> {
    let mut queue = queue.lock().unwrap();
    if queue.len() > 1 {
        return queue.pop_front().unwrap();
    }
    queue
        .front()
        .cloned()
        .unwrap_or_else(|| Err(network_error("nothing scripted")))
}

#[async_trait::async_trait]
impl CourseApi for FakeApi {
    async fn status(&self, _task_id: &TaskId) -> Result<StatusSnapshot, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        next_scripted(&self.statuses)
    }

    async fn files(&self, _task_id: &TaskId) -> Result<FileListing, ApiError> {
        self.files_calls.fetch_add(1, Ordering::SeqCst);
        next_scripted(&self.listings)
    }

    async fn open_log_stream(&self, _task_id: &TaskId) -> Result<ByteStream, ApiError> {
        self.stream_opens.fetch_add(1, Ordering::SeqCst);
        let script = self.streams.lock().unwrap().pop_front().unwrap_or(StreamScript::Body {
            chunks: Vec::new(),
            tail: Tail::Hang,
        });
        let (chunks, tail) = match script {
            StreamScript::Refuse(err) => return Err(err),
            StreamScript::Body { chunks, tail } => (chunks, tail),
        };

        let counter = self.chunks_read.clone();
        let body = stream::iter(chunks.into_iter().map(|chunk| Ok(Bytes::from(chunk))));
        let tail: ByteStream = match tail {
            Tail::End => stream::empty().boxed(),
            Tail::Hang => stream::pending().boxed(),
            Tail::Fail(err) => stream::once(async move { Err(err) }).boxed(),
        };
        Ok(body
            .chain(tail)
            .inspect(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .boxed())
    }

    async fn submit(&self, _request: &CourseRequest) -> Result<SubmitResponse, ApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.submit_response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(network_error("nothing scripted")))
    }
}

pub fn network_error(message: &str) -> ApiError {
    ApiError::new(FailureKind::Network, message)
}

pub fn file(path: &str, size: u64) -> FileEntry {
    FileEntry {
        path: path.to_string(),
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        size,
        file_type: path
            .rfind('.')
            .map(|dot| path[dot..].to_string())
            .unwrap_or_default(),
        modified: None,
    }
}

pub fn record(json: &str) -> Vec<u8> {
    format!("data: {json}\n\n").into_bytes()
}

/// Next stream notice, skipping other messages.
pub async fn next_notice(rx: &mut mpsc::UnboundedReceiver<Msg>) -> Option<StreamNotice> {
    while let Some(msg) = rx.recv().await {
        if let Msg::Stream { notice, .. } = msg {
            return Some(notice);
        }
    }
    None
}

/// Drain everything currently queued.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Msg>) -> Vec<Msg> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

pub fn init_logging() {
    engine_logging::initialize_for_tests();
}
