use std::sync::Arc;
use std::time::Duration;

use course_core::{LogEvent, Msg, StreamNotice, TaskId};
use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::CourseApi;
use crate::decode::{decode_line, LineOutcome};
use crate::framer::LineFramer;
use crate::settings::Timings;
use crate::ApiError;

/// How one connection attempt ended.
#[derive(Debug)]
enum StreamExit {
    /// The backend sent `complete`.
    Completed,
    /// The body ended cleanly.
    Ended,
    Cancelled,
    Failed(ApiError),
}

/// Reads the chunked log endpoint of one task and forwards what it decodes.
///
/// Transport failures schedule a single reconnect after `reconnect_delay`;
/// there is no retry cap. Cancelling the token aborts the in-flight request
/// and any scheduled reconnect, and is never reported as a failure.
pub struct LogStreamReader {
    api: Arc<dyn CourseApi>,
    task_id: TaskId,
    start_delay: Duration,
    reconnect_delay: Duration,
    inactivity_threshold: Duration,
    msg_tx: mpsc::UnboundedSender<Msg>,
}

impl LogStreamReader {
    pub fn new(
        api: Arc<dyn CourseApi>,
        task_id: TaskId,
        timings: &Timings,
        msg_tx: mpsc::UnboundedSender<Msg>,
    ) -> Self {
        Self {
            api,
            task_id,
            start_delay: Duration::ZERO,
            reconnect_delay: timings.reconnect_delay,
            inactivity_threshold: timings.inactivity_threshold,
            msg_tx,
        }
    }

    /// Wait this long before the first connection attempt.
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub async fn run(self, cancel: CancellationToken) {
        if !self.start_delay.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.start_delay) => {}
            }
        }

        loop {
            match self.connect_once(&cancel).await {
                StreamExit::Completed | StreamExit::Ended => return,
                StreamExit::Cancelled => {
                    engine_debug!("Log stream for task {} cancelled", self.task_id);
                    return;
                }
                StreamExit::Failed(err) => {
                    engine_warn!("Log stream for task {} failed: {}", self.task_id, err);
                    self.notify(StreamNotice::ConnectFailed(err.to_string()));
                    self.notify(StreamNotice::Reconnecting);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            engine_debug!("Reconnect for task {} abandoned", self.task_id);
                            return;
                        }
                        _ = tokio::time::sleep(self.reconnect_delay) => {}
                    }
                }
            }
        }
    }

    async fn connect_once(&self, cancel: &CancellationToken) -> StreamExit {
        self.notify(StreamNotice::Connecting);
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return StreamExit::Cancelled,
            opened = self.api.open_log_stream(&self.task_id) => opened,
        };
        let mut body = match opened {
            Ok(body) => body,
            Err(err) => return StreamExit::Failed(err),
        };
        engine_info!("Log stream for task {} open", self.task_id);

        let mut framer = LineFramer::new();
        let mut received = 0usize;
        let mut warned = false;
        let inactivity = tokio::time::sleep(self.inactivity_threshold);
        tokio::pin!(inactivity);

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => return StreamExit::Cancelled,
                _ = &mut inactivity, if !warned && received == 0 => {
                    warned = true;
                    engine_warn!(
                        "No log records for task {} after {:?}",
                        self.task_id,
                        self.inactivity_threshold
                    );
                    self.notify(StreamNotice::Inactive);
                    continue;
                }
                chunk = body.next() => chunk,
            };

            let bytes = match chunk {
                Some(Ok(bytes)) => bytes,
                Some(Err(err)) => return StreamExit::Failed(err),
                None => {
                    engine_info!("Log stream for task {} ended", self.task_id);
                    self.notify(StreamNotice::Ended);
                    return StreamExit::Ended;
                }
            };

            for line in framer.push(&bytes) {
                match decode_line(&line) {
                    LineOutcome::Event(event) => {
                        received += 1;
                        if self.dispatch(event) {
                            return StreamExit::Completed;
                        }
                    }
                    LineOutcome::ParseError(excerpt) => {
                        self.notify(StreamNotice::ParseError(excerpt));
                    }
                    LineOutcome::Skipped => {}
                }
            }
        }
    }

    /// Forward one event. Returns true when the stream must close.
    fn dispatch(&self, event: LogEvent) -> bool {
        match event {
            LogEvent::Log { message } => self.notify(StreamNotice::Log(message)),
            LogEvent::Connected { .. } => self.notify(StreamNotice::Connected),
            LogEvent::Complete { .. } => {
                self.notify(StreamNotice::Completed);
                return true;
            }
            LogEvent::Error { message } => self.notify(StreamNotice::ServerError(message)),
            LogEvent::Heartbeat | LogEvent::Unknown => {}
        }
        false
    }

    fn notify(&self, notice: StreamNotice) {
        let _ = self.msg_tx.send(Msg::Stream {
            task_id: self.task_id.clone(),
            notice,
        });
    }
}
