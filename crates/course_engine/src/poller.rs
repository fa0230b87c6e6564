use std::sync::Arc;
use std::time::Duration;

use course_core::{Msg, TaskId};
use engine_logging::{engine_info, engine_warn};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::CourseApi;

/// Fetches task status on a fixed interval until a terminal status is seen.
///
/// Failed fetches are logged and retried on the next tick.
pub struct StatusPoller {
    api: Arc<dyn CourseApi>,
    task_id: TaskId,
    interval: Duration,
    msg_tx: mpsc::UnboundedSender<Msg>,
}

impl StatusPoller {
    pub fn new(
        api: Arc<dyn CourseApi>,
        task_id: TaskId,
        interval: Duration,
        msg_tx: mpsc::UnboundedSender<Msg>,
    ) -> Self {
        Self {
            api,
            task_id,
            interval,
            msg_tx,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                polled = self.api.status(&self.task_id) => polled,
            };

            match polled {
                Ok(snapshot) => {
                    let terminal = snapshot.status.is_terminal();
                    let status = snapshot.status.clone();
                    let sent = self.msg_tx.send(Msg::StatusPolled {
                        task_id: self.task_id.clone(),
                        snapshot,
                    });
                    if sent.is_err() {
                        return;
                    }
                    if terminal {
                        engine_info!(
                            "Task {} reached {}; status polling stopped",
                            self.task_id,
                            status
                        );
                        return;
                    }
                }
                Err(err) => {
                    engine_warn!("Error polling status of task {}: {}", self.task_id, err);
                }
            }
        }
    }
}
