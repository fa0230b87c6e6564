use std::sync::Arc;
use std::time::Duration;

use course_core::{FileListing, KnownFiles, Msg, TaskId};
use engine_logging::engine_debug;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::CourseApi;

/// Periodically lists a task's result files and reports which are new.
///
/// The known-path set lives as long as the watcher, i.e. one task.
pub struct FileWatcher {
    api: Arc<dyn CourseApi>,
    task_id: TaskId,
    initial_delay: Duration,
    interval: Duration,
    known: KnownFiles,
    msg_tx: mpsc::UnboundedSender<Msg>,
}

impl FileWatcher {
    pub fn new(
        api: Arc<dyn CourseApi>,
        task_id: TaskId,
        initial_delay: Duration,
        interval: Duration,
        msg_tx: mpsc::UnboundedSender<Msg>,
    ) -> Self {
        Self {
            api,
            task_id,
            initial_delay,
            interval,
            known: KnownFiles::new(),
            msg_tx,
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let start = Instant::now();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep_until(start + self.initial_delay) => {}
        }
        if !self.check(&cancel).await {
            return;
        }

        let mut ticker = tokio::time::interval_at(start + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            if !self.check(&cancel).await {
                return;
            }
        }
    }

    /// One fetch-diff-report cycle. Returns false once the watcher should stop.
    async fn check(&mut self, cancel: &CancellationToken) -> bool {
        let listed = tokio::select! {
            biased;
            _ = cancel.cancelled() => return false,
            listed = self.api.files(&self.task_id) => listed,
        };
        match listed {
            Ok(listing) => self.report(listing),
            Err(err) => {
                engine_debug!("Error checking files of task {}: {}", self.task_id, err);
                true
            }
        }
    }

    fn report(&mut self, listing: FileListing) -> bool {
        let new_files = self.known.observe(&listing.files);
        if !new_files.is_empty() {
            engine_debug!(
                "Task {} produced {} new file(s)",
                self.task_id,
                new_files.len()
            );
        }
        self.msg_tx
            .send(Msg::FilesObserved {
                task_id: self.task_id.clone(),
                files: listing.files,
                status: listing.status,
                new_files,
            })
            .is_ok()
    }
}
