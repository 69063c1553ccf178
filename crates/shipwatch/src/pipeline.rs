use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::library::SharedLibrary;
use crate::matcher::match_markers;
use crate::parser::parse_line;
use crate::queue::EventQueue;
use crate::tailer::FileTailer;

/// Counters reported when the pipeline stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub lines_read: u64,
    pub parsed_events: u64,
    pub matches_enqueued: u64,
}

/// Tail → parse → match → enqueue, one line at a time.
pub struct EventPipeline {
    tailer: FileTailer,
    library: SharedLibrary,
    queue: Arc<EventQueue>,
    stats: PipelineStats,
}

impl EventPipeline {
    pub fn new(tailer: FileTailer, library: SharedLibrary, queue: Arc<EventQueue>) -> Self {
        Self {
            tailer,
            library,
            queue,
            stats: PipelineStats::default(),
        }
    }

    /// Runs until the tailer's cancellation token fires.
    pub async fn run(mut self) -> PipelineStats {
        info!(path = %self.tailer.path().display(), "event pipeline started");
        while let Some(line) = self.tailer.next_line().await {
            self.handle_line(&line);
        }
        info!(
            lines_read = self.stats.lines_read,
            parsed_events = self.stats.parsed_events,
            matches_enqueued = self.stats.matches_enqueued,
            "event pipeline stopped"
        );
        self.stats
    }

    /// Starts [`EventPipeline::run`] on the tokio runtime.
    pub fn spawn(self) -> PipelineHandle {
        let cancel = self.tailer.cancellation_token().clone();
        let task = tokio::spawn(self.run());
        PipelineHandle {
            cancel,
            task: Some(task),
        }
    }

    fn handle_line(&mut self, line: &str) {
        self.stats.lines_read += 1;
        let Some(event) = parse_line(line) else {
            return;
        };
        self.stats.parsed_events += 1;

        let result = {
            let library = self.library.read();
            match_markers(&event.markers, event.is_snapshot, &library)
        };

        match result {
            Some(result) => {
                info!(
                    ship = %result.ship,
                    confidence = result.confidence,
                    is_snapshot = result.is_snapshot,
                    "matched ship"
                );
                self.queue.push(result);
                self.stats.matches_enqueued += 1;
            }
            None => {
                debug!(markers = ?event.markers, "markers matched no ship");
            }
        }
    }
}

/// Owner of a running pipeline task.
///
/// Dropping the handle cancels the task; [`PipelineHandle::shutdown`] also
/// waits for it to finish.
#[derive(Debug)]
pub struct PipelineHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<PipelineStats>>,
}

impl PipelineHandle {
    /// Cancels the pipeline and waits for it to stop.
    pub async fn shutdown(mut self) -> Result<PipelineStats, JoinError> {
        self.cancel.cancel();
        match self.task.take() {
            Some(task) => task.await,
            None => Ok(PipelineStats::default()),
        }
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, time::Duration};

    use parking_lot::RwLock;

    use super::*;
    use crate::library::SignatureLibrary;
    use crate::tailer::TailOptions;

    #[tokio::test]
    async fn matched_lines_reach_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("Game.log");
        std::fs::write(&log, "room_bridge before start\n").unwrap();

        let library = Arc::new(RwLock::new(
            SignatureLibrary::parse("Carrack\nroom_bridge\nroom_medbay\n").unwrap(),
        ));
        let queue = Arc::new(EventQueue::new(16));
        let options = TailOptions {
            poll_interval: Duration::from_millis(10),
            ..TailOptions::default()
        };
        let tailer = FileTailer::open(&log, options, CancellationToken::new())
            .await
            .unwrap();
        let handle = EventPipeline::new(tailer, library, Arc::clone(&queue)).spawn();

        {
            let mut file = std::fs::OpenOptions::new().append(true).open(&log).unwrap();
            file.write_all(b"noise\nroom_unknown\nInitial Snapshot room_bridge\n")
                .unwrap();
        }

        let result = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(result) = queue.try_pop() {
                    return result;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert_eq!(result.ship, "(S) Carrack");
        assert_eq!(result.confidence, 0.5);

        let stats = handle.shutdown().await.unwrap();
        assert_eq!(
            stats,
            PipelineStats {
                lines_read: 3,
                parsed_events: 2,
                matches_enqueued: 1,
            }
        );
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn dropping_the_handle_stops_the_task() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("Game.log");
        std::fs::write(&log, "").unwrap();

        let library = Arc::new(RwLock::new(SignatureLibrary::new()));
        let queue = Arc::new(EventQueue::new(4));
        let options = TailOptions {
            poll_interval: Duration::from_secs(3600),
            ..TailOptions::default()
        };
        let tailer = FileTailer::open(&log, options, CancellationToken::new())
            .await
            .unwrap();
        drop(EventPipeline::new(tailer, Arc::clone(&library), Arc::clone(&queue)).spawn());

        tokio::time::timeout(Duration::from_secs(5), async {
            while Arc::strong_count(&library) > 1 || Arc::strong_count(&queue) > 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("pipeline task released the library and queue");
    }
}
