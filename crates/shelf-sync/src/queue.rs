use std::future::Future;

use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, oneshot};

type Job = BoxFuture<'static, ()>;

/// Single-worker task queue serializing every operation against the library
/// directories.
///
/// Submissions run strictly in submission order, one at a time; this is the
/// sole concurrency-safety mechanism for the library root. Each queue owns
/// its own worker task, so independent [`crate::library::Library`] values
/// (for example in tests) never share serialization state. Dropping the
/// queue closes the channel; the worker finishes the in-flight job and
/// exits.
pub struct UpdateQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl UpdateQueue {
    /// Create the queue and spawn its worker task.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job.await;
            }
        });
        Self { tx }
    }

    /// Submit a task for serialized execution and receive its result later.
    ///
    /// The returned receiver resolves once the task has run to completion on
    /// the worker; it yields an error only when the worker is gone.
    pub fn submit<T, F>(&self, task: F) -> oneshot::Receiver<T>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            // The submitter may have stopped waiting; that is not an error.
            let _ = done_tx.send(task.await);
        });
        if self.tx.send(job).is_err() {
            log::error!("Update queue worker is gone; task dropped");
        }
        done_rx
    }
}

impl Default for UpdateQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::UpdateQueue;

    #[tokio::test]
    async fn submissions_run_in_order_without_interleaving() {
        let queue = UpdateQueue::new();
        let events: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let first_events = Arc::clone(&events);
        let first = queue.submit(async move {
            first_events.lock().expect("lock should not be poisoned").push("first start");
            tokio::time::sleep(Duration::from_millis(50)).await;
            first_events.lock().expect("lock should not be poisoned").push("first end");
        });

        let second_events = Arc::clone(&events);
        let second = queue.submit(async move {
            second_events.lock().expect("lock should not be poisoned").push("second start");
            second_events.lock().expect("lock should not be poisoned").push("second end");
        });

        first.await.expect("first task should complete");
        second.await.expect("second task should complete");

        let recorded = events.lock().expect("lock should not be poisoned").clone();
        assert_eq!(
            recorded,
            vec!["first start", "first end", "second start", "second end"]
        );
    }

    #[tokio::test]
    async fn results_are_delivered_to_the_submitter() {
        let queue = UpdateQueue::new();

        let result = queue.submit(async { 21 * 2 });

        assert_eq!(result.await.expect("task should complete"), 42);
    }

    #[tokio::test]
    async fn a_failed_task_does_not_kill_the_worker() {
        let queue = UpdateQueue::new();

        let failure: Result<(), String> =
            queue.submit(async { Err("download failed".to_string()) })
                .await
                .expect("task should complete");
        assert!(failure.is_err());

        let after = queue.submit(async { "still alive" });
        assert_eq!(after.await.expect("worker should still run tasks"), "still alive");
    }
}
