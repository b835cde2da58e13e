//! Publishing search tasks onto the input queue.

use crate::error::{Error, Result};
use crate::message::encode_task;
use crate::queue::Queue;
use crate::search::SearchTask;

/// Send one message per task, in order. The first failure aborts the rest;
/// tasks already sent stay on the queue and the error says how many.
pub async fn dispatch<Q: Queue>(tasks: &[SearchTask], queue: &Q) -> Result<usize> {
    let total = tasks.len();
    for (sent, task) in tasks.iter().enumerate() {
        let message = encode_task(task).map_err(|e| Error::Dispatch {
            sent,
            total,
            reason: e.to_string(),
        })?;
        queue.send(message).await.map_err(|e| Error::Dispatch {
            sent,
            total,
            reason: e.to_string(),
        })?;
        tracing::debug!(lower = task.lower, upper = task.upper, "dispatched task");
    }
    tracing::info!("dispatched {total} tasks");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::decode_task;
    use crate::partition::tasks_for;
    use crate::queue::{Delivery, MemoryQueue, Message};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Accepts `limit` messages, then fails every send.
    struct FlakyQueue {
        inner: MemoryQueue,
        limit: usize,
        sent: AtomicUsize,
    }

    impl Queue for FlakyQueue {
        async fn send(&self, message: Message) -> Result<()> {
            if self.sent.fetch_add(1, Ordering::SeqCst) >= self.limit {
                return Err(Error::Queue("connection reset".into()));
            }
            self.inner.send(message).await
        }

        async fn receive(&self, wait: Duration, lease: Duration) -> Result<Option<Delivery>> {
            self.inner.receive(wait, lease).await
        }

        async fn delete(&self, receipt: &str) -> Result<()> {
            self.inner.delete(receipt).await
        }

        async fn purge(&self) -> Result<()> {
            self.inner.purge().await
        }
    }

    #[tokio::test]
    async fn one_message_per_task() {
        let queue = MemoryQueue::new("input");
        let tasks = tasks_for(b"COMSM0010cloud", 8, 5).unwrap();
        assert_eq!(dispatch(&tasks, &queue).await.unwrap(), 5);
        assert_eq!(queue.visible(), 5);

        let mut seen = Vec::new();
        while let Some(d) = queue.receive(Duration::ZERO, Duration::from_secs(5)).await.unwrap() {
            seen.push(decode_task(&d.message).unwrap());
        }
        assert_eq!(seen, tasks);
    }

    #[tokio::test]
    async fn failure_aborts_remaining_sends() {
        let queue = FlakyQueue {
            inner: MemoryQueue::new("input"),
            limit: 2,
            sent: AtomicUsize::new(0),
        };
        let tasks = tasks_for(b"abc", 4, 4).unwrap();
        match dispatch(&tasks, &queue).await {
            Err(Error::Dispatch { sent, total, reason }) => {
                assert_eq!(sent, 2);
                assert_eq!(total, 4);
                assert!(reason.contains("connection reset"));
            }
            other => panic!("expected dispatch error, got {other:?}"),
        }
        assert_eq!(queue.inner.visible(), 2);
        assert_eq!(queue.sent.load(Ordering::SeqCst), 3);
    }
}
