//! Worker runtime: claim a task, scan it, report, acknowledge.

use crate::config::QueueSettings;
use crate::error::{Error, Result};
use crate::message::{decode_task, encode_result};
use crate::queue::Queue;
use crate::search::{Scanner, WorkerResult};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Claimed,
    Computing,
    Reporting,
}

/// How many tasks a worker handles before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMode {
    /// Exit after one task.
    Batch,
    /// Keep claiming tasks until cancelled.
    Service,
}

pub struct Worker<Q> {
    id: usize,
    input: Arc<Q>,
    output: Arc<Q>,
    settings: QueueSettings,
    scanner: Arc<Scanner>,
    state: WorkerState,
}

impl<Q: Queue + 'static> Worker<Q> {
    pub fn new(
        id: usize,
        input: Arc<Q>,
        output: Arc<Q>,
        settings: QueueSettings,
        threads: usize,
    ) -> Self {
        Self {
            id,
            input,
            output,
            settings,
            scanner: Arc::new(Scanner::new(threads)),
            state: WorkerState::Idle,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Flag that stops an in-progress scan once set.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.scanner.cancel_flag()
    }

    /// Handle at most one task.
    ///
    /// `Ok(None)` when nothing arrived within the receive window. A task
    /// that fails to decode is abandoned on the queue and returned as
    /// [`Error::Decode`]; whether it is retried is up to the queue.
    pub async fn run_once(&mut self) -> Result<Option<WorkerResult>> {
        self.state = WorkerState::Idle;
        let Some(delivery) = self
            .input
            .receive(self.settings.receive_wait, self.settings.lease)
            .await?
        else {
            return Ok(None);
        };

        self.state = WorkerState::Claimed;
        let task = match decode_task(&delivery.message) {
            Ok(task) => task,
            Err(err) => {
                tracing::error!(worker = self.id, "couldn't decode task: {err}");
                self.state = WorkerState::Idle;
                return Err(err);
            }
        };
        if delivery.receive_count > 1 {
            tracing::info!(
                worker = self.id,
                receive_count = delivery.receive_count,
                "task re-delivered after lease expiry"
            );
        }
        tracing::info!(worker = self.id, "claimed: {}", task.label);

        self.state = WorkerState::Computing;
        let scanner = Arc::clone(&self.scanner);
        let scanned = tokio::task::spawn_blocking(move || {
            let result = scanner.scan(&task);
            (task, result)
        })
        .await
        .map_err(|e| Error::Worker(format!("scan task failed: {e}")));
        let (task, result) = match scanned {
            Ok((task, Some(result))) => (task, result),
            Ok((_, None)) => {
                self.state = WorkerState::Idle;
                return Err(Error::Interrupted);
            }
            Err(err) => {
                self.state = WorkerState::Idle;
                return Err(err);
            }
        };

        self.state = WorkerState::Reporting;
        match &result {
            WorkerResult::Found { nonce, hash } => {
                tracing::info!(worker = self.id, nonce, %hash, "golden nonce found")
            }
            WorkerResult::NotFound { reason } => tracing::info!(worker = self.id, "{reason}"),
        }
        self.output.send(encode_result(&task, &result)).await?;
        if let Err(err) = self.input.delete(&delivery.receipt).await {
            // The task may run again elsewhere; duplicate results are harmless.
            tracing::warn!(worker = self.id, "couldn't acknowledge task: {err}");
        }

        self.state = WorkerState::Idle;
        Ok(Some(result))
    }

    /// Loop [`Self::run_once`] according to `mode`.
    ///
    /// Receive failures are retried after the configured interval; decode
    /// failures end the worker. Returns the number of tasks processed.
    pub async fn run(&mut self, mode: WorkerMode) -> Result<usize> {
        let mut processed = 0;
        loop {
            match self.run_once().await {
                Ok(Some(_)) => {
                    processed += 1;
                    if mode == WorkerMode::Batch {
                        return Ok(processed);
                    }
                }
                Ok(None) => {}
                Err(err @ (Error::Decode(_) | Error::Interrupted | Error::Worker(_))) => {
                    return Err(err)
                }
                Err(err) => {
                    tracing::warn!(worker = self.id, "queue error, retrying: {err}");
                    tokio::time::sleep(self.settings.retry_interval).await;
                }
            }
        }
    }
}
