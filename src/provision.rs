//! Worker pool provisioning.
//!
//! Real deployments start machines or containers behind [`Provisioner`];
//! [`LocalProvisioner`] runs the workers as tokio tasks in this process.

use crate::config::QueueSettings;
use crate::error::{Error, Result};
use crate::queue::Queue;
use crate::worker::{Worker, WorkerMode};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub trait Provisioner: Send + Sync {
    type Handle: Send + Sync;

    fn provision(&self, count: u32) -> impl Future<Output = Result<Self::Handle>> + Send;

    /// Release everything behind `handle`. Calling it again must be safe.
    fn teardown(&self, handle: &Self::Handle) -> impl Future<Output = Result<()>> + Send;
}

/// Workers started by [`LocalProvisioner`].
pub struct LocalPool {
    count: u32,
    workers: Vec<(JoinHandle<()>, Arc<AtomicBool>)>,
    stopped: AtomicBool,
}

impl LocalPool {
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Workers whose task has not completed yet. An aborted worker counts
    /// until the runtime has dropped it.
    pub fn running(&self) -> usize {
        self.workers.iter().filter(|(h, _)| !h.is_finished()).count()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

pub struct LocalProvisioner<Q> {
    input: Arc<Q>,
    output: Arc<Q>,
    settings: QueueSettings,
    threads_per_worker: usize,
    mode: WorkerMode,
}

impl<Q: Queue + 'static> LocalProvisioner<Q> {
    pub fn new(input: Arc<Q>, output: Arc<Q>, settings: QueueSettings) -> Self {
        Self {
            input,
            output,
            settings,
            threads_per_worker: 1,
            mode: WorkerMode::Batch,
        }
    }

    pub fn with_threads(mut self, threads_per_worker: usize) -> Self {
        self.threads_per_worker = threads_per_worker.max(1);
        self
    }

    pub fn with_mode(mut self, mode: WorkerMode) -> Self {
        self.mode = mode;
        self
    }
}

impl<Q: Queue + 'static> Provisioner for LocalProvisioner<Q> {
    type Handle = LocalPool;

    async fn provision(&self, count: u32) -> Result<LocalPool> {
        if count == 0 {
            return Err(Error::Provision("refusing to start an empty pool".into()));
        }
        let mut workers = Vec::with_capacity(count as usize);
        for id in 0..count as usize {
            let mut worker = Worker::new(
                id,
                Arc::clone(&self.input),
                Arc::clone(&self.output),
                self.settings,
                self.threads_per_worker,
            );
            let cancel = worker.cancel_flag();
            let mode = self.mode;
            let handle = tokio::spawn(async move {
                match worker.run(mode).await {
                    Ok(processed) => tracing::debug!(worker = id, processed, "worker finished"),
                    Err(err) => tracing::warn!(worker = id, "worker stopped: {err}"),
                }
            });
            workers.push((handle, cancel));
        }
        tracing::info!(
            count,
            threads_per_worker = self.threads_per_worker,
            "started local workers"
        );
        Ok(LocalPool {
            count,
            workers,
            stopped: AtomicBool::new(false),
        })
    }

    async fn teardown(&self, pool: &LocalPool) -> Result<()> {
        if pool.stopped.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        for (handle, cancel) in &pool.workers {
            cancel.store(true, Ordering::Release);
            handle.abort();
        }
        tracing::info!(count = pool.workers.len(), "stopped local workers");
        Ok(())
    }
}
