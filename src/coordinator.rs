//! One coordinated search from validated config to outcome.

use crate::aggregate::{Aggregator, Outcome};
use crate::config::{QueueSettings, WorkerPoolConfig};
use crate::dispatch::dispatch;
use crate::error::{Error, Result};
use crate::partition::tasks_for;
use crate::provision::Provisioner;
use crate::queue::Queue;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct Coordinator<Q, P> {
    input: Arc<Q>,
    output: Arc<Q>,
    provisioner: P,
    settings: QueueSettings,
}

impl<Q: Queue, P: Provisioner> Coordinator<Q, P> {
    pub fn new(input: Arc<Q>, output: Arc<Q>, provisioner: P, settings: QueueSettings) -> Self {
        Self {
            input,
            output,
            provisioner,
            settings,
        }
    }

    /// Partition, provision, dispatch and wait for an answer.
    ///
    /// `shutdown` resolving during dispatch or the wait aborts the run with
    /// [`Error::Interrupted`]. Once workers are provisioned, every exit path
    /// tears them down and purges both queues before returning.
    pub async fn run<S>(&self, config: &WorkerPoolConfig, shutdown: S) -> Result<Outcome>
    where
        S: Future<Output = ()>,
    {
        config.log();
        let tasks = tasks_for(config.payload.as_bytes(), config.target, config.worker_count)?;

        let pool = match self.provisioner.provision(config.worker_count).await {
            Ok(pool) => pool,
            Err(err) => {
                let teardown = Teardown::new(self, None);
                teardown.run().await;
                return Err(err);
            }
        };
        let teardown = Teardown::new(self, Some(&pool));

        let work = async {
            dispatch(&tasks, self.input.as_ref()).await?;
            Aggregator::new(self.output.as_ref(), self.settings)
                .wait(tasks.len(), config.timeout())
                .await
        };
        let outcome = tokio::select! {
            outcome = work => outcome,
            _ = shutdown => {
                tracing::info!("received shutdown signal");
                Err(Error::Interrupted)
            }
        };

        teardown.run().await;
        outcome
    }
}

/// Best-effort, run-once cleanup of the pool and both queues.
struct Teardown<'a, Q, P: Provisioner> {
    coordinator: &'a Coordinator<Q, P>,
    pool: Option<&'a P::Handle>,
    done: AtomicBool,
}

impl<'a, Q: Queue, P: Provisioner> Teardown<'a, Q, P> {
    fn new(coordinator: &'a Coordinator<Q, P>, pool: Option<&'a P::Handle>) -> Self {
        Self {
            coordinator,
            pool,
            done: AtomicBool::new(false),
        }
    }

    /// Every step runs even if an earlier one fails; failures are logged.
    async fn run(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!("cleaning up");
        if let Some(pool) = self.pool {
            if let Err(err) = self.coordinator.provisioner.teardown(pool).await {
                tracing::warn!("couldn't tear down workers: {err}");
            }
        }
        if let Err(err) = self.coordinator.input.purge().await {
            tracing::warn!("couldn't clear input queue: {err}");
        }
        if let Err(err) = self.coordinator.output.purge().await {
            tracing::warn!("couldn't clear output queue: {err}");
        }
    }
}
