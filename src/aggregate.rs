//! Collecting worker results from the output queue.

use crate::config::QueueSettings;
use crate::error::{Error, Result};
use crate::message::{decode_result, result_range};
use crate::queue::{deadline_after, Queue};
use crate::search::WorkerResult;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

/// Definitive answer for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Found {
        nonce: u32,
        hash: String,
        responses: usize,
    },
    /// Every worker reported and none found a nonce.
    Exhausted { responses: usize },
}

pub struct Aggregator<'a, Q> {
    queue: &'a Q,
    settings: QueueSettings,
}

impl<'a, Q: Queue> Aggregator<'a, Q> {
    pub fn new(queue: &'a Q, settings: QueueSettings) -> Self {
        Self { queue, settings }
    }

    /// Poll until a nonce is reported, `expected` distinct failures arrive,
    /// or `timeout` passes.
    ///
    /// Each receive blocks for at most the configured window, clipped to the
    /// time left. Failures that name their range are counted once per range,
    /// so a re-delivered report cannot fake exhaustion; failures without a
    /// range are counted as they arrive.
    pub async fn wait(&self, expected: usize, timeout: Duration) -> Result<Outcome> {
        let deadline = deadline_after(Instant::now(), timeout);
        let mut tally = Tally::default();

        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout {
                    waited: timeout,
                    received: tally.count(),
                    expected,
                });
            }
            let window = self.settings.receive_wait.min(deadline - now);

            let delivery = match self.queue.receive(window, self.settings.lease).await {
                Ok(Some(delivery)) => delivery,
                Ok(None) => {
                    tracing::debug!(received = tally.count(), expected, "waiting for workers");
                    continue;
                }
                Err(err) => {
                    tracing::warn!("something went wrong getting output message: {err}");
                    let pause = self
                        .settings
                        .retry_interval
                        .min(deadline.saturating_duration_since(Instant::now()));
                    tokio::time::sleep(pause).await;
                    continue;
                }
            };

            let decoded = decode_result(&delivery.message)
                .and_then(|result| Ok((result, result_range(&delivery.message)?)));
            if let Err(err) = self.queue.delete(&delivery.receipt).await {
                tracing::warn!("couldn't delete result message: {err}");
            }
            match decoded {
                Ok((WorkerResult::Found { nonce, hash }, _)) => {
                    return Ok(Outcome::Found {
                        nonce,
                        hash,
                        responses: tally.count() + 1,
                    });
                }
                Ok((WorkerResult::NotFound { reason }, range)) => {
                    tracing::info!("worker reported: {reason}");
                    if !tally.record(range) {
                        tracing::debug!(?range, "duplicate failure report ignored");
                    }
                    if tally.count() >= expected {
                        return Ok(Outcome::Exhausted {
                            responses: tally.count(),
                        });
                    }
                }
                Err(err) => tracing::warn!("discarding undecodable result: {err}"),
            }
        }
    }
}

/// Failure reports seen so far.
#[derive(Default)]
struct Tally {
    ranges: HashSet<(u32, u32)>,
    unranged: usize,
}

impl Tally {
    /// Returns false for a range already counted.
    fn record(&mut self, range: Option<(u32, u32)>) -> bool {
        match range {
            Some(range) => self.ranges.insert(range),
            None => {
                self.unranged += 1;
                true
            }
        }
    }

    fn count(&self) -> usize {
        self.ranges.len() + self.unranged
    }
}
