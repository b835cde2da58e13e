//! Error types for the search coordinator and workers.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for golden-nonce operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring, dispatching or aggregating a search.
///
/// Running out of candidates is not an error: it is reported through
/// [`crate::WorkerResult::NotFound`] and [`crate::Outcome::Exhausted`].
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid run parameters, detected before anything is provisioned.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Confidence-based sizing needs more workers than allowed.
    #[error("unable to satisfy constraints: {needed} workers needed, at most {ceiling} allowed")]
    Infeasible { needed: u64, ceiling: u32 },

    /// Publishing a task failed after `sent` tasks were already published.
    #[error("dispatch aborted after {sent} of {total} tasks: {reason}")]
    Dispatch {
        sent: usize,
        total: usize,
        reason: String,
    },

    /// A queue message is missing an attribute or carries a malformed one.
    #[error("couldn't decode message: {0}")]
    Decode(String),

    /// No definitive answer before the deadline.
    #[error("no answer after {}s ({received} of {expected} workers reported)", .waited.as_secs())]
    Timeout {
        waited: Duration,
        received: usize,
        expected: usize,
    },

    /// Queue transport failure.
    #[error("queue error: {0}")]
    Queue(String),

    /// A worker's scan died before producing a result.
    #[error("worker failed: {0}")]
    Worker(String),

    /// Worker pool provisioning failure.
    #[error("provisioning error: {0}")]
    Provision(String),

    /// The operator interrupted the run.
    #[error("interrupted")]
    Interrupted,
}
