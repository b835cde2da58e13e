//! Run configuration and its validation.

use crate::error::{Error, Result};
use crate::score::MAX_SCORE;
use crate::sizing::SizingModel;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BLOCK: &str = "COMSM0010cloud";
pub const DEFAULT_LEADING_ZEROS: u32 = 20;
pub const DEFAULT_TIMEOUT_SECS: u64 = 360;
pub const DEFAULT_CONFIDENCE: u32 = 95;

/// How the pool size is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolMode {
    /// Explicit worker count.
    Direct { workers: u32 },
    /// Derived from a confidence percentage through [`SizingModel`].
    Indirect { confidence: u32 },
}

/// Validated parameters of one coordinated search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerPoolConfig {
    pub payload: String,
    pub target: u32,
    pub timeout_secs: u64,
    pub worker_count: u32,
    pub confidence: u32,
}

impl WorkerPoolConfig {
    pub fn new(
        payload: impl Into<String>,
        target: u32,
        timeout_secs: u64,
        mode: PoolMode,
        sizing: &SizingModel,
    ) -> Result<Self> {
        let payload = payload.into();
        if payload.is_empty() {
            return Err(Error::Config("data block must be non empty".into()));
        }
        if target == 0 || target > MAX_SCORE {
            return Err(Error::Config(format!(
                "leading zeros must be in [1, {MAX_SCORE}], got {target}"
            )));
        }
        if timeout_secs == 0 {
            return Err(Error::Config("timeout must be greater than 0".into()));
        }

        let (worker_count, confidence) = match mode {
            PoolMode::Direct { workers } => {
                if workers == 0 || workers > sizing.max_workers {
                    return Err(Error::Config(format!(
                        "number of workers must be in [1, {}], got {workers}",
                        sizing.max_workers
                    )));
                }
                (workers, 100)
            }
            PoolMode::Indirect { confidence } => {
                (sizing.worker_count(timeout_secs, confidence)?, confidence)
            }
        };

        Ok(Self {
            payload,
            target,
            timeout_secs,
            worker_count,
            confidence,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn log(&self) {
        tracing::info!(
            block = %self.payload,
            timeout_secs = self.timeout_secs,
            leading_zeros = self.target,
            workers = self.worker_count,
            confidence = self.confidence,
            "configuration"
        );
    }
}

/// Queue timing knobs shared by the dispatcher, workers and aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSettings {
    /// How long a claimed message stays invisible to other consumers.
    pub lease: Duration,
    /// Upper bound on a single blocking receive.
    pub receive_wait: Duration,
    /// Pause after a failed receive before polling again.
    pub retry_interval: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(600),
            receive_wait: Duration::from_secs(10),
            retry_interval: Duration::from_secs(10),
        }
    }
}
