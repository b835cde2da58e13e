//! Worker count from a time budget and a confidence percentage.
//!
//! Confidence is treated as the fraction of the candidate space the pool
//! should be able to cover before the timeout, scaled linearly. It is not a
//! calibrated probability of finding a nonce.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Hashes per second one worker is assumed to sustain.
pub const DEFAULT_THROUGHPUT: u32 = 470_000;

/// Largest pool the coordinator will ask for.
pub const DEFAULT_MAX_WORKERS: u32 = 31;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizingModel {
    pub throughput_per_worker: u32,
    pub max_workers: u32,
}

impl Default for SizingModel {
    fn default() -> Self {
        Self {
            throughput_per_worker: DEFAULT_THROUGHPUT,
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }
}

impl SizingModel {
    pub fn worker_count(&self, timeout_secs: u64, confidence_percent: u32) -> Result<u32> {
        let needed =
            compute_worker_count(timeout_secs, confidence_percent, self.throughput_per_worker)?;
        if needed > u64::from(self.max_workers) {
            return Err(Error::Infeasible {
                needed,
                ceiling: self.max_workers,
            });
        }
        // Bounded by max_workers above.
        Ok(needed.max(1) as u32)
    }
}

/// `ceil(u32::MAX / throughput / timeout * confidence / 100)`.
///
/// Returns the raw requirement; [`SizingModel::worker_count`] applies the
/// ceiling.
pub fn compute_worker_count(
    timeout_secs: u64,
    confidence_percent: u32,
    throughput_per_worker: u32,
) -> Result<u64> {
    if timeout_secs == 0 {
        return Err(Error::Config("timeout must be greater than 0".into()));
    }
    if confidence_percent == 0 || confidence_percent > 100 {
        return Err(Error::Config(format!(
            "confidence must be in (0, 100], got {confidence_percent}"
        )));
    }
    if throughput_per_worker == 0 {
        return Err(Error::Config("throughput must be greater than 0".into()));
    }

    let seconds_with_one_worker = f64::from(u32::MAX) / f64::from(throughput_per_worker);
    let workers_for_full_coverage = seconds_with_one_worker / timeout_secs as f64;
    let needed = (workers_for_full_coverage * f64::from(confidence_percent) * 0.01).ceil();
    Ok(needed as u64)
}
