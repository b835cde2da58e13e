//! Splitting the 32-bit candidate space across workers.

use crate::error::{Error, Result};
use crate::search::SearchTask;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub index: u32,
    pub lower: u32,
    pub upper: u32,
}

impl Partition {
    pub fn width(&self) -> u64 {
        u64::from(self.upper) - u64::from(self.lower)
    }

    pub fn to_task(self, payload: &[u8], target: u32) -> Result<SearchTask> {
        Ok(SearchTask::new(payload.to_vec(), self.lower, self.upper, target)?.with_label(format!(
            "worker {}: compute if golden nonce exists between {} and {}",
            self.index, self.lower, self.upper
        )))
    }
}

/// Contiguous ranges of width `u32::MAX / worker_count`; the last range ends
/// at `u32::MAX` and absorbs the division remainder.
pub fn partition(worker_count: u32) -> Result<Vec<Partition>> {
    if worker_count == 0 {
        return Err(Error::Config("worker count must be at least 1".into()));
    }
    let split = u32::MAX / worker_count;
    let ranges = (0..worker_count)
        .map(|i| Partition {
            index: i,
            lower: i * split,
            upper: if i == worker_count - 1 {
                u32::MAX
            } else {
                (i + 1) * split
            },
        })
        .collect();
    Ok(ranges)
}

/// One [`SearchTask`] per partition.
pub fn tasks_for(payload: &[u8], target: u32, worker_count: u32) -> Result<Vec<SearchTask>> {
    partition(worker_count)?
        .into_iter()
        .map(|p| p.to_task(payload, target))
        .collect()
}
