//! Sequential and rayon-backed scans over a candidate range.

use crate::error::{Error, Result};
use crate::score::{double_hash, leading_zero_bits, MAX_SCORE};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One unit of work: scan `[lower, upper)` of the candidate space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTask {
    pub payload: Vec<u8>,
    pub lower: u32,
    pub upper: u32,
    pub target: u32,
    pub label: String,
}

impl SearchTask {
    pub fn new(payload: impl Into<Vec<u8>>, lower: u32, upper: u32, target: u32) -> Result<Self> {
        if lower >= upper {
            return Err(Error::Config(format!(
                "empty range: lower bound {lower} must be below upper bound {upper}"
            )));
        }
        if target > MAX_SCORE {
            return Err(Error::Config(format!(
                "target {target} exceeds the {MAX_SCORE}-bit hash length"
            )));
        }
        Ok(Self {
            payload: payload.into(),
            lower,
            upper,
            target,
            label: format!(
                "Compute if golden nonce exists between {} and {}",
                lower, upper
            ),
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn width(&self) -> u64 {
        u64::from(self.upper) - u64::from(self.lower)
    }
}

/// What a worker reports for a claimed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerResult {
    Found { nonce: u32, hash: String },
    NotFound { reason: String },
}

impl WorkerResult {
    pub fn is_found(&self) -> bool {
        matches!(self, WorkerResult::Found { .. })
    }

    fn exhausted(lower: u32, upper: u32, target: u32) -> Self {
        WorkerResult::NotFound {
            reason: format!(
                "No nonce found of length {} between {} and {}",
                target, lower, upper
            ),
        }
    }
}

/// Scan `[lower, upper)` in increasing order; the smallest hit wins.
pub fn search(payload: &[u8], lower: u32, upper: u32, target: u32) -> WorkerResult {
    for candidate in lower..upper {
        let hash = double_hash(payload, candidate);
        if leading_zero_bits(&hash) >= target {
            return WorkerResult::Found {
                nonce: candidate,
                hash: hex::encode(hash),
            };
        }
    }
    WorkerResult::exhausted(lower, upper, target)
}

/// Candidates checked between two looks at the cancel flag, per thread.
const SCAN_BATCH: u64 = 1 << 16;

/// Range scanner with an optional rayon pool and a cancel flag.
///
/// Scans in batches so a cancel request lands within one batch. Inside a
/// batch `find_first` keeps the smallest matching candidate even when a
/// higher one is hit first by another thread.
pub struct Scanner {
    pool: Option<ThreadPool>,
    threads: usize,
    cancel: Arc<AtomicBool>,
}

impl Scanner {
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(1);
        let pool = if threads > 1 {
            match ThreadPoolBuilder::new().num_threads(threads).build() {
                Ok(pool) => Some(pool),
                Err(err) => {
                    tracing::warn!(
                        "failed to build rayon thread pool, scanning sequentially: {err}"
                    );
                    None
                }
            }
        } else {
            None
        };
        let threads = if pool.is_some() { threads } else { 1 };
        Self {
            pool,
            threads,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Setting the flag makes in-progress and future scans return `None`.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Same contract as [`search`]; `None` means the scan was cancelled.
    pub fn scan(&self, task: &SearchTask) -> Option<WorkerResult> {
        let payload = task.payload.as_slice();
        let target = task.target;
        let meets = |candidate: u32| leading_zero_bits(&double_hash(payload, candidate)) >= target;
        let batch = SCAN_BATCH * self.threads as u64;

        let mut start = task.lower;
        while start < task.upper {
            if self.cancel.load(Ordering::Acquire) {
                return None;
            }
            let end = (u64::from(start) + batch).min(u64::from(task.upper)) as u32;
            let hit = match &self.pool {
                Some(pool) => {
                    pool.install(|| (start..end).into_par_iter().find_first(|&c| meets(c)))
                }
                None => (start..end).find(|&c| meets(c)),
            };
            if let Some(nonce) = hit {
                return Some(WorkerResult::Found {
                    nonce,
                    hash: hex::encode(double_hash(payload, nonce)),
                });
            }
            start = end;
        }
        Some(WorkerResult::exhausted(task.lower, task.upper, task.target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOLDEN_HASH: &str = "00f9a29f36ecb8fe8cab25143a7c4aafb3a996f23182f03177e3e670b6177dd5";

    #[test]
    fn golden_fixture() {
        let result = search(b"COMSM0010cloud", 0, 1000, 8);
        assert_eq!(
            result,
            WorkerResult::Found {
                nonce: 330,
                hash: GOLDEN_HASH.to_string(),
            }
        );
    }

    #[test]
    fn first_match_wins() {
        // 330, 366, 444 and 694 all reach 8 bits; the lowest must be returned.
        match search(b"COMSM0010cloud", 331, 1000, 8) {
            WorkerResult::Found { nonce, .. } => assert_eq!(nonce, 366),
            other => panic!("expected a hit, got {other:?}"),
        }
        match search(b"COMSM0010cloud", 0, 1000, 11) {
            WorkerResult::Found { nonce, .. } => assert_eq!(nonce, 694),
            other => panic!("expected a hit, got {other:?}"),
        }
    }

    #[test]
    fn exhaustion_is_not_found() {
        match search(b"COMSM0010cloud", 0, 330, 8) {
            WorkerResult::NotFound { reason } => {
                assert!(reason.contains('8'));
                assert!(reason.contains("between 0 and 330"));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn empty_range_is_exhausted() {
        assert!(!search(b"abc", 10, 10, 0).is_found());
    }

    #[test]
    fn target_zero_matches_lower_bound() {
        match search(b"abc", 42, 50, 0) {
            WorkerResult::Found { nonce, hash } => {
                assert_eq!(nonce, 42);
                assert_eq!(hash.len(), 64);
            }
            other => panic!("expected a hit, got {other:?}"),
        }
    }

    #[test]
    fn parallel_keeps_first_match_priority() {
        let scanner = Scanner::new(4);
        let task = SearchTask::new(b"COMSM0010cloud".to_vec(), 0, 1000, 8).unwrap();
        assert_eq!(scanner.scan(&task), Some(search(&task.payload, 0, 1000, 8)));

        let task = SearchTask::new(b"abc".to_vec(), 0, 5000, 10).unwrap();
        match Scanner::new(3).scan(&task) {
            Some(WorkerResult::Found { nonce, .. }) => assert_eq!(nonce, 185),
            other => panic!("expected a hit, got {other:?}"),
        }
    }

    #[test]
    fn sequential_scanner_matches_search() {
        let scanner = Scanner::new(1);
        assert_eq!(scanner.threads(), 1);
        let task = SearchTask::new(b"COMSM0010cloud".to_vec(), 331, 1000, 8).unwrap();
        assert_eq!(scanner.scan(&task), Some(search(&task.payload, 331, 1000, 8)));
        let task = SearchTask::new(b"COMSM0010cloud".to_vec(), 0, 330, 8).unwrap();
        assert!(!scanner.scan(&task).unwrap().is_found());
    }

    #[test]
    fn cancelled_scanner_stops() {
        let scanner = Scanner::new(2);
        scanner.cancel_flag().store(true, Ordering::Release);
        let task = SearchTask::new(b"abc".to_vec(), 0, u32::MAX, 256).unwrap();
        assert_eq!(scanner.scan(&task), None);
    }

    #[test]
    fn task_rejects_bad_bounds() {
        assert!(matches!(
            SearchTask::new(b"x".to_vec(), 5, 5, 1),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SearchTask::new(b"x".to_vec(), 0, 5, 257),
            Err(Error::Config(_))
        ));
        let task = SearchTask::new(b"x".to_vec(), 0, 5, 256).unwrap();
        assert_eq!(task.width(), 5);
    }
}
