//! Distributed brute-force search for golden nonces.
//!
//! A coordinator splits the 32-bit nonce space into one range per worker,
//! publishes the ranges on an input queue and waits on an output queue for
//! the first worker to report a nonce whose double SHA-256 has enough
//! leading zero bits.

pub mod aggregate;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod partition;
pub mod provision;
pub mod queue;
pub mod score;
pub mod search;
pub mod sizing;
pub mod worker;

pub use aggregate::{Aggregator, Outcome};
pub use config::{PoolMode, QueueSettings, WorkerPoolConfig};
pub use coordinator::Coordinator;
pub use dispatch::dispatch;
pub use error::{Error, Result};
pub use partition::{partition, tasks_for, Partition};
pub use provision::{LocalPool, LocalProvisioner, Provisioner};
pub use queue::{Delivery, MemoryQueue, Message, Queue};
pub use score::{double_hash, leading_zero_bits, score};
pub use search::{search, Scanner, SearchTask, WorkerResult};
pub use sizing::{compute_worker_count, SizingModel};
pub use worker::{Worker, WorkerMode, WorkerState};
