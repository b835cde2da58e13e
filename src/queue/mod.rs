//! Message queue seam between the coordinator and workers.
//!
//! The protocol only needs send, a bounded blocking receive with a lease,
//! delete-by-receipt and purge. [`MemoryQueue`] implements this in process.

mod memory;

pub use memory::MemoryQueue;

use crate::error::Result;
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Stand-in for "never" when a wait or lease is too long to add to a clock
/// reading.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `from + after`, clamped to a far-future instant instead of overflowing.
pub(crate) fn deadline_after(from: Instant, after: Duration) -> Instant {
    from.checked_add(after).unwrap_or_else(|| from + FAR_FUTURE)
}

/// Attributes plus a free-text body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub attributes: BTreeMap<String, String>,
    pub body: String,
}

impl Message {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            attributes: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl ToString) -> Self {
        self.attributes.insert(key.to_string(), value.to_string());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

/// A received message together with the handle needed to delete it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub receipt: String,
    pub message: Message,
    /// How many times this message has been handed out, including this one.
    pub receive_count: u32,
}

pub trait Queue: Send + Sync {
    fn send(&self, message: Message) -> impl Future<Output = Result<()>> + Send;

    /// Wait up to `wait` for a message. A returned message stays invisible
    /// to other receivers for `lease` unless deleted first.
    fn receive(
        &self,
        wait: Duration,
        lease: Duration,
    ) -> impl Future<Output = Result<Option<Delivery>>> + Send;

    fn delete(&self, receipt: &str) -> impl Future<Output = Result<()>> + Send;

    /// Drop every message, visible or leased.
    fn purge(&self) -> impl Future<Output = Result<()>> + Send;
}
