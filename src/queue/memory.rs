use super::{deadline_after, Delivery, Message, Queue};
use crate::error::{Error, Result};
use rand::Rng;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// In-process queue with lease-based visibility.
///
/// Received messages are hidden until deleted or until their lease runs
/// out, at which point they become receivable again. Delivery is
/// at-least-once: a slow consumer can cause a second delivery.
pub struct MemoryQueue {
    name: String,
    state: Mutex<State>,
    notify: Notify,
}

#[derive(Default)]
struct State {
    next_id: u64,
    ready: VecDeque<Stored>,
    leased: HashMap<String, Lease>,
}

struct Stored {
    id: u64,
    message: Message,
    receive_count: u32,
}

struct Lease {
    stored: Stored,
    expires: Instant,
}

impl State {
    /// Requeue expired leases; returns the earliest expiry still pending.
    fn reclaim_expired(&mut self, now: Instant) -> Option<Instant> {
        let expired: Vec<String> = self
            .leased
            .iter()
            .filter(|(_, lease)| lease.expires <= now)
            .map(|(receipt, _)| receipt.clone())
            .collect();
        for receipt in expired {
            if let Some(lease) = self.leased.remove(&receipt) {
                tracing::debug!(id = lease.stored.id, "lease expired, message visible again");
                self.ready.push_back(lease.stored);
            }
        }
        self.leased.values().map(|lease| lease.expires).min()
    }
}

impl MemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(State::default()),
            notify: Notify::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Messages currently receivable (expired leases not yet reclaimed are
    /// not counted).
    pub fn visible(&self) -> usize {
        self.lock().map(|s| s.ready.len()).unwrap_or(0)
    }

    /// Messages received but neither deleted nor expired.
    pub fn in_flight(&self) -> usize {
        self.lock().map(|s| s.leased.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| Error::Queue(format!("{} lock poisoned", self.name)))
    }
}

impl Queue for MemoryQueue {
    async fn send(&self, message: Message) -> Result<()> {
        {
            let mut state = self.lock()?;
            let id = state.next_id;
            state.next_id += 1;
            state.ready.push_back(Stored {
                id,
                message,
                receive_count: 0,
            });
            tracing::debug!(queue = %self.name, id, "message sent");
        }
        self.notify.notify_waiters();
        Ok(())
    }

    async fn receive(&self, wait: Duration, lease: Duration) -> Result<Option<Delivery>> {
        let deadline = deadline_after(Instant::now(), wait);
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next_expiry = {
                let mut state = self.lock()?;
                let now = Instant::now();
                let next_expiry = state.reclaim_expired(now);
                if let Some(mut stored) = state.ready.pop_front() {
                    stored.receive_count += 1;
                    let receipt = format!("{:016x}-{}", rand::thread_rng().gen::<u64>(), stored.id);
                    let delivery = Delivery {
                        receipt: receipt.clone(),
                        message: stored.message.clone(),
                        receive_count: stored.receive_count,
                    };
                    state.leased.insert(
                        receipt,
                        Lease {
                            stored,
                            expires: deadline_after(now, lease),
                        },
                    );
                    return Ok(Some(delivery));
                }
                next_expiry
            };

            if Instant::now() >= deadline {
                return Ok(None);
            }
            let wake_at = next_expiry.map_or(deadline, |expiry| expiry.min(deadline));
            let _ = tokio::time::timeout_at(wake_at, notified).await;
        }
    }

    async fn delete(&self, receipt: &str) -> Result<()> {
        let mut state = self.lock()?;
        match state.leased.remove(receipt) {
            Some(lease) => {
                tracing::debug!(queue = %self.name, id = lease.stored.id, "message deleted");
                Ok(())
            }
            None => Err(Error::Queue(format!(
                "{}: receipt {receipt} is not leased (already deleted or expired)",
                self.name
            ))),
        }
    }

    async fn purge(&self) -> Result<()> {
        let mut state = self.lock()?;
        let dropped = state.ready.len() + state.leased.len();
        state.ready.clear();
        state.leased.clear();
        tracing::debug!(queue = %self.name, dropped, "queue purged");
        Ok(())
    }
}
