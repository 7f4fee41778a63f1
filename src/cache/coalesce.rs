// src/cache/coalesce.rs
//! Request coalescing (singleflight pattern)
//!
//! When several tasks ask for the same key at once, only the first (the
//! leader) runs the work. The rest subscribe to the leader's broadcast and
//! share its result, success or failure.
//!
//! The in-flight entry is removed before the result is broadcast, so a caller
//! arriving after completion starts fresh work rather than waiting on a
//! finished flight. Results are never remembered: a failed flight leaves
//! nothing behind. If the leader is cancelled, its entry is removed on drop
//! and waiting tasks race to become the next leader.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

/// Role of a caller for one key
enum Role<T> {
    Leader(broadcast::Sender<T>),
    Follower(broadcast::Receiver<T>),
}

/// Removes the in-flight entry if the leader is dropped mid-flight
struct InflightGuard<'a, T> {
    inflight: &'a DashMap<String, broadcast::Sender<T>>,
    key: &'a str,
    armed: bool,
}

impl<T> InflightGuard<'_, T> {
    fn finish(mut self) {
        self.inflight.remove(self.key);
        self.armed = false;
    }
}

impl<T> Drop for InflightGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            self.inflight.remove(self.key);
        }
    }
}

/// Request coalescer implementing the singleflight pattern
pub struct RequestCoalescer<T: Clone> {
    /// In-flight work (key -> broadcast sender)
    inflight: DashMap<String, broadcast::Sender<T>>,
    /// Count of callers that attached to someone else's flight
    coalesced_count: AtomicU64,
}

impl<T: Clone> RequestCoalescer<T> {
    pub fn new() -> Self {
        Self {
            inflight: DashMap::new(),
            coalesced_count: AtomicU64::new(0),
        }
    }

    /// Run `work` for `key` unless a flight for `key` is already running,
    /// in which case wait for and return its result
    pub async fn coalesce<F, Fut>(&self, key: &str, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        loop {
            match self.join(key) {
                Role::Follower(mut rx) => {
                    debug!("Coalescing request for {}", key);
                    self.coalesced_count.fetch_add(1, Ordering::Relaxed);

                    match rx.recv().await {
                        Ok(result) => return result,
                        Err(_) => {
                            // Leader went away without a result
                            debug!("In-flight leader for {} dropped, retrying", key);
                        }
                    }
                }
                Role::Leader(tx) => {
                    let guard = InflightGuard {
                        inflight: &self.inflight,
                        key,
                        armed: true,
                    };

                    let result = work().await;

                    guard.finish();
                    // No receivers is fine
                    let _ = tx.send(result.clone());
                    return result;
                }
            }
        }
    }

    /// Atomically become the leader for `key` or subscribe to the current one
    fn join(&self, key: &str) -> Role<T> {
        match self.inflight.entry(key.to_string()) {
            Entry::Occupied(flight) => Role::Follower(flight.get().subscribe()),
            Entry::Vacant(slot) => {
                let (tx, _rx) = broadcast::channel(1);
                slot.insert(tx.clone());
                Role::Leader(tx)
            }
        }
    }

    /// Number of callers that shared another caller's result
    pub fn coalesced_count(&self) -> u64 {
        self.coalesced_count.load(Ordering::Relaxed)
    }

    /// Number of keys currently being worked on
    pub fn inflight_count(&self) -> usize {
        self.inflight.len()
    }
}

impl<T: Clone> Default for RequestCoalescer<T> {
    fn default() -> Self {
        Self::new()
    }
}
