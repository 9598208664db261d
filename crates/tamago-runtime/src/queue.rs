//! Work queue
//!
//! A key is handed to at most one worker at a time. Adding a key that is
//! already queued is a no-op; adding one that is being processed marks it
//! dirty and it is queued again when the worker calls [`WorkQueue::done`].
//! Delayed adds keep a single deadline per key, the earliest one.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use tamago_core::PetKey;

/// Per-key exponential backoff for failed reconciles
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorBackoff {
    pub base: Duration,
    pub max: Duration,
}

impl ErrorBackoff {
    /// Delay after the `failures`-th consecutive failure (1-based)
    pub fn delay(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exp)
            .map_or(self.max, |d| d.min(self.max))
    }
}

impl Default for ErrorBackoff {
    fn default() -> Self {
        ErrorBackoff {
            base: Duration::from_millis(5),
            max: Duration::from_secs(300),
        }
    }
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<PetKey>,
    /// Keys waiting to be processed (queued, or re-added while processing)
    dirty: HashSet<PetKey>,
    processing: HashSet<PetKey>,
    timers: HashMap<PetKey, (Instant, JoinHandle<()>)>,
    failures: HashMap<PetKey, u32>,
    shutdown: bool,
}

struct QueueInner {
    state: Mutex<QueueState>,
    notify: Notify,
    backoff: ErrorBackoff,
}

/// Deduplicating, rate-limited work queue of pet keys
#[derive(Clone)]
pub struct WorkQueue {
    inner: Arc<QueueInner>,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::with_backoff(ErrorBackoff::default())
    }

    pub fn with_backoff(backoff: ErrorBackoff) -> Self {
        WorkQueue {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                notify: Notify::new(),
                backoff,
            }),
        }
    }

    /// Queue `key` for processing
    pub fn add(&self, key: PetKey) {
        let mut state = self.inner.state.lock();
        if state.shutdown || state.dirty.contains(&key) {
            return;
        }
        state.dirty.insert(key.clone());
        if state.processing.contains(&key) {
            return;
        }
        state.queue.push_back(key);
        drop(state);
        self.inner.notify.notify_one();
    }

    /// Queue `key` once `delay` has passed.
    ///
    /// A pending deadline for the same key that is earlier than the new one
    /// wins; a later one is replaced. Must be called within a tokio runtime.
    pub fn add_after(&self, key: PetKey, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }

        let deadline = Instant::now() + delay;
        let mut state = self.inner.state.lock();
        if state.shutdown {
            return;
        }
        if let Some((pending, _)) = state.timers.get(&key) {
            if *pending <= deadline {
                return;
            }
        }

        let queue = self.clone();
        let timer_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            queue.fire(timer_key, deadline);
        });
        if let Some((_, replaced)) = state.timers.insert(key, (deadline, handle)) {
            replaced.abort();
        }
    }

    fn fire(&self, key: PetKey, deadline: Instant) {
        {
            let mut state = self.inner.state.lock();
            match state.timers.get(&key) {
                Some((pending, _)) if *pending == deadline => {
                    state.timers.remove(&key);
                }
                _ => return,
            }
        }
        self.add(key);
    }

    /// Queue `key` after its error backoff, growing the backoff
    pub fn add_rate_limited(&self, key: PetKey) {
        let delay = {
            let mut state = self.inner.state.lock();
            let failures = state.failures.entry(key.clone()).or_insert(0);
            *failures = failures.saturating_add(1);
            self.inner.backoff.delay(*failures)
        };
        self.add_after(key, delay);
    }

    /// Reset the error backoff of `key`
    pub fn forget(&self, key: &PetKey) {
        self.inner.state.lock().failures.remove(key);
    }

    /// Consecutive failures recorded for `key`
    pub fn failures(&self, key: &PetKey) -> u32 {
        self.inner.state.lock().failures.get(key).copied().unwrap_or(0)
    }

    /// Wait for the next key. Returns `None` once the queue is shut down.
    pub async fn get(&self) -> Option<PetKey> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            {
                let mut state = self.inner.state.lock();
                if state.shutdown {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
                notified.as_mut().enable();
            }
            notified.await;
        }
    }

    /// Mark `key` as processed, requeueing it if it was added meanwhile
    pub fn done(&self, key: &PetKey) {
        let mut state = self.inner.state.lock();
        state.processing.remove(key);
        if state.shutdown || !state.dirty.contains(key) {
            return;
        }
        state.queue.push_back(key.clone());
        drop(state);
        self.inner.notify.notify_one();
    }

    /// Keys ready for a worker
    pub fn len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys waiting on a delayed add
    pub fn pending_timers(&self) -> usize {
        self.inner.state.lock().timers.len()
    }

    /// Stop handing out keys, cancel timers and wake every waiting worker
    pub fn shutdown(&self) {
        let timers = {
            let mut state = self.inner.state.lock();
            state.shutdown = true;
            state.queue.clear();
            state.dirty.clear();
            std::mem::take(&mut state.timers)
        };
        for (_, (_, handle)) in timers {
            handle.abort();
        }
        self.inner.notify.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.state.lock().shutdown
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}
