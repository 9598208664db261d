//! Lifecycle event sinks

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use tamago_core::LifecycleEvent;

/// Receives lifecycle events. Emission is fire-and-forget.
pub trait EventEmitter: Send + Sync {
    fn emit(&self, event: LifecycleEvent);
}

/// Writes events to the tracing subscriber
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEmitter;

impl EventEmitter for TracingEmitter {
    fn emit(&self, event: LifecycleEvent) {
        tracing::warn!(
            key = %event.key,
            severity = event.severity.as_str(),
            reason = event.reason.as_str(),
            "{}",
            event.message
        );
    }
}

/// Forwards events into a bounded channel, dropping them when it is full
#[derive(Clone, Debug)]
pub struct ChannelEmitter {
    tx: mpsc::Sender<LifecycleEvent>,
}

impl ChannelEmitter {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<LifecycleEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (ChannelEmitter { tx }, rx)
    }
}

impl EventEmitter for ChannelEmitter {
    fn emit(&self, event: LifecycleEvent) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::debug!(error = %e, "lifecycle event dropped");
        }
    }
}

/// Keeps the most recent events in memory
#[derive(Debug)]
pub struct MemoryEmitter {
    events: Mutex<VecDeque<LifecycleEvent>>,
    capacity: usize,
}

impl MemoryEmitter {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MemoryEmitter {
            events: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Snapshot of retained events, oldest first
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Remove and return all retained events
    pub fn drain(&self) -> Vec<LifecycleEvent> {
        self.events.lock().drain(..).collect()
    }
}

impl Default for MemoryEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventEmitter for MemoryEmitter {
    fn emit(&self, event: LifecycleEvent) {
        let mut events = self.events.lock();
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Sends every event to each of its sinks
#[derive(Clone, Default)]
pub struct FanoutEmitter {
    sinks: Vec<Arc<dyn EventEmitter>>,
}

impl FanoutEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventEmitter>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventEmitter for FanoutEmitter {
    fn emit(&self, event: LifecycleEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(event.clone());
            }
            last.emit(event);
        }
    }
}
