//! Change notification streams

use tokio::sync::broadcast;

use tamago_core::{PetKey, ResourceVersion};

/// A change observed in the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WatchEvent {
    Added { key: PetKey, version: ResourceVersion },
    Modified { key: PetKey, version: ResourceVersion },
    Deleted { key: PetKey },
}

impl WatchEvent {
    pub fn key(&self) -> &PetKey {
        match self {
            WatchEvent::Added { key, .. }
            | WatchEvent::Modified { key, .. }
            | WatchEvent::Deleted { key } => key,
        }
    }
}

/// Which keys a watch reports
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WatchScope {
    All,
    Key(PetKey),
}

impl WatchScope {
    #[inline]
    pub fn matches(&self, key: &PetKey) -> bool {
        match self {
            WatchScope::All => true,
            WatchScope::Key(k) => k == key,
        }
    }
}

/// Item delivered by [`Watch::next`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    Change(WatchEvent),
    /// The subscriber fell behind and missed this many notifications;
    /// consumers should relist
    Lagged(u64),
}

/// Subscription to store changes
#[derive(Debug)]
pub struct Watch {
    rx: broadcast::Receiver<WatchEvent>,
    scope: WatchScope,
}

impl Watch {
    pub fn new(rx: broadcast::Receiver<WatchEvent>, scope: WatchScope) -> Self {
        Watch { rx, scope }
    }

    pub fn scope(&self) -> &WatchScope {
        &self.scope
    }

    /// Next notification in scope, `None` once the store is gone
    pub async fn next(&mut self) -> Option<Notification> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.scope.matches(event.key()) => {
                    return Some(Notification::Change(event));
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    return Some(Notification::Lagged(missed));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
