//! Sync channel over a shared storage key
//!
//! Publishing writes the event under one well-known key and deletes it again
//! shortly after, so the key never holds a stale event for long. Other tabs
//! observe the write through the storage change notification; the deletion
//! that follows is ignored.

use super::{SyncChannel, SyncEvent};
use pos_core::rt::DelayedTask;
use pos_core::{KeyValueStore, StorageChange, StorageEvents, Subscription};
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, warn};

/// [`SyncChannel`] implemented with write-then-delete on a storage key
#[derive(Debug, Clone)]
pub struct StorageChannel<S> {
    store: S,
    key: String,
    cleanup_after: Duration,
}

impl<S> StorageChannel<S>
where
    S: KeyValueStore + StorageEvents + Clone + 'static,
{
    pub fn new(store: S, key: impl Into<String>, cleanup_after: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            cleanup_after,
        }
    }
}

impl<S> SyncChannel for StorageChannel<S>
where
    S: KeyValueStore + StorageEvents + Clone + 'static,
{
    fn publish(&self, event: SyncEvent) {
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("failed to encode sync event: {err}");
                return;
            }
        };

        debug!(kind = ?event.kind, "broadcasting session change");
        self.store.set(&self.key, &payload);

        let store = self.store.clone();
        let key = self.key.clone();
        DelayedTask::spawn(self.cleanup_after, async move {
            store.remove(&key);
        })
        .detach();
    }

    fn subscribe(&self, handler: Rc<dyn Fn(SyncEvent)>) -> Subscription {
        let key = self.key.clone();
        self.store.watch(Rc::new(move |change: &StorageChange| {
            if change.key.as_deref() != Some(key.as_str()) {
                return;
            }
            // Deletion of a previous event
            let Some(raw) = change.new_value.as_deref() else {
                return;
            };
            match serde_json::from_str::<SyncEvent>(raw) {
                Ok(event) => handler(event),
                Err(err) => warn!("ignoring malformed sync event: {err}"),
            }
        }))
    }
}
