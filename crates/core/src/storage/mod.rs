//! Persistent key-value store
//!
//! A thin, fault-tolerant surface over browser local storage. Nothing in
//! here returns an error: a store that is unavailable or throwing behaves as
//! an empty store that ignores writes, and the fault is logged.

mod local;
mod memory;

pub use local::LocalStore;
pub use memory::{MemoryOrigin, MemoryStore};

use crate::subscription::Subscription;
use std::rc::Rc;

/// String key-value storage shared by every tab of one origin.
pub trait KeyValueStore {
    /// Read `key`, `None` if absent or the store is unavailable.
    fn get(&self, key: &str) -> Option<String>;

    /// Write `key`; failures are logged and swallowed.
    fn set(&self, key: &str, value: &str);

    /// Delete `key`; failures are logged and swallowed.
    fn remove(&self, key: &str);
}

/// A change to a key made by another execution context of the same origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    /// Changed key; `None` when the whole store was cleared
    pub key: Option<String>,
    /// Value after the change; `None` when the key was removed
    pub new_value: Option<String>,
}

/// Change notifications for writes made by *other* tabs.
///
/// Like the browser `storage` event, a context is never notified of its own
/// writes.
pub trait StorageEvents {
    fn watch(&self, handler: Rc<dyn Fn(&StorageChange)>) -> Subscription;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Rc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) {
        (**self).set(key, value);
    }

    fn remove(&self, key: &str) {
        (**self).remove(key);
    }
}

impl<T: StorageEvents + ?Sized> StorageEvents for Rc<T> {
    fn watch(&self, handler: Rc<dyn Fn(&StorageChange)>) -> Subscription {
        (**self).watch(handler)
    }
}
