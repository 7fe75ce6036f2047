//! In-memory storage origin
//!
//! Models one browser origin whose tabs share a storage area. Each tab gets
//! its own [`MemoryStore`] handle; writes through one handle are delivered to
//! the watchers of every other handle on a later turn of the event loop, the
//! same way the browser queues `storage` events.

use super::{KeyValueStore, StorageChange, StorageEvents};
use crate::rt::spawn_local;
use crate::subscription::Subscription;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::error;

type Watcher = (u64, u64, Rc<dyn Fn(&StorageChange)>);

#[derive(Default)]
struct OriginInner {
    entries: RefCell<HashMap<String, String>>,
    watchers: RefCell<Vec<Watcher>>,
    next_id: Cell<u64>,
}

impl OriginInner {
    fn next_id(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    fn notify(&self, origin_tab: u64, change: StorageChange) {
        let handlers: Vec<_> = self
            .watchers
            .borrow()
            .iter()
            .filter(|(tab, _, _)| *tab != origin_tab)
            .map(|(_, _, handler)| handler.clone())
            .collect();

        if handlers.is_empty() {
            return;
        }

        spawn_local(async move {
            for handler in handlers {
                handler(&change);
            }
        });
    }
}

/// A shared storage area, the in-memory counterpart of one browser origin.
#[derive(Clone, Default)]
pub struct MemoryOrigin {
    inner: Rc<OriginInner>,
}

impl MemoryOrigin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a handle for a new tab of this origin.
    #[must_use]
    pub fn tab(&self) -> MemoryStore {
        MemoryStore {
            tab: self.inner.next_id(),
            origin: self.inner.clone(),
            failing: Rc::new(Cell::new(false)),
        }
    }

    /// Number of keys currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One tab's view of a [`MemoryOrigin`].
#[derive(Clone)]
pub struct MemoryStore {
    tab: u64,
    origin: Rc<OriginInner>,
    failing: Rc<Cell<bool>>,
}

impl MemoryStore {
    /// A store that is the only tab of a fresh origin.
    #[must_use]
    pub fn standalone() -> Self {
        MemoryOrigin::new().tab()
    }

    /// Make every operation on this handle fail like a disabled or full
    /// browser store would.
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }

    fn check(&self, operation: &str, key: &str) -> bool {
        if self.failing.get() {
            error!("storage {operation}({key}) failed: storage unavailable");
            false
        } else {
            true
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        if !self.check("get", key) {
            return None;
        }
        self.origin.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if !self.check("set", key) {
            return;
        }
        self.origin
            .entries
            .borrow_mut()
            .insert(key.to_owned(), value.to_owned());
        self.origin.notify(
            self.tab,
            StorageChange {
                key: Some(key.to_owned()),
                new_value: Some(value.to_owned()),
            },
        );
    }

    fn remove(&self, key: &str) {
        if !self.check("remove", key) {
            return;
        }
        let removed = self.origin.entries.borrow_mut().remove(key);
        if removed.is_some() {
            self.origin.notify(
                self.tab,
                StorageChange {
                    key: Some(key.to_owned()),
                    new_value: None,
                },
            );
        }
    }
}

impl StorageEvents for MemoryStore {
    fn watch(&self, handler: Rc<dyn Fn(&StorageChange)>) -> Subscription {
        let id = self.origin.next_id();
        self.origin
            .watchers
            .borrow_mut()
            .push((self.tab, id, handler));

        let origin = Rc::downgrade(&self.origin);
        Subscription::new(move || {
            if let Some(origin) = origin.upgrade() {
                origin
                    .watchers
                    .borrow_mut()
                    .retain(|(_, watcher, _)| *watcher != id);
            }
        })
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("tab", &self.tab)
            .field("failing", &self.failing.get())
            .finish_non_exhaustive()
    }
}
