//! Selected store
//!
//! Remembers which store the terminal is working in across reloads.

use crate::auth::SessionController;
use pos_core::KeyValueStore;
use pos_http::types::StoreSummary;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::warn;

pub struct StoreSelector {
    session: SessionController,
    store: Rc<dyn KeyValueStore>,
    key: String,
    selected: RefCell<Option<String>>,
}

impl StoreSelector {
    /// Selector persisting next to the session's tokens
    pub fn new(session: &SessionController) -> Self {
        Self {
            store: session.store(),
            key: session.config().selected_store_key.clone(),
            session: session.clone(),
            selected: RefCell::new(None),
        }
    }

    /// Restore the selection saved by an earlier visit
    pub fn initialize(&self) {
        *self.selected.borrow_mut() = self.store.get(&self.key);
    }

    /// Select `store_id`, if the signed-in user may work there
    pub fn select(&self, store_id: &str) -> bool {
        if !self.session.can_access_store(store_id) {
            warn!(store_id, "refusing to select an inaccessible store");
            return false;
        }
        self.store.set(&self.key, store_id);
        *self.selected.borrow_mut() = Some(store_id.to_string());
        true
    }

    pub fn clear(&self) {
        self.store.remove(&self.key);
        self.selected.borrow_mut().take();
    }

    pub fn selected_store_id(&self) -> Option<String> {
        self.selected.borrow().clone()
    }

    /// The selected store, as long as the current user may still access it
    pub fn selected_accessible_store(&self) -> Option<StoreSummary> {
        let selected = self.selected_store_id()?;
        if !self.session.can_access_store(&selected) {
            return None;
        }
        self.session
            .accessible_stores()
            .into_iter()
            .find(|store| store.id == selected)
    }
}

impl std::fmt::Debug for StoreSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSelector")
            .field("key", &self.key)
            .field("selected", &self.selected.borrow())
            .finish_non_exhaustive()
    }
}
