//! `window.localStorage` backed store

use super::{KeyValueStore, StorageChange, StorageEvents};
use crate::subscription::Subscription;
use std::rc::Rc;
#[cfg(target_arch = "wasm32")]
use tracing::error;
use tracing::debug;

/// Browser local storage.
///
/// Outside a browser (or when storage is disabled) every read is `None` and
/// every write is a no-op.
#[derive(Clone, Default)]
pub struct LocalStore {
    #[cfg(target_arch = "wasm32")]
    area: Option<web_sys::Storage>,
}

impl LocalStore {
    /// Open the origin's local storage area.
    #[must_use]
    pub fn open() -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            let area = web_sys::window().and_then(|w| match w.local_storage() {
                Ok(area) => area,
                Err(err) => {
                    error!("localStorage unavailable: {err:?}");
                    None
                }
            });
            Self { area }
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            debug!("not running in a browser, local storage disabled");
            Self {}
        }
    }

    /// Whether a storage area backs this store.
    #[must_use]
    pub fn is_available(&self) -> bool {
        #[cfg(target_arch = "wasm32")]
        {
            self.area.is_some()
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            false
        }
    }
}

impl KeyValueStore for LocalStore {
    fn get(&self, key: &str) -> Option<String> {
        #[cfg(target_arch = "wasm32")]
        {
            let area = self.area.as_ref()?;
            match area.get_item(key) {
                Ok(value) => value,
                Err(err) => {
                    error!("localStorage.getItem({key}) failed: {err:?}");
                    None
                }
            }
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = key;
            None
        }
    }

    fn set(&self, key: &str, value: &str) {
        #[cfg(target_arch = "wasm32")]
        if let Some(area) = &self.area {
            if let Err(err) = area.set_item(key, value) {
                error!("localStorage.setItem({key}) failed: {err:?}");
            }
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = (key, value);
        }
    }

    fn remove(&self, key: &str) {
        #[cfg(target_arch = "wasm32")]
        if let Some(area) = &self.area {
            if let Err(err) = area.remove_item(key) {
                error!("localStorage.removeItem({key}) failed: {err:?}");
            }
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = key;
        }
    }
}

impl StorageEvents for LocalStore {
    fn watch(&self, handler: Rc<dyn Fn(&StorageChange)>) -> Subscription {
        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;

            let Some(window) = web_sys::window() else {
                return Subscription::noop();
            };
            let listener = gloo_events::EventListener::new(&window, "storage", move |event| {
                let Some(event) = event.dyn_ref::<web_sys::StorageEvent>() else {
                    return;
                };
                handler(&StorageChange {
                    key: event.key(),
                    new_value: event.new_value(),
                });
            });
            Subscription::new(move || drop(listener))
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = handler;
            debug!("not running in a browser, storage events disabled");
            Subscription::noop()
        }
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("available", &self.is_available())
            .finish()
    }
}
