//! Navigation seam
//!
//! The session controller only ever needs to know where the tab is and to
//! send it to the login surface.

use std::cell::RefCell;

/// Reads and changes the tab's current location
pub trait Navigator {
    /// Path component of the current location
    fn current_path(&self) -> String;

    fn navigate(&self, path: &str);
}

/// `window.location` of the running page
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserNavigator;

#[cfg(target_arch = "wasm32")]
impl Navigator for BrowserNavigator {
    fn current_path(&self) -> String {
        web_sys::window()
            .and_then(|window| window.location().pathname().ok())
            .unwrap_or_default()
    }

    fn navigate(&self, path: &str) {
        let Some(window) = web_sys::window() else {
            return;
        };
        if let Err(err) = window.location().assign(path) {
            tracing::error!("navigation to {path} failed: {err:?}");
        }
    }
}

/// Location kept in memory, for running outside a browser
#[derive(Debug, Default)]
pub struct MemoryNavigator {
    path: RefCell<String>,
    history: RefCell<Vec<String>>,
}

impl MemoryNavigator {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: RefCell::new(path.into()),
            history: RefCell::new(Vec::new()),
        }
    }

    /// Every path navigated to, oldest first
    pub fn history(&self) -> Vec<String> {
        self.history.borrow().clone()
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.path.borrow().clone()
    }

    fn navigate(&self, path: &str) {
        path.clone_into(&mut self.path.borrow_mut());
        self.history.borrow_mut().push(path.to_string());
    }
}
