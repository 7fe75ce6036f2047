//! Tab visibility notifications

use pos_core::Subscription;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Source of visibility transitions for the current tab
pub trait VisibilitySource {
    fn watch(&self, handler: Rc<dyn Fn(Visibility)>) -> Subscription;
}

/// `document.visibilityState` of the running page
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentVisibility;

#[cfg(target_arch = "wasm32")]
impl VisibilitySource for DocumentVisibility {
    fn watch(&self, handler: Rc<dyn Fn(Visibility)>) -> Subscription {
        let Some(document) = web_sys::window().and_then(|w| w.document()) else {
            return Subscription::noop();
        };
        let target = document.clone();
        let listener = gloo_events::EventListener::new(&target, "visibilitychange", move |_| {
            let state = if document.visibility_state() == web_sys::VisibilityState::Visible {
                Visibility::Visible
            } else {
                Visibility::Hidden
            };
            handler(state);
        });
        Subscription::new(move || drop(listener))
    }
}

type Handlers = RefCell<Vec<(u64, Rc<dyn Fn(Visibility)>)>>;

/// Visibility driven by explicit [`set`](ManualVisibility::set) calls.
///
/// Outside a browser nothing ever calls `set`, so the tab simply stays
/// visible.
#[derive(Default)]
pub struct ManualVisibility {
    handlers: Rc<Handlers>,
    next_id: Cell<u64>,
}

impl ManualVisibility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a transition to every watcher.
    pub fn set(&self, visibility: Visibility) {
        let handlers: Vec<_> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in handlers {
            handler(visibility);
        }
    }
}

impl VisibilitySource for ManualVisibility {
    fn watch(&self, handler: Rc<dyn Fn(Visibility)>) -> Subscription {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.handlers.borrow_mut().push((id, handler));

        let handlers = Rc::downgrade(&self.handlers);
        Subscription::new(move || {
            if let Some(handlers) = handlers.upgrade() {
                handlers.borrow_mut().retain(|(watcher, _)| *watcher != id);
            }
        })
    }
}

impl std::fmt::Debug for ManualVisibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualVisibility")
            .field("watchers", &self.handlers.borrow().len())
            .finish()
    }
}
