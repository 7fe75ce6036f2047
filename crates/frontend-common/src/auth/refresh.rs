//! Single in-flight token refresh
//!
//! Every trigger (initialization, a 401, the proactive timer, the tab
//! becoming visible) goes through [`InFlight::join`]. While a refresh is
//! pending, later triggers await the same future instead of spending the
//! refresh token a second time.

use futures::future::{FutureExt, LocalBoxFuture, Shared};
use std::cell::RefCell;
use std::rc::Rc;

/// Result of one refresh attempt, shared by everyone who joined it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New credentials are installed
    Refreshed,
    /// The server refused the refresh token; the session is gone
    Rejected,
    /// The server could not be reached; the stored session is kept
    Transient,
    /// There was no session to refresh
    NoSession,
}

pub(crate) type PendingRefresh = Shared<LocalBoxFuture<'static, RefreshOutcome>>;

/// Holds the pending refresh, if any
#[derive(Default)]
pub(crate) struct InFlight {
    current: RefCell<Option<PendingRefresh>>,
}

impl InFlight {
    /// Join the pending refresh, or start one from `start`.
    ///
    /// The slot empties itself when the refresh completes, so the next
    /// trigger after that starts a new one.
    pub(crate) fn join<F>(self: &Rc<Self>, start: F) -> PendingRefresh
    where
        F: FnOnce() -> LocalBoxFuture<'static, RefreshOutcome>,
    {
        if let Some(pending) = self.current.borrow().as_ref() {
            return pending.clone();
        }

        let slot = Rc::downgrade(self);
        let work = start();
        let pending = async move {
            let outcome = work.await;
            if let Some(slot) = slot.upgrade() {
                slot.current.borrow_mut().take();
            }
            outcome
        }
        .boxed_local()
        .shared();

        *self.current.borrow_mut() = Some(pending.clone());
        pending
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.current.borrow().is_some()
    }
}
