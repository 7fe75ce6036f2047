//! Session state and its observers

use pos_core::Subscription;
use pos_http::{TokenPair, UserSnapshot};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Canonical session state of one tab, owned by the session controller.
///
/// Once an operation settles, `tokens` and `user` are either both set or
/// both empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub tokens: Option<TokenPair>,
    pub user: Option<UserSnapshot>,
    pub initialized: bool,
    pub loading: bool,
    pub error: Option<String>,
}

impl SessionState {
    pub const fn is_authenticated(&self) -> bool {
        self.tokens.is_some() && self.user.is_some()
    }

    pub const fn status(&self) -> SessionStatus {
        match (self.initialized, self.is_authenticated()) {
            (_, true) => SessionStatus::Authenticated,
            (true, false) => SessionStatus::Unauthenticated,
            (false, false) if self.loading => SessionStatus::Initializing,
            (false, false) => SessionStatus::Uninitialized,
        }
    }
}

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Uninitialized,
    Initializing,
    Authenticated,
    Unauthenticated,
}

/// Read-only view of the session handed to collaborators; never carries
/// credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub user: Option<UserSnapshot>,
    pub initialized: bool,
    pub loading: bool,
    pub error: Option<String>,
}

impl SessionSnapshot {
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.status, SessionStatus::Authenticated)
    }
}

impl From<&SessionState> for SessionSnapshot {
    fn from(state: &SessionState) -> Self {
        Self {
            status: state.status(),
            user: state.user.clone(),
            initialized: state.initialized,
            loading: state.loading,
            error: state.error.clone(),
        }
    }
}

type Observer = Rc<dyn Fn(&SessionSnapshot)>;

/// Change listeners, called after every state update
#[derive(Default)]
pub(crate) struct Observers {
    list: Rc<RefCell<Vec<(u64, Observer)>>>,
    next_id: Cell<u64>,
}

impl Observers {
    pub(crate) fn subscribe(&self, observer: Observer) -> Subscription {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.list.borrow_mut().push((id, observer));

        let list = Rc::downgrade(&self.list);
        Subscription::new(move || {
            if let Some(list) = list.upgrade() {
                list.borrow_mut().retain(|(observer, _)| *observer != id);
            }
        })
    }

    pub(crate) fn notify(&self, snapshot: &SessionSnapshot) {
        // Observers may subscribe or unsubscribe while being notified
        let observers: Vec<_> = self.list.borrow().iter().map(|(_, o)| o.clone()).collect();
        for observer in observers {
            observer(snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_in() -> SessionState {
        SessionState {
            tokens: Some(TokenPair::new("a", "r")),
            user: Some(UserSnapshot::default()),
            initialized: true,
            ..SessionState::default()
        }
    }

    #[test]
    fn test_status_transitions() {
        let mut state = SessionState::default();
        assert_eq!(state.status(), SessionStatus::Uninitialized);

        state.loading = true;
        assert_eq!(state.status(), SessionStatus::Initializing);

        state.loading = false;
        state.initialized = true;
        assert_eq!(state.status(), SessionStatus::Unauthenticated);

        assert_eq!(signed_in().status(), SessionStatus::Authenticated);
    }

    #[test]
    fn test_tokens_without_user_is_not_authenticated() {
        let state = SessionState {
            tokens: Some(TokenPair::new("a", "r")),
            initialized: true,
            ..SessionState::default()
        };
        assert!(!state.is_authenticated());
    }

    #[test]
    fn test_snapshot_has_no_credentials() {
        let snapshot = SessionSnapshot::from(&signed_in());
        assert!(snapshot.is_authenticated());
        assert!(!format!("{snapshot:?}").contains("TokenPair"));
    }

    #[test]
    fn test_observers_until_unsubscribed() {
        let observers = Observers::default();
        let count = Rc::new(Cell::new(0));
        let counter = count.clone();
        let sub = observers.subscribe(Rc::new(move |_| counter.set(counter.get() + 1)));

        let snapshot = SessionSnapshot::from(&SessionState::default());
        observers.notify(&snapshot);
        drop(sub);
        observers.notify(&snapshot);

        assert_eq!(count.get(), 1);
    }
}
