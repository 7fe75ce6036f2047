//! Cross-tab session synchronization
//!
//! Tabs of one origin tell each other about session identity changes by
//! publishing [`SyncEvent`]s. Only durable identity changes are broadcast;
//! loading and error flags stay local to a tab.

mod storage_channel;

pub use storage_channel::StorageChannel;

use pos_core::Subscription;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// What changed in the publishing tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncKind {
    Login,
    Register,
    Logout,
    Unauthorized,
}

impl SyncKind {
    /// Whether receiving tabs must drop their session
    pub const fn ends_session(self) -> bool {
        matches!(self, Self::Logout | Self::Unauthorized)
    }
}

/// A session change broadcast to other tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEvent {
    #[serde(rename = "type")]
    pub kind: SyncKind,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl SyncEvent {
    pub const fn new(kind: SyncKind, timestamp: i64) -> Self {
        Self { kind, timestamp }
    }

    /// An event stamped with the current time
    pub fn now(kind: SyncKind) -> Self {
        Self::new(kind, pos_core::rt::now_ms())
    }
}

/// Publish/subscribe transport for [`SyncEvent`]s between tabs.
///
/// Implementations never deliver a tab's own events back to it.
pub trait SyncChannel {
    fn publish(&self, event: SyncEvent);

    fn subscribe(&self, handler: Rc<dyn Fn(SyncEvent)>) -> Subscription;
}

impl<T: SyncChannel + ?Sized> SyncChannel for Rc<T> {
    fn publish(&self, event: SyncEvent) {
        (**self).publish(event);
    }

    fn subscribe(&self, handler: Rc<dyn Fn(SyncEvent)>) -> Subscription {
        (**self).subscribe(handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let event = SyncEvent::new(SyncKind::Unauthorized, 1_700_000_000_000);
        let encoded = serde_json::to_string(&event).unwrap();
        assert_eq!(encoded, r#"{"type":"unauthorized","timestamp":1700000000000}"#);

        let decoded: SyncEvent =
            serde_json::from_str(r#"{"type":"register","timestamp":5}"#).unwrap();
        assert_eq!(decoded, SyncEvent::new(SyncKind::Register, 5));
    }

    #[test]
    fn test_ends_session() {
        assert!(SyncKind::Logout.ends_session());
        assert!(SyncKind::Unauthorized.ends_session());
        assert!(!SyncKind::Login.ends_session());
        assert!(!SyncKind::Register.ends_session());
    }
}
