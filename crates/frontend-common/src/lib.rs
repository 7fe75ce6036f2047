//! Session management for the POS web client
//!
//! One [`SessionController`] per tab holds the signed-in user and their
//! tokens, keeps the access token fresh, and stays in step with the other
//! tabs of the same origin.

pub mod auth;
#[cfg(target_arch = "wasm32")]
pub mod browser;
pub mod config;
pub mod guard;
pub mod logging;
pub mod navigation;
pub mod store_selector;
pub mod sync;
pub mod visibility;

pub use auth::{
    RefreshOutcome, SessionBuilder, SessionController, SessionSnapshot, SessionState,
    SessionStatus,
};
pub use config::SessionConfig;
pub use guard::{GuardDecision, require_auth, require_guest, require_permission};
pub use navigation::{MemoryNavigator, Navigator};
pub use store_selector::StoreSelector;
pub use sync::{StorageChannel, SyncChannel, SyncEvent, SyncKind};
pub use visibility::{ManualVisibility, Visibility, VisibilitySource};
