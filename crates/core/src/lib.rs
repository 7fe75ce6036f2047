//! POS session core types and utilities
//!
//! Everything in here is shared by the transport client and the session
//! controller: the bearer token codec, the fault-tolerant key-value store,
//! and the small set of single-threaded runtime helpers both crates schedule
//! work through.

pub mod error;
pub mod rt;
pub mod storage;
pub mod subscription;
pub mod token;

pub use error::{CoreError, CoreResult};
pub use rt::{DelayedTask, TimerSlot, TimerToken};
pub use storage::{KeyValueStore, LocalStore, MemoryOrigin, MemoryStore, StorageChange, StorageEvents};
pub use subscription::Subscription;
pub use token::{DEFAULT_EXPIRY_BUFFER_MS, TokenClaims};
