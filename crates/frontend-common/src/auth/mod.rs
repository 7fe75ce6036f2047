//! Authentication session

mod controller;
mod refresh;
mod state;

// Re-export commonly used items
pub use controller::{SessionBuilder, SessionController};
pub use refresh::RefreshOutcome;
pub use state::{SessionSnapshot, SessionState, SessionStatus};
