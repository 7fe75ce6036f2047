//! Route guards
//!
//! Pages ask a guard before rendering; the guard only reads the session and
//! answers with where the tab should be instead, if anywhere.

use crate::auth::SessionController;
use tracing::debug;

/// Outcome of a route guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

impl GuardDecision {
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Allow signed-in users; everyone else goes to the login page.
///
/// Waits for the session to be restored first.
pub async fn require_auth(session: &SessionController) -> GuardDecision {
    session.initialize().await;
    if session.is_authenticated() {
        GuardDecision::Allow
    } else {
        debug!("not signed in, redirecting to login");
        GuardDecision::Redirect(session.config().login_path.clone())
    }
}

/// Allow only signed-out users, e.g. on the login and registration pages
pub async fn require_guest(session: &SessionController) -> GuardDecision {
    session.initialize().await;
    if session.is_authenticated() {
        GuardDecision::Redirect(session.config().home_path.clone())
    } else {
        GuardDecision::Allow
    }
}

/// Allow signed-in users holding `action` on `feature`
pub async fn require_permission(
    session: &SessionController,
    feature: &str,
    action: &str,
) -> GuardDecision {
    let decision = require_auth(session).await;
    if !decision.is_allowed() {
        return decision;
    }
    if session.has_permission(feature, action) {
        GuardDecision::Allow
    } else {
        debug!(feature, action, "permission denied");
        GuardDecision::Redirect(session.config().home_path.clone())
    }
}
