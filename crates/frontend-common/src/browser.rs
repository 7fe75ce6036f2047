//! Browser entry point

use crate::auth::SessionController;
use crate::config::SessionConfig;
use pos_http::ClientError;

/// Build the page's session controller, talking to the page's own origin
/// unless `config` names another one.
///
/// # Errors
///
/// Returns an error if the transport client cannot be created
pub fn session_for_page(mut config: SessionConfig) -> Result<SessionController, ClientError> {
    if config.base_url.is_empty() {
        config.base_url = web_sys::window()
            .and_then(|window| window.location().origin().ok())
            .ok_or_else(|| ClientError::Configuration("page origin is unavailable".to_string()))?;
    }
    SessionController::builder(config).build()
}
