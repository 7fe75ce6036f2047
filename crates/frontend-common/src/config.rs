//! Session configuration

use pos_core::{CoreError, CoreResult};
use pos_http::{ClientError, PosClient};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Session manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Origin of the REST API; empty means the page's own origin
    pub base_url: String,
    pub api_prefix: String,
    pub request_timeout_ms: u64,
    pub refresh_timeout_ms: u64,
    /// Refresh this long before the access token expires
    pub expiry_buffer_ms: i64,
    /// Delay before a broadcast sync event is deleted again
    pub sync_cleanup_ms: u64,
    /// Delay before retrying a refresh that failed for network reasons
    pub refresh_retry_ms: u64,
    pub tokens_key: String,
    pub sync_key: String,
    pub selected_store_key: String,
    pub login_path: String,
    pub home_path: String,
}

impl SessionConfig {
    pub const DEFAULT_API_PREFIX: &'static str = "/api/v1";
    pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
    pub const DEFAULT_REFRESH_TIMEOUT_MS: u64 = 10_000;
    pub const DEFAULT_SYNC_CLEANUP_MS: u64 = 1_000;
    pub const DEFAULT_REFRESH_RETRY_MS: u64 = 30_000;

    /// Local storage key holding the serialized token pair
    pub const TOKENS_KEY: &'static str = "pos_tokens";
    /// Local storage key used as the cross-tab broadcast channel
    pub const SYNC_KEY: &'static str = "pos_auth_sync";
    pub const SELECTED_STORE_KEY: &'static str = "pos_selected_store";

    /// Load defaults overlaid with `POS_SESSION_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed into its field
    pub fn from_env() -> CoreResult<Self> {
        Self::load(config::Environment::with_prefix("POS_SESSION").try_parsing(true))
    }

    /// Load defaults overlaid with a TOML document
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or a field has the
    /// wrong type
    pub fn from_toml(document: &str) -> CoreResult<Self> {
        Self::load(config::File::from_str(document, config::FileFormat::Toml))
    }

    fn load<S>(source: S) -> CoreResult<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let settings = config::Config::builder()
            .add_source(source)
            .build()
            .map_err(|err| CoreError::invalid_config(err.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|err| CoreError::invalid_config(err.to_string()))
    }

    /// Base URL every API path is appended to
    pub fn api_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.api_prefix)
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub const fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    pub const fn sync_cleanup(&self) -> Duration {
        Duration::from_millis(self.sync_cleanup_ms)
    }

    pub const fn refresh_retry(&self) -> Duration {
        Duration::from_millis(self.refresh_retry_ms)
    }

    /// Build the transport client for this configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be created
    pub fn build_client(&self) -> Result<PosClient, ClientError> {
        PosClient::builder()
            .base_url(self.api_url())
            .timeout(self.request_timeout())
            .refresh_timeout(self.refresh_timeout())
            .build()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_prefix: Self::DEFAULT_API_PREFIX.to_string(),
            request_timeout_ms: Self::DEFAULT_REQUEST_TIMEOUT_MS,
            refresh_timeout_ms: Self::DEFAULT_REFRESH_TIMEOUT_MS,
            expiry_buffer_ms: pos_core::DEFAULT_EXPIRY_BUFFER_MS,
            sync_cleanup_ms: Self::DEFAULT_SYNC_CLEANUP_MS,
            refresh_retry_ms: Self::DEFAULT_REFRESH_RETRY_MS,
            tokens_key: Self::TOKENS_KEY.to_string(),
            sync_key: Self::SYNC_KEY.to_string(),
            selected_store_key: Self::SELECTED_STORE_KEY.to_string(),
            login_path: "/login".to_string(),
            home_path: "/".to_string(),
        }
    }
}
