//! POS HTTP client
//!
//! Every call carries a JSON content type and a deadline. Authenticated calls
//! attach the current bearer token from a [`CredentialSource`]; a 401 on such
//! a call triggers one credential refresh and one retry of the original
//! request, never more.

pub mod auth;
pub mod error;

use async_trait::async_trait;
use error::ClientError;
use pos_core::rt;
use reqwest::{Client, ClientBuilder, Method, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::{debug, warn};

/// Default deadline for every API call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default deadline for the token refresh call
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// Supplies bearer credentials and recovers them after a 401.
#[async_trait(?Send)]
pub trait CredentialSource {
    /// The access token to attach, if a session is held.
    fn access_token(&self) -> Option<String>;

    /// Obtain fresh credentials; `true` when a new token is now available.
    ///
    /// Concurrent callers are expected to share one refresh.
    async fn refresh(&self) -> bool;

    /// The session could not be recovered.
    fn on_unauthorized(&self);
}

/// POS API client
#[derive(Clone)]
pub struct PosClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    refresh_timeout: Duration,
    credentials: Option<Weak<dyn CredentialSource>>,
}

struct RawResponse {
    status: u16,
    body: String,
}

impl PosClient {
    /// Create a new client with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> PosClientBuilder {
        PosClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    pub const fn refresh_timeout(&self) -> Duration {
        self.refresh_timeout
    }

    /// A client sharing this one's connection pool that authenticates
    /// through `credentials`.
    ///
    /// Only a weak reference is held so the credential owner may itself own
    /// the client.
    #[must_use]
    pub fn with_credentials(&self, credentials: Weak<dyn CredentialSource>) -> Self {
        Self {
            credentials: Some(credentials),
            ..self.clone()
        }
    }

    fn credentials(&self) -> Option<Rc<dyn CredentialSource>> {
        self.credentials.as_ref().and_then(Weak::upgrade)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.authenticated(Method::GET, path, None).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = to_json(body)?;
        self.authenticated(Method::POST, path, Some(&body)).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = to_json(body)?;
        self.authenticated(Method::PUT, path, Some(&body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.authenticated(Method::DELETE, path, None).await
    }

    /// POST without credentials and without 401 recovery.
    pub async fn post_public<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.post_public_with_timeout(path, body, self.timeout).await
    }

    /// [`post_public`](Self::post_public) with an explicit deadline.
    pub async fn post_public_with_timeout<B, T>(
        &self,
        path: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = to_json(body)?;
        let response = self
            .dispatch(Method::POST, path, Some(&body), None, timeout)
            .await?;
        decode(response)
    }

    async fn authenticated<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ClientError> {
        let credentials = self.credentials();
        let token = credentials.as_ref().and_then(|c| c.access_token());
        let response = self
            .dispatch(method.clone(), path, body, token.clone(), self.timeout)
            .await?;

        if response.status != 401 {
            return decode(response);
        }
        let Some(credentials) = credentials else {
            return decode(response);
        };

        let current = credentials.access_token();
        let recovered = if current.is_some() && current != token {
            debug!("{method} {path} returned 401 for replaced credentials, retrying");
            true
        } else {
            debug!("{method} {path} returned 401, refreshing credentials");
            credentials.refresh().await
        };
        if !recovered {
            warn!("credential refresh failed after 401 on {method} {path}");
            credentials.on_unauthorized();
            return Err(ClientError::unauthorized());
        }

        let token = credentials.access_token();
        let retry = self.dispatch(method, path, body, token, self.timeout).await?;
        decode(retry)
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<RawResponse, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .request(method, url)
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let exchange = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let body = response.text().await?;
            Ok::<_, reqwest::Error>(RawResponse { status, body })
        };

        Ok(rt::timeout(timeout, exchange).await??)
    }
}

fn to_json<B: Serialize + ?Sized>(body: &B) -> Result<Value, ClientError> {
    serde_json::to_value(body).map_err(|err| ClientError::unexpected(err.to_string()))
}

fn decode<T: DeserializeOwned>(response: RawResponse) -> Result<T, ClientError> {
    if !(200..300).contains(&response.status) {
        return Err(ClientError::from_response(response.status, &response.body));
    }

    let parsed = if response.status == 204 || response.body.trim().is_empty() {
        serde_json::from_value(Value::Null)
    } else {
        serde_json::from_str(&response.body)
    };
    parsed.map_err(|err| ClientError::unexpected(format!("Invalid response body: {err}")))
}

/// Builder for PosClient
#[derive(Default)]
pub struct PosClientBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    refresh_timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl PosClientBuilder {
    /// Set the base URL, including any API prefix
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the per-request timeout
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the timeout of the token refresh call
    pub const fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = Some(timeout);
        self
    }

    /// Set the user agent (ignored in the browser)
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client
    pub fn build(self) -> Result<PosClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        #[cfg(not(target_arch = "wasm32"))]
        let client = ClientBuilder::new()
            .user_agent(
                self.user_agent
                    .unwrap_or_else(|| format!("pos-client/{}", env!("CARGO_PKG_VERSION"))),
            )
            .build()
            .map_err(|err| ClientError::Configuration(err.to_string()))?;

        #[cfg(target_arch = "wasm32")]
        let client = {
            let _ = self.user_agent; // Browsers own the User-Agent header
            ClientBuilder::new()
                .build()
                .map_err(|err| ClientError::Configuration(err.to_string()))?
        };

        Ok(PosClient {
            client,
            base_url,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            refresh_timeout: self.refresh_timeout.unwrap_or(DEFAULT_REFRESH_TIMEOUT),
            credentials: None,
        })
    }
}

impl std::fmt::Debug for PosClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PosClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("refresh_timeout", &self.refresh_timeout)
            .field("authenticated", &self.credentials.is_some())
            .finish_non_exhaustive()
    }
}
