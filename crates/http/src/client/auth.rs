//! Authentication API client methods

use super::{ClientError, PosClient};
use crate::types::{
    AuthResponse, LoginRequest, LogoutRequest, RefreshTokenRequest, RegisterRequest, TokenPair,
    UserSnapshot,
};
use async_trait::async_trait;
use serde::de::IgnoredAny;

/// The authentication endpoints the session controller drives.
///
/// Everything except [`me`](AuthApi::me) is public: those endpoints are how
/// credentials are obtained in the first place.
#[async_trait(?Send)]
pub trait AuthApi {
    /// `POST /auth/login`
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ClientError>;

    /// `POST /auth/register`
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ClientError>;

    /// `POST /auth/refresh`, bounded by the refresh timeout
    async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenPair, ClientError>;

    /// `POST /auth/logout`, invalidating the refresh token server-side
    async fn logout(&self, refresh_token: &str) -> Result<(), ClientError>;

    /// `GET /me`
    async fn me(&self) -> Result<UserSnapshot, ClientError>;
}

#[async_trait(?Send)]
impl AuthApi for PosClient {
    async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ClientError> {
        self.post_public("/auth/login", request).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        self.post_public("/auth/register", request).await
    }

    async fn refresh_tokens(&self, refresh_token: &str) -> Result<TokenPair, ClientError> {
        let request = RefreshTokenRequest {
            refresh_token: refresh_token.to_string(),
        };
        self.post_public_with_timeout("/auth/refresh", &request, self.refresh_timeout())
            .await
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), ClientError> {
        let request = LogoutRequest {
            refresh_token: refresh_token.to_string(),
        };
        let _: IgnoredAny = self.post_public("/auth/logout", &request).await?;
        Ok(())
    }

    async fn me(&self) -> Result<UserSnapshot, ClientError> {
        self.get("/me").await
    }
}
