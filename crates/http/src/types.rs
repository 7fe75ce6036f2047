//! Request and response bodies of the POS REST API

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Access and refresh bearer credentials.
///
/// `Debug` never prints either credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Password login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Tenant sign-up request; creates the tenant, its first store and an admin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub tenant_name: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub store_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_address: Option<String>,
}

/// Response of login and register
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub user: Option<UserSummary>,
    pub tokens: TokenPair,
}

/// The user record embedded in [`AuthResponse`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    #[serde(default)]
    pub tenant_id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

/// Current user with roles, permissions and accessible stores (`GET /me`).
///
/// Always replaced as a whole when reloaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub id: String,
    #[serde(default)]
    pub tenant_id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub roles: Vec<RoleSummary>,
    /// Feature slug to allowed actions
    #[serde(default)]
    pub permissions: HashMap<String, HashSet<String>>,
    #[serde(default)]
    pub stores: Vec<StoreSummary>,
    /// Tenant super-admin bit: every store and every permission
    #[serde(default)]
    pub all_stores_access: bool,
}

const fn default_true() -> bool {
    true
}

impl UserSnapshot {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Whether the user may perform `action` on `feature`.
    pub fn has_permission(&self, feature: &str, action: &str) -> bool {
        self.all_stores_access
            || self
                .permissions
                .get(feature)
                .is_some_and(|actions| actions.contains(action))
    }

    /// Whether the user may work in the store `store_id`.
    pub fn can_access_store(&self, store_id: &str) -> bool {
        self.all_stores_access || self.stores.iter().any(|store| store.id == store_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub id: String,
    #[serde(default)]
    pub tenant_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Body of every non-2xx API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_pair_debug_is_redacted() {
        let pair = TokenPair::new("secret-access", "secret-refresh");
        let printed = format!("{pair:?}");
        assert!(!printed.contains("secret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_user_snapshot_from_me_response() {
        let user: UserSnapshot = serde_json::from_value(json!({
            "id": "u1",
            "tenant_id": "t1",
            "email": "cashier@example.com",
            "first_name": "Ana",
            "last_name": "Lopez",
            "is_email_verified": true,
            "is_active": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
            "roles": [{ "id": "r1", "name": "Cashier" }],
            "permissions": { "sales": ["read", "create"] },
            "stores": [{ "id": "s1", "tenant_id": "t1", "name": "Main", "is_active": true }],
            "all_stores_access": false
        }))
        .unwrap();

        assert_eq!(user.full_name(), "Ana Lopez");
        assert!(user.has_permission("sales", "create"));
        assert!(!user.has_permission("sales", "delete"));
        assert!(!user.has_permission("inventory", "read"));
        assert!(user.can_access_store("s1"));
        assert!(!user.can_access_store("s2"));
    }

    #[test]
    fn test_all_stores_access_short_circuits() {
        let user = UserSnapshot {
            all_stores_access: true,
            ..UserSnapshot::default()
        };
        assert!(user.has_permission("anything", "delete"));
        assert!(user.can_access_store("any-store"));
    }

    #[test]
    fn test_register_request_omits_empty_address() {
        let request = RegisterRequest {
            tenant_name: "Acme".into(),
            email: "owner@acme.test".into(),
            password: "hunter22".into(),
            first_name: "Jo".into(),
            last_name: "Doe".into(),
            store_name: "Downtown".into(),
            store_address: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("store_address").is_none());
    }
}
