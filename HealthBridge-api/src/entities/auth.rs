use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use health_bridge_domain::auth::{Claims, UserInfo};
use health_bridge_domain::models::Role;

/// Logout request payload. The body may be omitted entirely.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct LogoutRequest {
    /// Refresh token to revoke together with the access token
    pub refresh_token: Option<String>,
}

/// Simple confirmation message
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Identity behind the presented access token
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthInfoResponse {
    /// User ID
    pub user_id: String,

    pub role: Role,

    /// Authentication source (jwt)
    pub auth_source: String,

    /// When the access token expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthInfoResponse {
    pub fn new(user: UserInfo, claims: Option<&Claims>) -> Self {
        Self {
            user_id: user.user_id,
            role: user.role,
            auth_source: user.auth_source,
            expires_at: claims.and_then(|c| Utc.timestamp_opt(c.exp, 0).single()),
        }
    }
}
