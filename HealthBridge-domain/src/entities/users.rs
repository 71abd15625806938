use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

use crate::auth::token::TokenPair;
use health_bridge_data::models::{Role, User};

/// Self-registration. Only patient and student accounts can be created this way.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct RegisterRequest {
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,

    pub password: String,

    #[validate(length(min = 1, max = 200, message = "Full name must be between 1 and 200 characters"))]
    pub full_name: String,

    /// Defaults to patient
    pub role: Option<Role>,

    #[validate(length(max = 30, message = "Phone cannot exceed 30 characters"))]
    pub phone: Option<String>,

    #[validate(length(max = 100, message = "Region cannot exceed 100 characters"))]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Fields a user may change on their own profile
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 200, message = "Full name must be between 1 and 200 characters"))]
    pub full_name: Option<String>,
    #[validate(length(max = 30, message = "Phone cannot exceed 30 characters"))]
    pub phone: Option<String>,
    #[validate(length(max = 100, message = "Region cannot exceed 100 characters"))]
    pub region: Option<String>,
}

/// Admin-created account with any role
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct CreateUserRequest {
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,
    pub password: String,
    #[validate(length(min = 1, max = 200, message = "Full name must be between 1 and 200 characters"))]
    pub full_name: String,
    pub role: Role,
    #[validate(length(max = 30, message = "Phone cannot exceed 30 characters"))]
    pub phone: Option<String>,
    #[validate(length(max = 100, message = "Region cannot exceed 100 characters"))]
    pub region: Option<String>,
    /// Consultation fee for providers, in cents
    #[validate(range(min = 0, message = "Consultation fee cannot be negative"))]
    pub consultation_fee_cents: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct UpdateUserStatusRequest {
    pub is_active: bool,
}

/// Account details returned to the account owner and admins
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub region: Option<String>,
    pub consultation_fee_cents: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            role: user.role,
            phone: user.phone,
            region: user.region,
            consultation_fee_cents: user.consultation_fee_cents,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

/// Public provider listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct ProviderSummary {
    pub id: String,
    pub full_name: String,
    pub region: Option<String>,
    pub consultation_fee_cents: Option<i64>,
}

impl From<User> for ProviderSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name,
            region: user.region,
            consultation_fee_cents: user.consultation_fee_cents,
        }
    }
}

/// Tokens plus the authenticated account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Always "Bearer"
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub user: UserProfile,
}

impl AuthResponse {
    pub fn new(tokens: TokenPair, user: UserProfile) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: tokens.token_type,
            expires_in: tokens.expires_in,
            user,
        }
    }
}
