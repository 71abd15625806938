use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

/// Platform role. Every user has exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Patient,
    Provider,
    /// Wellness coach
    Coach,
    Student,
    Educator,
    Researcher,
    Admin,
}

text_enum!(Role {
    Patient => "patient",
    Provider => "provider",
    Coach => "coach",
    Student => "student",
    Educator => "educator",
    Researcher => "researcher",
    Admin => "admin",
});

impl Role {
    /// Roles a visitor may pick when registering without an admin
    pub fn is_self_registrable(&self) -> bool {
        matches!(self, Role::Patient | Role::Student)
    }
}

/// Storage model for a user account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    /// Argon2 PHC string, never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub region: Option<String>,
    /// Provider fee per consultation
    pub consultation_fee_cents: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for inserting a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub region: Option<String>,
    pub consultation_fee_cents: Option<i64>,
}

/// Profile fields a user may change themself
#[derive(Debug, Clone, Default)]
pub struct UserProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub region: Option<String>,
}
