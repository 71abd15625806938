use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

/// Persisted security event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct AuditLog {
    pub id: String,
    pub event_type: String,
    pub user_id: Option<String>,
    pub success: bool,
    pub resource: Option<String>,
    pub details: Option<String>,
    pub auth_method: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAuditLog {
    pub event_type: String,
    pub user_id: Option<String>,
    pub success: bool,
    pub resource: Option<String>,
    pub details: Option<String>,
    pub auth_method: Option<String>,
    pub created_at: DateTime<Utc>,
}
