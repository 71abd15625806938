use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

/// Processing state of a queued offline operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Synced,
    Failed,
}

text_enum!(SyncStatus {
    Pending => "pending",
    Synced => "synced",
    Failed => "failed",
});

/// Operation recorded by a client while offline and uploaded later
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct SyncEntry {
    pub id: String,
    pub user_id: String,
    /// Client-generated id, unique per user
    pub client_id: String,
    pub entity_type: String,
    pub operation: String,
    #[cfg_attr(feature = "with-api", schema(value_type = Object))]
    pub payload: serde_json::Value,
    pub status: SyncStatus,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub client_timestamp: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewSyncEntry {
    pub user_id: String,
    pub client_id: String,
    pub entity_type: String,
    pub operation: String,
    pub payload: serde_json::Value,
    pub client_timestamp: Option<DateTime<Utc>>,
}
