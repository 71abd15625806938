use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

use health_bridge_data::models::SyncEntry;

/// One operation recorded by a client while offline
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct SyncOperationRequest {
    /// Client-generated id; re-uploading the same id is a no-op
    #[validate(length(min = 1, max = 100, message = "client_id must be between 1 and 100 characters"))]
    pub client_id: String,

    /// appointment, survey_response, submission or policy_acknowledgement
    #[validate(length(min = 1, max = 50, message = "entity_type must be between 1 and 50 characters"))]
    pub entity_type: String,

    /// create or cancel
    #[validate(length(min = 1, max = 50, message = "operation must be between 1 and 50 characters"))]
    pub operation: String,

    #[cfg_attr(feature = "with-api", schema(value_type = Object))]
    pub payload: serde_json::Value,

    /// When the operation happened on the device
    pub client_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct SyncBatchRequest {
    #[validate(length(min = 1, max = 500, message = "A batch holds between 1 and 500 operations"))]
    pub operations: Vec<SyncOperationRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct SyncBatchResponse {
    /// Newly queued operations
    pub accepted: usize,
    /// Operations already queued by an earlier upload
    pub duplicates: usize,
    pub entries: Vec<SyncEntry>,
}

/// Result of one pass over the pending queue
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct SyncReport {
    pub processed: usize,
    pub synced: usize,
    /// Entries that gave up for good
    pub failed: usize,
    /// Entries left pending for another attempt
    pub retried: usize,
}
