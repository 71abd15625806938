use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

/// Published platform policy (privacy, terms of use, clinical guidelines)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct Policy {
    pub id: String,
    pub title: String,
    pub content: String,
    pub version: String,
    pub category: String,
    pub effective_date: NaiveDate,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPolicy {
    pub title: String,
    pub content: String,
    pub version: String,
    pub category: String,
    pub effective_date: NaiveDate,
    pub created_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct PolicyAcknowledgement {
    pub policy_id: String,
    pub user_id: String,
    pub acknowledged_at: DateTime<Utc>,
}

/// Number of users who acknowledged a policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct PolicyAcknowledgementCount {
    pub policy_id: String,
    pub title: String,
    pub version: String,
    pub acknowledgements: i64,
}
