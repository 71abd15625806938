use serde::{Deserialize, Serialize};

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

/// Row count for one value of a grouped column
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct GroupCount {
    pub key: String,
    pub count: i64,
}

/// Invoice count and total for one status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct InvoiceTotal {
    pub status: String,
    pub count: i64,
    pub amount_cents: i64,
}

/// Platform-wide counters for the admin dashboard
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct SystemStats {
    pub users_by_role: Vec<GroupCount>,
    pub appointments_by_status: Vec<GroupCount>,
    pub invoices_by_status: Vec<InvoiceTotal>,
    pub wellness_by_status: Vec<GroupCount>,
    pub assignments: i64,
    pub submissions: i64,
    pub surveys_by_status: Vec<GroupCount>,
    pub survey_responses: i64,
    pub sync_queue_by_status: Vec<GroupCount>,
}
