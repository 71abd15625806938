use serde::{Deserialize, Serialize};

#[cfg(feature = "with-api")]
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_AUDIT_LIMIT: usize = 50;
pub const MAX_AUDIT_LIMIT: usize = 500;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema, IntoParams))]
#[cfg_attr(feature = "with-api", into_params(parameter_in = Query))]
pub struct AuditQuery {
    /// Number of events (default 50, max 500)
    pub limit: Option<usize>,
}
