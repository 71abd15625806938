use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use health_bridge_domain::models::Role;

/// Query parameters for the admin user listing
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    /// Only users with this role
    pub role: Option<Role>,
}

/// Query parameters for a manual sync run
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct SyncProcessQuery {
    /// Entries to process (default: SYNC_BATCH_SIZE, max: 500)
    pub batch_size: Option<usize>,
}
