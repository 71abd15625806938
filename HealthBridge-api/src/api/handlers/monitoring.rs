use axum::{
    extract::{Query, State},
    Extension, Json,
};
use tracing::instrument;

use crate::api::AppState;
use crate::entities::ErrorResponse;
use health_bridge_domain::auth::UserInfo;
use health_bridge_domain::entities::AuditQuery;
use health_bridge_domain::models::{AuditLog, SystemStats};

/// Platform-wide counts
#[utoipa::path(
    get,
    path = "/api/v1/admin/monitoring/stats",
    responses(
        (status = 200, description = "Current statistics", body = SystemStats),
        (status = 403, description = "Admin role required", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip(state))]
pub async fn system_stats(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
) -> Result<Json<SystemStats>, ErrorResponse> {
    Ok(Json(state.services.monitoring.stats(&user).await?))
}

/// Most recent authentication and account events
#[utoipa::path(
    get,
    path = "/api/v1/admin/monitoring/audit",
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit events, newest first", body = [AuditLog]),
        (status = 403, description = "Admin role required", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip(state))]
pub async fn audit_log(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditLog>>, ErrorResponse> {
    Ok(Json(state.services.monitoring.audit(&user, query).await?))
}
