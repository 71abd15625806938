use axum::{
    extract::{Query, State},
    Extension, Json,
};
use tracing::{info, instrument};

use crate::api::AppState;
use crate::entities::queries::SyncProcessQuery;
use crate::entities::ErrorResponse;
use health_bridge_domain::auth::UserInfo;
use health_bridge_domain::entities::{SyncBatchRequest, SyncBatchResponse, SyncReport};
use health_bridge_domain::models::SyncEntry;

const MAX_MANUAL_BATCH: usize = 500;

/// Upload operations recorded while offline
///
/// Each operation is queued and applied later by the sync worker, acting as
/// the uploading user. Re-uploading a `client_id` returns the existing entry.
#[utoipa::path(
    post,
    path = "/api/v1/sync/batch",
    request_body = SyncBatchRequest,
    responses(
        (status = 200, description = "Operations queued", body = SyncBatchResponse),
        (status = 400, description = "Malformed batch", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "sync"
)]
#[instrument(skip(state, request), fields(user_id = %user.user_id, operations = request.operations.len()))]
pub async fn upload_batch(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<SyncBatchRequest>,
) -> Result<Json<SyncBatchResponse>, ErrorResponse> {
    Ok(Json(state.services.sync.upload_batch(&user, request).await?))
}

/// The caller's queued operations and their outcome
#[utoipa::path(
    get,
    path = "/api/v1/sync/status",
    responses(
        (status = 200, description = "Queue entries, newest first", body = [SyncEntry]),
    ),
    security(("bearer" = [])),
    tag = "sync"
)]
#[instrument(skip(state))]
pub async fn sync_status(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
) -> Result<Json<Vec<SyncEntry>>, ErrorResponse> {
    Ok(Json(state.services.sync.status(&user).await?))
}

/// Run one sync pass now instead of waiting for the worker
#[utoipa::path(
    post,
    path = "/api/v1/admin/sync/process",
    params(SyncProcessQuery),
    responses(
        (status = 200, description = "Sync pass finished", body = SyncReport),
        (status = 403, description = "Admin role required", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip(state))]
pub async fn process_sync_queue(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Query(query): Query<SyncProcessQuery>,
) -> Result<Json<SyncReport>, ErrorResponse> {
    let batch_size = query
        .batch_size
        .unwrap_or(state.services.sync.config().batch_size)
        .clamp(1, MAX_MANUAL_BATCH);

    let report = state.services.sync.process_pending(batch_size).await?;
    info!("Admin {} ran a sync pass: {:?}", user.user_id, report);
    Ok(Json(report))
}
