use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use tracing::{info, instrument};

use crate::api::AppState;
use crate::entities::ErrorResponse;
use health_bridge_domain::auth::UserInfo;
use health_bridge_domain::entities::{CreateWellnessRequest, UpdateWellnessRequest, WellnessQuery};
use health_bridge_domain::models::WellnessContent;

/// Create a draft article
#[utoipa::path(
    post,
    path = "/api/v1/wellness",
    request_body = CreateWellnessRequest,
    responses(
        (status = 201, description = "Draft created", body = WellnessContent),
        (status = 403, description = "Coach or admin role required", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "wellness"
)]
#[instrument(skip(state, request))]
pub async fn create_content(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<CreateWellnessRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let content = state.services.wellness.create(&user, request).await?;
    Ok((StatusCode::CREATED, Json(content)))
}

/// Published content, or the caller's own items with `mine=true`
#[utoipa::path(
    get,
    path = "/api/v1/wellness",
    params(WellnessQuery),
    responses(
        (status = 200, description = "Wellness content", body = [WellnessContent]),
    ),
    security(("bearer" = [])),
    tag = "wellness"
)]
#[instrument(skip(state))]
pub async fn list_content(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Query(query): Query<WellnessQuery>,
) -> Result<Json<Vec<WellnessContent>>, ErrorResponse> {
    Ok(Json(state.services.wellness.list(&user, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/wellness/{id}",
    params(("id" = String, Path, description = "Content ID")),
    responses(
        (status = 200, description = "Content found", body = WellnessContent),
        (status = 404, description = "Content not found or not visible", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "wellness"
)]
#[instrument(skip(state))]
pub async fn get_content(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
) -> Result<Json<WellnessContent>, ErrorResponse> {
    Ok(Json(state.services.wellness.get(&user, &id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/v1/wellness/{id}",
    params(("id" = String, Path, description = "Content ID")),
    request_body = UpdateWellnessRequest,
    responses(
        (status = 200, description = "Content updated", body = WellnessContent),
        (status = 403, description = "Only the author or an admin may edit", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "wellness"
)]
#[instrument(skip(state, request))]
pub async fn update_content(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
    Json(request): Json<UpdateWellnessRequest>,
) -> Result<Json<WellnessContent>, ErrorResponse> {
    Ok(Json(state.services.wellness.update(&user, &id, request).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/wellness/{id}/publish",
    params(("id" = String, Path, description = "Content ID")),
    responses(
        (status = 200, description = "Content published", body = WellnessContent),
        (status = 403, description = "Only the author or an admin may publish", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "wellness"
)]
#[instrument(skip(state))]
pub async fn publish_content(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
) -> Result<Json<WellnessContent>, ErrorResponse> {
    let content = state.services.wellness.publish(&user, &id).await?;
    info!("Wellness content {} published", content.id);
    Ok(Json(content))
}

#[utoipa::path(
    post,
    path = "/api/v1/wellness/{id}/unpublish",
    params(("id" = String, Path, description = "Content ID")),
    responses(
        (status = 200, description = "Content returned to draft", body = WellnessContent),
        (status = 403, description = "Only the author or an admin may unpublish", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "wellness"
)]
#[instrument(skip(state))]
pub async fn unpublish_content(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
) -> Result<Json<WellnessContent>, ErrorResponse> {
    Ok(Json(state.services.wellness.unpublish(&user, &id).await?))
}

#[utoipa::path(
    delete,
    path = "/api/v1/wellness/{id}",
    params(("id" = String, Path, description = "Content ID")),
    responses(
        (status = 204, description = "Content deleted"),
        (status = 403, description = "Only the author or an admin may delete", body = ErrorResponse),
        (status = 404, description = "Content not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "wellness"
)]
#[instrument(skip(state))]
pub async fn delete_content(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
) -> Result<StatusCode, ErrorResponse> {
    state.services.wellness.delete(&user, &id).await?;
    info!("Wellness content {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}
