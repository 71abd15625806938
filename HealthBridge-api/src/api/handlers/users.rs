use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use tracing::{info, instrument};

use crate::api::AppState;
use crate::entities::queries::UserListQuery;
use crate::entities::ErrorResponse;
use health_bridge_domain::auth::UserInfo;
use health_bridge_domain::entities::{
    CreateUserRequest, ProviderSummary, UpdateProfileRequest, UpdateUserStatusRequest, UserProfile,
};

/// Profile of the authenticated user
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses(
        (status = 200, description = "Current profile", body = UserProfile),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
#[instrument(skip(state), fields(user_id = %user.user_id))]
pub async fn get_me(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
) -> Result<Json<UserProfile>, ErrorResponse> {
    Ok(Json(state.services.users.me(&user).await?))
}

/// Update name, phone or region of the authenticated user
#[utoipa::path(
    patch,
    path = "/api/v1/users/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserProfile),
        (status = 400, description = "Invalid profile data", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
#[instrument(skip(state, request), fields(user_id = %user.user_id))]
pub async fn update_me(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserProfile>, ErrorResponse> {
    Ok(Json(state.services.users.update_profile(&user, request).await?))
}

/// Active providers with their consultation fee
#[utoipa::path(
    get,
    path = "/api/v1/providers",
    responses(
        (status = 200, description = "Active providers", body = [ProviderSummary]),
    ),
    security(("bearer" = [])),
    tag = "users"
)]
#[instrument(skip(state))]
pub async fn list_providers(State(state): State<AppState>) -> Result<Json<Vec<ProviderSummary>>, ErrorResponse> {
    Ok(Json(state.services.users.list_providers().await?))
}

/// Create an account with any role
#[utoipa::path(
    post,
    path = "/api/v1/admin/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Account created", body = UserProfile),
        (status = 400, description = "Invalid account data", body = ErrorResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip(state, request), fields(admin_id = %user.user_id))]
pub async fn create_user(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let profile = state.services.users.create_user(&user, request).await?;
    info!("Admin {} created {} account {}", user.user_id, profile.role, profile.id);
    Ok((StatusCode::CREATED, Json(profile)))
}

/// All accounts, optionally filtered by role
#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Accounts", body = [UserProfile]),
        (status = 403, description = "Admin role required", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<UserProfile>>, ErrorResponse> {
    Ok(Json(state.services.users.list_users(&user, query.role).await?))
}

/// Activate or deactivate an account
#[utoipa::path(
    patch,
    path = "/api/v1/admin/users/{id}/status",
    params(("id" = String, Path, description = "User ID")),
    request_body = UpdateUserStatusRequest,
    responses(
        (status = 200, description = "Account updated", body = UserProfile),
        (status = 400, description = "Admins cannot deactivate themselves", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip(state, request))]
pub async fn update_user_status(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
    Json(request): Json<UpdateUserStatusRequest>,
) -> Result<Json<UserProfile>, ErrorResponse> {
    Ok(Json(
        state
            .services
            .users
            .set_user_status(&user, &id, request.is_active)
            .await?,
    ))
}
