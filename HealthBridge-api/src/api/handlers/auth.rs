use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use tracing::{info, instrument};

use crate::api::AppState;
use crate::entities::auth::{AuthInfoResponse, LogoutRequest, MessageResponse};
use crate::entities::ErrorResponse;
use health_bridge_domain::auth::{Claims, UserInfo};
use health_bridge_domain::entities::{AuthResponse, LoginRequest, RefreshRequest, RegisterRequest};

/// Register a patient or student account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid registration data", body = ErrorResponse),
        (status = 403, description = "Role cannot self-register", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
    ),
    tag = "Authentication"
)]
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let response = state.services.users.register(request).await?;
    info!("Registered user {}", response.user.id);
    Ok((StatusCode::CREATED, Json(response)))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
    ),
    tag = "Authentication"
)]
#[instrument(skip(state, request))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ErrorResponse> {
    Ok(Json(state.services.users.login(request).await?))
}

/// Exchange a refresh token for a new token pair
#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens refreshed", body = AuthResponse),
        (status = 401, description = "Invalid or expired refresh token", body = ErrorResponse),
    ),
    tag = "Authentication"
)]
#[instrument(skip(state, request))]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ErrorResponse> {
    Ok(Json(state.services.users.refresh(&request.refresh_token).await?))
}

/// Revoke the presented access token (and optionally a refresh token)
#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body(content = LogoutRequest, description = "Optional refresh token to revoke"),
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "Authentication"
)]
#[instrument(skip(state, claims, body))]
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: Option<Json<LogoutRequest>>,
) -> Json<MessageResponse> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    state.services.users.logout(&claims, request.refresh_token.as_deref());
    Json(MessageResponse::new("Logged out successfully"))
}

/// Identity behind the current access token
#[utoipa::path(
    get,
    path = "/auth/info",
    responses(
        (status = 200, description = "Authenticated identity", body = AuthInfoResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    ),
    security(
        ("bearer" = [])
    ),
    tag = "Authentication"
)]
pub async fn auth_info(
    Extension(user): Extension<UserInfo>,
    claims: Option<Extension<Claims>>,
) -> Json<AuthInfoResponse> {
    let claims = claims.map(|Extension(claims)| claims);
    Json(AuthInfoResponse::new(user, claims.as_ref()))
}
