use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use tracing::{info, instrument};

use crate::api::AppState;
use crate::entities::ErrorResponse;
use health_bridge_domain::auth::UserInfo;
use health_bridge_domain::entities::CreatePolicyRequest;
use health_bridge_domain::models::{Policy, PolicyAcknowledgement, PolicyAcknowledgementCount};

/// Publish a new policy version
#[utoipa::path(
    post,
    path = "/api/v1/policies",
    request_body = CreatePolicyRequest,
    responses(
        (status = 201, description = "Policy created", body = Policy),
        (status = 403, description = "Admin role required", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "policies"
)]
#[instrument(skip(state, request))]
pub async fn create_policy(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<CreatePolicyRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let policy = state.services.policies.create(&user, request).await?;
    info!("Policy {} version {} created", policy.id, policy.version);
    Ok((StatusCode::CREATED, Json(policy)))
}

#[utoipa::path(
    get,
    path = "/api/v1/policies",
    responses(
        (status = 200, description = "All policies", body = [Policy]),
    ),
    security(("bearer" = [])),
    tag = "policies"
)]
#[instrument(skip(state))]
pub async fn list_policies(State(state): State<AppState>) -> Result<Json<Vec<Policy>>, ErrorResponse> {
    Ok(Json(state.services.policies.list().await?))
}

/// Policies the caller has not acknowledged yet
#[utoipa::path(
    get,
    path = "/api/v1/policies/pending",
    responses(
        (status = 200, description = "Unacknowledged policies", body = [Policy]),
    ),
    security(("bearer" = [])),
    tag = "policies"
)]
#[instrument(skip(state))]
pub async fn pending_policies(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
) -> Result<Json<Vec<Policy>>, ErrorResponse> {
    Ok(Json(state.services.policies.pending(&user).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/policies/{id}",
    params(("id" = String, Path, description = "Policy ID")),
    responses(
        (status = 200, description = "Policy found", body = Policy),
        (status = 404, description = "Policy not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "policies"
)]
#[instrument(skip(state))]
pub async fn get_policy(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Policy>, ErrorResponse> {
    Ok(Json(state.services.policies.get(&id).await?))
}

/// Acknowledge a policy. Repeating the call keeps the first acknowledgement.
#[utoipa::path(
    post,
    path = "/api/v1/policies/{id}/acknowledge",
    params(("id" = String, Path, description = "Policy ID")),
    responses(
        (status = 200, description = "Policy acknowledged", body = PolicyAcknowledgement),
        (status = 404, description = "Policy not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "policies"
)]
#[instrument(skip(state))]
pub async fn acknowledge_policy(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
) -> Result<Json<PolicyAcknowledgement>, ErrorResponse> {
    Ok(Json(state.services.policies.acknowledge(&user, &id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/policies/acknowledgements",
    responses(
        (status = 200, description = "Acknowledgement counts per policy", body = [PolicyAcknowledgementCount]),
        (status = 403, description = "Admin role required", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
#[instrument(skip(state))]
pub async fn acknowledgement_counts(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
) -> Result<Json<Vec<PolicyAcknowledgementCount>>, ErrorResponse> {
    Ok(Json(state.services.policies.acknowledgement_counts(&user).await?))
}
