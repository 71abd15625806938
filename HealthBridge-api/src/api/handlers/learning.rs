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
use health_bridge_domain::entities::{
    CreateAssignmentRequest, GradeSubmissionRequest, SubmitAssignmentRequest, UpdateAssignmentRequest,
};
use health_bridge_domain::models::{Assignment, Submission};

#[utoipa::path(
    post,
    path = "/api/v1/assignments",
    request_body = CreateAssignmentRequest,
    responses(
        (status = 201, description = "Assignment created", body = Assignment),
        (status = 403, description = "Educator or admin role required", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "learning"
)]
#[instrument(skip(state, request))]
pub async fn create_assignment(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<CreateAssignmentRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let assignment = state.services.learning.create_assignment(&user, request).await?;
    info!("Assignment {} created", assignment.id);
    Ok((StatusCode::CREATED, Json(assignment)))
}

/// Educators see their own assignments, everyone else sees all
#[utoipa::path(
    get,
    path = "/api/v1/assignments",
    responses(
        (status = 200, description = "Assignments", body = [Assignment]),
    ),
    security(("bearer" = [])),
    tag = "learning"
)]
#[instrument(skip(state))]
pub async fn list_assignments(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
) -> Result<Json<Vec<Assignment>>, ErrorResponse> {
    Ok(Json(state.services.learning.list_assignments(&user).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/assignments/{id}",
    params(("id" = String, Path, description = "Assignment ID")),
    responses(
        (status = 200, description = "Assignment found", body = Assignment),
        (status = 403, description = "Set by another educator", body = ErrorResponse),
        (status = 404, description = "Assignment not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "learning"
)]
#[instrument(skip(state))]
pub async fn get_assignment(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
) -> Result<Json<Assignment>, ErrorResponse> {
    Ok(Json(state.services.learning.get_assignment(&user, &id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/v1/assignments/{id}",
    params(("id" = String, Path, description = "Assignment ID")),
    request_body = UpdateAssignmentRequest,
    responses(
        (status = 200, description = "Assignment updated", body = Assignment),
        (status = 403, description = "Only the owning educator or an admin may edit", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "learning"
)]
#[instrument(skip(state, request))]
pub async fn update_assignment(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
    Json(request): Json<UpdateAssignmentRequest>,
) -> Result<Json<Assignment>, ErrorResponse> {
    Ok(Json(state.services.learning.update_assignment(&user, &id, request).await?))
}

/// Submit (or, until graded, resubmit) work for an assignment
#[utoipa::path(
    post,
    path = "/api/v1/assignments/{id}/submissions",
    params(("id" = String, Path, description = "Assignment ID")),
    request_body = SubmitAssignmentRequest,
    responses(
        (status = 201, description = "Submission stored", body = Submission),
        (status = 403, description = "Student role required", body = ErrorResponse),
        (status = 409, description = "Submission already graded", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "learning"
)]
#[instrument(skip(state, request))]
pub async fn submit_assignment(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
    Json(request): Json<SubmitAssignmentRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let submission = state.services.learning.submit(&user, &id, request).await?;
    if submission.is_late {
        info!("Late submission {} for assignment {}", submission.id, id);
    }
    Ok((StatusCode::CREATED, Json(submission)))
}

#[utoipa::path(
    get,
    path = "/api/v1/assignments/{id}/submissions",
    params(("id" = String, Path, description = "Assignment ID")),
    responses(
        (status = 200, description = "Submissions for the assignment", body = [Submission]),
        (status = 403, description = "Only the owning educator or an admin may list", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "learning"
)]
#[instrument(skip(state))]
pub async fn list_assignment_submissions(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Submission>>, ErrorResponse> {
    Ok(Json(
        state
            .services
            .learning
            .list_submissions_for_assignment(&user, &id)
            .await?,
    ))
}

/// The caller's own submissions
#[utoipa::path(
    get,
    path = "/api/v1/submissions/mine",
    responses(
        (status = 200, description = "Own submissions", body = [Submission]),
    ),
    security(("bearer" = [])),
    tag = "learning"
)]
#[instrument(skip(state))]
pub async fn list_my_submissions(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
) -> Result<Json<Vec<Submission>>, ErrorResponse> {
    Ok(Json(state.services.learning.list_my_submissions(&user).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/submissions/{id}",
    params(("id" = String, Path, description = "Submission ID")),
    responses(
        (status = 200, description = "Submission found", body = Submission),
        (status = 403, description = "Not the student or the educator", body = ErrorResponse),
        (status = 404, description = "Submission not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "learning"
)]
#[instrument(skip(state))]
pub async fn get_submission(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
) -> Result<Json<Submission>, ErrorResponse> {
    Ok(Json(state.services.learning.get_submission(&user, &id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/submissions/{id}/grade",
    params(("id" = String, Path, description = "Submission ID")),
    request_body = GradeSubmissionRequest,
    responses(
        (status = 200, description = "Submission graded", body = Submission),
        (status = 400, description = "Score out of range", body = ErrorResponse),
        (status = 403, description = "Only the owning educator or an admin may grade", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "learning"
)]
#[instrument(skip(state, request))]
pub async fn grade_submission(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
    Json(request): Json<GradeSubmissionRequest>,
) -> Result<Json<Submission>, ErrorResponse> {
    Ok(Json(state.services.learning.grade(&user, &id, request).await?))
}
