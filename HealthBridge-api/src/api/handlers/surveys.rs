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
use health_bridge_domain::entities::{CreateSurveyRequest, SubmitSurveyResponseRequest, SurveyQuery, SurveyResults};
use health_bridge_domain::models::{Survey, SurveyResponse};

/// Create a draft survey
#[utoipa::path(
    post,
    path = "/api/v1/surveys",
    request_body = CreateSurveyRequest,
    responses(
        (status = 201, description = "Survey created", body = Survey),
        (status = 400, description = "Invalid questions", body = ErrorResponse),
        (status = 403, description = "Researcher or admin role required", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "surveys"
)]
#[instrument(skip(state, request))]
pub async fn create_survey(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<CreateSurveyRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let survey = state.services.surveys.create(&user, request).await?;
    info!("Survey {} created with {} questions", survey.id, survey.questions.len());
    Ok((StatusCode::CREATED, Json(survey)))
}

/// Surveys visible to the caller; respondents only see active ones
#[utoipa::path(
    get,
    path = "/api/v1/surveys",
    params(SurveyQuery),
    responses(
        (status = 200, description = "Surveys", body = [Survey]),
    ),
    security(("bearer" = [])),
    tag = "surveys"
)]
#[instrument(skip(state))]
pub async fn list_surveys(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Query(query): Query<SurveyQuery>,
) -> Result<Json<Vec<Survey>>, ErrorResponse> {
    Ok(Json(state.services.surveys.list(&user, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/surveys/{id}",
    params(("id" = String, Path, description = "Survey ID")),
    responses(
        (status = 200, description = "Survey found", body = Survey),
        (status = 404, description = "Survey not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "surveys"
)]
#[instrument(skip(state))]
pub async fn get_survey(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
) -> Result<Json<Survey>, ErrorResponse> {
    Ok(Json(state.services.surveys.get(&user, &id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/surveys/{id}/activate",
    params(("id" = String, Path, description = "Survey ID")),
    responses(
        (status = 200, description = "Survey is accepting responses", body = Survey),
        (status = 409, description = "Survey is not a draft", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "surveys"
)]
#[instrument(skip(state))]
pub async fn activate_survey(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
) -> Result<Json<Survey>, ErrorResponse> {
    Ok(Json(state.services.surveys.activate(&user, &id).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/surveys/{id}/close",
    params(("id" = String, Path, description = "Survey ID")),
    responses(
        (status = 200, description = "Survey closed", body = Survey),
        (status = 409, description = "Survey is not active", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "surveys"
)]
#[instrument(skip(state))]
pub async fn close_survey(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
) -> Result<Json<Survey>, ErrorResponse> {
    Ok(Json(state.services.surveys.close(&user, &id).await?))
}

/// Answer an active survey (once per user)
#[utoipa::path(
    post,
    path = "/api/v1/surveys/{id}/responses",
    params(("id" = String, Path, description = "Survey ID")),
    request_body = SubmitSurveyResponseRequest,
    responses(
        (status = 201, description = "Response recorded", body = SurveyResponse),
        (status = 400, description = "Answers do not match the questions", body = ErrorResponse),
        (status = 409, description = "Already answered, or survey not active", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "surveys"
)]
#[instrument(skip(state, request))]
pub async fn respond_to_survey(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
    Json(request): Json<SubmitSurveyResponseRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let response = state.services.surveys.respond(&user, &id, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/api/v1/surveys/{id}/results",
    params(("id" = String, Path, description = "Survey ID")),
    responses(
        (status = 200, description = "Aggregated answers", body = SurveyResults),
        (status = 403, description = "Only the creator or an admin may view results", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "surveys"
)]
#[instrument(skip(state))]
pub async fn survey_results(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
) -> Result<Json<SurveyResults>, ErrorResponse> {
    Ok(Json(state.services.surveys.results(&user, &id).await?))
}
