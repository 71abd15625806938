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
use health_bridge_domain::entities::{ConsultationView, CreateConsultationRequest, UpdateConsultationRequest};

/// Record a consultation note for a confirmed or completed appointment
#[utoipa::path(
    post,
    path = "/api/v1/consultations",
    request_body = CreateConsultationRequest,
    responses(
        (status = 201, description = "Consultation note stored", body = ConsultationView),
        (status = 403, description = "Only the appointment's provider may write notes", body = ErrorResponse),
        (status = 409, description = "Appointment is not confirmed or completed", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "consultations"
)]
#[instrument(skip(state, request), fields(appointment_id = %request.appointment_id))]
pub async fn create_consultation(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<CreateConsultationRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let note = state.services.consultations.create(&user, request).await?;
    info!("Consultation note {} recorded", note.id);
    Ok((StatusCode::CREATED, Json(note)))
}

#[utoipa::path(
    get,
    path = "/api/v1/consultations/{id}",
    params(("id" = String, Path, description = "Consultation note ID")),
    responses(
        (status = 200, description = "Decrypted consultation note", body = ConsultationView),
        (status = 403, description = "No care relationship with the patient", body = ErrorResponse),
        (status = 404, description = "Consultation note not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "consultations"
)]
#[instrument(skip(state))]
pub async fn get_consultation(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
) -> Result<Json<ConsultationView>, ErrorResponse> {
    Ok(Json(state.services.consultations.get(&user, &id).await?))
}

#[utoipa::path(
    patch,
    path = "/api/v1/consultations/{id}",
    params(("id" = String, Path, description = "Consultation note ID")),
    request_body = UpdateConsultationRequest,
    responses(
        (status = 200, description = "Consultation note updated", body = ConsultationView),
        (status = 403, description = "Only the authoring provider may edit", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "consultations"
)]
#[instrument(skip(state, request))]
pub async fn update_consultation(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
    Json(request): Json<UpdateConsultationRequest>,
) -> Result<Json<ConsultationView>, ErrorResponse> {
    Ok(Json(state.services.consultations.update(&user, &id, request).await?))
}

/// Consultation history of one patient
#[utoipa::path(
    get,
    path = "/api/v1/patients/{id}/consultations",
    params(("id" = String, Path, description = "Patient user ID")),
    responses(
        (status = 200, description = "Decrypted consultation notes", body = [ConsultationView]),
        (status = 403, description = "No care relationship with the patient", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "consultations"
)]
#[instrument(skip(state))]
pub async fn list_patient_consultations(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(patient_id): Path<String>,
) -> Result<Json<Vec<ConsultationView>>, ErrorResponse> {
    Ok(Json(
        state
            .services
            .consultations
            .list_for_patient(&user, &patient_id)
            .await?,
    ))
}
