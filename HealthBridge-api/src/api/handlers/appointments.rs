use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::SecondsFormat;
use tracing::{info, instrument, warn};

use crate::api::AppState;
use crate::entities::{AppointmentPaginatedResponse, ErrorResponse, PaginatedResponse};
use health_bridge_domain::auth::UserInfo;
use health_bridge_domain::entities::{
    AppointmentListQuery, BookAppointmentRequest, BookingOutcome, PaymentStatus, RescheduleRequest,
    UpdateAppointmentStatusRequest,
};
use health_bridge_domain::models::Appointment;

const APPOINTMENTS_URL: &str = "/api/v1/appointments";

/// Book an appointment, optionally paying for it straight away
///
/// A declined payment does not undo the booking: the response is still 201
/// with `payment_status = failed` and a message for the user.
#[utoipa::path(
    post,
    path = "/api/v1/appointments",
    request_body = BookAppointmentRequest,
    responses(
        (status = 201, description = "Appointment booked", body = BookingOutcome),
        (status = 400, description = "Invalid booking", body = ErrorResponse),
        (status = 403, description = "Role cannot book", body = ErrorResponse),
        (status = 409, description = "Provider already booked at that time", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "appointments"
)]
#[instrument(skip(state, request), fields(user_id = %user.user_id))]
pub async fn book_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let outcome = state.services.booking.book_with_payment(&user, &request).await?;

    if outcome.payment_status == PaymentStatus::Failed {
        warn!("Appointment {} booked without payment", outcome.appointment.id);
    } else {
        info!("Appointment {} booked", outcome.appointment.id);
    }
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Appointments visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/appointments",
    params(AppointmentListQuery),
    responses(
        (status = 200, description = "One page of appointments", body = AppointmentPaginatedResponse),
        (status = 403, description = "Role has no appointments", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "appointments"
)]
#[instrument(skip(state))]
pub async fn list_appointments(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<PaginatedResponse<Appointment>>, ErrorResponse> {
    let filters = filter_params(&query);
    let page = state.services.appointments.list(&user, query).await?;

    Ok(Json(PaginatedResponse::new(
        page.appointments,
        page.total,
        page.limit,
        page.offset,
        APPOINTMENTS_URL,
        &filters,
    )))
}

/// Filters to carry over into pagination links
fn filter_params(query: &AppointmentListQuery) -> Vec<String> {
    let mut params = Vec::new();
    if let Some(status) = query.status {
        params.push(format!("status={}", status));
    }
    if let Some(from) = query.from {
        params.push(format!("from={}", from.to_rfc3339_opts(SecondsFormat::Secs, true)));
    }
    if let Some(to) = query.to {
        params.push(format!("to={}", to.to_rfc3339_opts(SecondsFormat::Secs, true)));
    }
    params
}

#[utoipa::path(
    get,
    path = "/api/v1/appointments/{id}",
    params(("id" = String, Path, description = "Appointment ID")),
    responses(
        (status = 200, description = "Appointment found", body = Appointment),
        (status = 403, description = "Not a participant", body = ErrorResponse),
        (status = 404, description = "Appointment not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "appointments"
)]
#[instrument(skip(state))]
pub async fn get_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, ErrorResponse> {
    Ok(Json(state.services.appointments.get(&user, &id).await?))
}

/// Confirm, cancel, complete or mark an appointment as a no-show
#[utoipa::path(
    patch,
    path = "/api/v1/appointments/{id}/status",
    params(("id" = String, Path, description = "Appointment ID")),
    request_body = UpdateAppointmentStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = Appointment),
        (status = 403, description = "Caller may not make this change", body = ErrorResponse),
        (status = 409, description = "Transition not allowed", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "appointments"
)]
#[instrument(skip(state))]
pub async fn update_appointment_status(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
    Json(request): Json<UpdateAppointmentStatusRequest>,
) -> Result<Json<Appointment>, ErrorResponse> {
    let appointment = state
        .services
        .appointments
        .update_status(&user, &id, request.status)
        .await?;
    info!("Appointment {} is now {}", appointment.id, appointment.status);
    Ok(Json(appointment))
}

/// Move an appointment to a new time
#[utoipa::path(
    post,
    path = "/api/v1/appointments/{id}/reschedule",
    params(("id" = String, Path, description = "Appointment ID")),
    request_body = RescheduleRequest,
    responses(
        (status = 200, description = "Appointment rescheduled", body = Appointment),
        (status = 400, description = "Invalid time or duration", body = ErrorResponse),
        (status = 409, description = "Appointment cannot be rescheduled", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "appointments"
)]
#[instrument(skip(state, request))]
pub async fn reschedule_appointment(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Appointment>, ErrorResponse> {
    Ok(Json(state.services.appointments.reschedule(&user, &id, request).await?))
}
