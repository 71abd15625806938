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
use health_bridge_domain::entities::{CreateInvoiceRequest, InvoiceQuery, PayInvoiceRequest};
use health_bridge_domain::models::Invoice;

/// Issue an invoice for an appointment
#[utoipa::path(
    post,
    path = "/api/v1/invoices",
    request_body = CreateInvoiceRequest,
    responses(
        (status = 201, description = "Invoice created", body = Invoice),
        (status = 403, description = "Only the provider or an admin may invoice", body = ErrorResponse),
        (status = 409, description = "Appointment already has an open invoice", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "billing"
)]
#[instrument(skip(state, request))]
pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Json(request): Json<CreateInvoiceRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let invoice = state.services.billing.create_invoice(&user, request).await?;
    info!("Invoice {} created for appointment {}", invoice.id, invoice.appointment_id);
    Ok((StatusCode::CREATED, Json(invoice)))
}

#[utoipa::path(
    get,
    path = "/api/v1/invoices",
    params(InvoiceQuery),
    responses(
        (status = 200, description = "Invoices visible to the caller", body = [Invoice]),
        (status = 403, description = "Role has no invoices", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "billing"
)]
#[instrument(skip(state))]
pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Query(query): Query<InvoiceQuery>,
) -> Result<Json<Vec<Invoice>>, ErrorResponse> {
    Ok(Json(state.services.billing.list(&user, query).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/invoices/{id}",
    params(("id" = String, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice found", body = Invoice),
        (status = 403, description = "Not the invoice's patient or provider", body = ErrorResponse),
        (status = 404, description = "Invoice not found", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "billing"
)]
#[instrument(skip(state))]
pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
) -> Result<Json<Invoice>, ErrorResponse> {
    Ok(Json(state.services.billing.get(&user, &id).await?))
}

/// Pay a pending or failed invoice
#[utoipa::path(
    post,
    path = "/api/v1/invoices/{id}/pay",
    params(("id" = String, Path, description = "Invoice ID")),
    request_body = PayInvoiceRequest,
    responses(
        (status = 200, description = "Invoice paid", body = Invoice),
        (status = 402, description = "Payment declined; invoice marked failed", body = ErrorResponse),
        (status = 409, description = "Invoice is not payable", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "billing"
)]
#[instrument(skip(state, request))]
pub async fn pay_invoice(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
    Json(request): Json<PayInvoiceRequest>,
) -> Result<Json<Invoice>, ErrorResponse> {
    let invoice = state.services.billing.pay(&user, &id, request).await?;
    info!("Invoice {} paid", invoice.id);
    Ok(Json(invoice))
}

#[utoipa::path(
    post,
    path = "/api/v1/invoices/{id}/cancel",
    params(("id" = String, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice cancelled", body = Invoice),
        (status = 403, description = "Only the provider or an admin may cancel", body = ErrorResponse),
        (status = 409, description = "Invoice can no longer be cancelled", body = ErrorResponse),
    ),
    security(("bearer" = [])),
    tag = "billing"
)]
#[instrument(skip(state))]
pub async fn cancel_invoice(
    State(state): State<AppState>,
    Extension(user): Extension<UserInfo>,
    Path(id): Path<String>,
) -> Result<Json<Invoice>, ErrorResponse> {
    Ok(Json(state.services.billing.cancel(&user, &id).await?))
}
