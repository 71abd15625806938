use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use utoipa::ToSchema;

use health_bridge_domain::models::Appointment;
use health_bridge_domain::ServiceError;

/// Error response format for API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error type/code - machine-readable identifier
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    pub fn validation_error(message: impl Into<String>, details: Option<serde_json::Value>) -> Self {
        Self {
            details,
            ..Self::new("validation_error", message)
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("bad_request", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("unauthorized", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("forbidden", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("conflict", message)
    }

    pub fn payment_failed(message: impl Into<String>) -> Self {
        Self::new("payment_failed", message)
    }

    /// Internal details are logged, never returned
    pub fn internal_error() -> Self {
        Self::new("internal_error", "An unexpected error occurred")
    }

    pub fn status_code(&self) -> StatusCode {
        match self.error.as_str() {
            "validation_error" | "bad_request" => StatusCode::BAD_REQUEST,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "payment_failed" => StatusCode::PAYMENT_REQUIRED,
            "forbidden" => StatusCode::FORBIDDEN,
            "not_found" => StatusCode::NOT_FOUND,
            "conflict" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for ErrorResponse {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Validation(message) => {
                warn!("Validation failed: {}", message);
                Self::validation_error(message, None)
            }
            ServiceError::Unauthorized(message) => Self::unauthorized(message),
            ServiceError::Forbidden(message) => {
                warn!("Forbidden: {}", message);
                Self::forbidden(message)
            }
            ServiceError::NotFound(message) => Self::not_found(message),
            ServiceError::Conflict(message) => Self::conflict(message),
            ServiceError::PaymentFailed(message) => Self::payment_failed(message),
            other @ (ServiceError::Repository(_) | ServiceError::Encryption(_) | ServiceError::Internal(_)) => {
                error!("Request failed: {}", other);
                Self::internal_error()
            }
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

/// Paginated response format
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[aliases(AppointmentPaginatedResponse = PaginatedResponse<Appointment>)]
pub struct PaginatedResponse<T> {
    /// Total count of items available
    pub total_count: usize,

    /// Current offset
    pub offset: usize,

    /// Current limit
    pub limit: usize,

    /// URL for the next page (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    /// URL for the previous page (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,

    /// Actual data items
    pub data: Vec<T>,
}

impl<T> PaginatedResponse<T> {
    /// Build a page, with links that carry `filters` (already encoded
    /// `key=value` pairs) alongside limit and offset
    pub fn new(data: Vec<T>, total_count: usize, limit: usize, offset: usize, base_url: &str, filters: &[String]) -> Self {
        let (next, previous) = pagination_links(total_count, limit, offset, base_url, filters);
        Self {
            total_count,
            offset,
            limit,
            next,
            previous,
            data,
        }
    }
}

/// Next and previous page URLs
fn pagination_links(
    total_count: usize,
    limit: usize,
    offset: usize,
    base_url: &str,
    filters: &[String],
) -> (Option<String>, Option<String>) {
    let link = |page_offset: usize| {
        let mut params = filters.to_vec();
        params.push(format!("limit={}", limit));
        params.push(format!("offset={}", page_offset));
        format!("{}?{}", base_url, params.join("&"))
    };

    let next = (limit > 0 && offset + limit < total_count).then(|| link(offset + limit));
    let previous = (offset > 0).then(|| link(offset.saturating_sub(limit)));
    (next, previous)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_errors_map_to_status_codes() {
        let cases = [
            (ServiceError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ServiceError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (ServiceError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ServiceError::Conflict("x".into()), StatusCode::CONFLICT),
            (ServiceError::PaymentFailed("x".into()), StatusCode::PAYMENT_REQUIRED),
            (ServiceError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(ErrorResponse::from(error).status_code(), status);
        }
    }

    #[test]
    fn test_internal_errors_are_redacted() {
        let response = ErrorResponse::from(ServiceError::Internal("disk I/O error at /var/db".into()));
        assert_eq!(response.error, "internal_error");
        assert_eq!(response.message, "An unexpected error occurred");
    }

    #[test]
    fn test_pagination_links() {
        let filters = vec!["status=scheduled".to_string()];
        let page: PaginatedResponse<u8> = PaginatedResponse::new(vec![], 45, 20, 20, "/api/v1/appointments", &filters);

        assert_eq!(
            page.next.as_deref(),
            Some("/api/v1/appointments?status=scheduled&limit=20&offset=40")
        );
        assert_eq!(
            page.previous.as_deref(),
            Some("/api/v1/appointments?status=scheduled&limit=20&offset=0")
        );

        let last: PaginatedResponse<u8> = PaginatedResponse::new(vec![], 45, 20, 40, "/api/v1/appointments", &[]);
        assert!(last.next.is_none());
        assert_eq!(last.previous.as_deref(), Some("/api/v1/appointments?limit=20&offset=20"));

        let first: PaginatedResponse<u8> = PaginatedResponse::new(vec![], 5, 20, 0, "/api/v1/appointments", &[]);
        assert!(first.next.is_none());
        assert!(first.previous.is_none());
    }
}
