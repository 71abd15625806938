use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[cfg(feature = "with-api")]
use utoipa::{IntoParams, ToSchema};

use health_bridge_data::models::{Appointment, AppointmentMode, AppointmentStatus, Invoice};

pub const DEFAULT_DURATION_MINUTES: i64 = 30;

/// Payment to attempt right after booking
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct PaymentDetails {
    /// card, mobile_money or eft
    #[validate(length(min = 1, message = "Payment method is required"))]
    pub method: String,
    /// Card token, wallet number or bank reference
    pub account_reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct BookAppointmentRequest {
    pub provider_id: String,

    /// Required when a provider or admin books on a patient's behalf
    pub patient_id: Option<String>,

    pub scheduled_at: DateTime<Utc>,

    #[validate(range(min = 15, max = 240, message = "Duration must be between 15 and 240 minutes"))]
    pub duration_minutes: Option<i64>,

    pub mode: Option<AppointmentMode>,

    #[validate(length(max = 1000, message = "Reason cannot exceed 1000 characters"))]
    pub reason: Option<String>,

    #[validate]
    pub payment: Option<PaymentDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct UpdateAppointmentStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct RescheduleRequest {
    pub scheduled_at: DateTime<Utc>,
    /// Keeps the current duration when omitted
    #[validate(range(min = 15, max = 240, message = "Duration must be between 15 and 240 minutes"))]
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema, IntoParams))]
#[cfg_attr(feature = "with-api", into_params(parameter_in = Query))]
pub struct AppointmentListQuery {
    pub status: Option<AppointmentStatus>,
    /// Only appointments starting at or after this time
    pub from: Option<DateTime<Utc>>,
    /// Only appointments starting before this time
    pub to: Option<DateTime<Utc>>,
    /// Page size (default 20, max 100)
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Outcome of the payment leg of a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// No payment details were supplied
    NotRequested,
    Paid,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct BookingOutcome {
    pub appointment: Appointment,
    pub invoice: Option<Invoice>,
    pub payment_status: PaymentStatus,
    /// User-facing note, set when the payment could not be processed
    pub message: Option<String>,
}

/// One page of appointments
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct AppointmentPage {
    pub appointments: Vec<Appointment>,
    /// Matching appointments across all pages
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}
