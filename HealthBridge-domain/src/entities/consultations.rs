use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct CreateConsultationRequest {
    pub appointment_id: String,

    #[validate(length(min = 1, max = 20000, message = "Notes must be between 1 and 20000 characters"))]
    pub notes: String,

    #[validate(length(max = 5000, message = "Diagnosis cannot exceed 5000 characters"))]
    pub diagnosis: Option<String>,

    #[validate(length(max = 5000, message = "Prescription cannot exceed 5000 characters"))]
    pub prescription: Option<String>,

    pub follow_up_date: Option<NaiveDate>,
}

/// Fields left out are kept
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct UpdateConsultationRequest {
    #[validate(length(min = 1, max = 20000, message = "Notes must be between 1 and 20000 characters"))]
    pub notes: Option<String>,
    #[validate(length(max = 5000, message = "Diagnosis cannot exceed 5000 characters"))]
    pub diagnosis: Option<String>,
    #[validate(length(max = 5000, message = "Prescription cannot exceed 5000 characters"))]
    pub prescription: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}

/// Decrypted consultation note
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct ConsultationView {
    pub id: String,
    pub appointment_id: String,
    pub provider_id: String,
    pub patient_id: String,
    pub notes: String,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
