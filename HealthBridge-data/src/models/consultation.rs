use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Consultation note as stored. The clinical fields hold ciphertext
/// produced by the field encryptor and are never returned to clients as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationNote {
    pub id: String,
    pub appointment_id: String,
    pub provider_id: String,
    pub patient_id: String,
    pub notes_encrypted: String,
    pub diagnosis_encrypted: Option<String>,
    pub prescription_encrypted: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for inserting a consultation note
#[derive(Debug, Clone)]
pub struct NewConsultationNote {
    pub appointment_id: String,
    pub provider_id: String,
    pub patient_id: String,
    pub notes_encrypted: String,
    pub diagnosis_encrypted: Option<String>,
    pub prescription_encrypted: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}
