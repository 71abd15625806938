use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

/// Appointment lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

text_enum!(AppointmentStatus {
    Scheduled => "scheduled",
    Confirmed => "confirmed",
    Completed => "completed",
    Cancelled => "cancelled",
    NoShow => "no_show",
});

impl AppointmentStatus {
    /// Scheduled or confirmed appointments can still change
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Scheduled | Self::Confirmed)
    }
}

/// How the consultation takes place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AppointmentMode {
    #[default]
    InPerson,
    Video,
    Phone,
}

text_enum!(AppointmentMode {
    InPerson => "in_person",
    Video => "video",
    Phone => "phone",
});

/// Storage model for an appointment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub provider_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub mode: AppointmentMode,
    pub reason: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// When the appointment slot ends
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(self.duration_minutes)
    }

    /// Whether the user is the patient or the provider on this appointment
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.patient_id == user_id || self.provider_id == user_id
    }
}

/// Input for inserting an appointment
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: String,
    pub provider_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub mode: AppointmentMode,
    pub reason: Option<String>,
}

/// Query filter for listing appointments
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub patient_id: Option<String>,
    pub provider_id: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: usize,
    pub offset: usize,
}
