// Repository module structure
pub mod errors;
mod appointments;
mod audit;
mod invoices;
mod consultations;
mod learning;
mod policies;
mod stats;
mod surveys;
mod sync_queue;
mod users;
mod wellness;

use rusqlite::types::Type;
use rusqlite::Row;
use serde::de::DeserializeOwned;
use uuid::Uuid;

// Re-export commonly used types
pub use errors::RepositoryError;
pub use appointments::{AppointmentRepository, SqliteAppointmentRepository};
pub use audit::{AuditRepository, SqliteAuditRepository};
pub use consultations::{ConsultationRepository, SqliteConsultationRepository};
pub use invoices::{InvoiceRepository, SqliteInvoiceRepository};
pub use learning::{LearningRepository, SqliteLearningRepository};
pub use policies::{PolicyRepository, SqlitePolicyRepository};
pub use stats::{SqliteStatsRepository, StatsRepository};
pub use surveys::{SqliteSurveyRepository, SurveyRepository};
pub use sync_queue::{SqliteSyncRepository, SyncRepository};
pub use users::{SqliteUserRepository, UserRepository};
pub use wellness::{SqliteWellnessRepository, WellnessRepository};

/// Fresh primary key
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Read a TEXT column holding JSON
pub(crate) fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
