use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::errors::RepositoryError;
use super::new_id;
use crate::database::DatabasePool;
use crate::models::{ConsultationNote, NewConsultationNote};

const NOTE_COLUMNS: &str = "id, appointment_id, provider_id, patient_id, notes_encrypted, \
     diagnosis_encrypted, prescription_encrypted, follow_up_date, created_at, updated_at";

/// Repository trait for consultation notes. Stores ciphertext only.
#[async_trait]
pub trait ConsultationRepository: Send + Sync {
    async fn create(&self, note: NewConsultationNote) -> Result<ConsultationNote, RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<ConsultationNote>, RepositoryError>;

    /// Notes for a patient, newest first
    async fn list_by_patient(&self, patient_id: &str) -> Result<Vec<ConsultationNote>, RepositoryError>;

    /// Persist the clinical fields and follow-up date of an existing note
    async fn update(&self, note: &ConsultationNote) -> Result<ConsultationNote, RepositoryError>;
}

#[derive(Debug, Clone)]
pub struct SqliteConsultationRepository {
    pool: DatabasePool,
}

impl SqliteConsultationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<ConsultationNote> {
        Ok(ConsultationNote {
            id: row.get(0)?,
            appointment_id: row.get(1)?,
            provider_id: row.get(2)?,
            patient_id: row.get(3)?,
            notes_encrypted: row.get(4)?,
            diagnosis_encrypted: row.get(5)?,
            prescription_encrypted: row.get(6)?,
            follow_up_date: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

#[async_trait]
impl ConsultationRepository for SqliteConsultationRepository {
    async fn create(&self, note: NewConsultationNote) -> Result<ConsultationNote, RepositoryError> {
        let now = Utc::now();
        let record = ConsultationNote {
            id: new_id(),
            appointment_id: note.appointment_id,
            provider_id: note.provider_id,
            patient_id: note.patient_id,
            notes_encrypted: note.notes_encrypted,
            diagnosis_encrypted: note.diagnosis_encrypted,
            prescription_encrypted: note.prescription_encrypted,
            follow_up_date: note.follow_up_date,
            created_at: now,
            updated_at: now,
        };

        debug!("Inserting consultation note {}", record.id);
        let conn = self.pool.get()?;
        conn.execute(
            &format!(
                "INSERT INTO consultation_notes ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                NOTE_COLUMNS
            ),
            params![
                record.id,
                record.appointment_id,
                record.provider_id,
                record.patient_id,
                record.notes_encrypted,
                record.diagnosis_encrypted,
                record.prescription_encrypted,
                record.follow_up_date,
                record.created_at,
                record.updated_at,
            ],
        )?;

        Ok(record)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<ConsultationNote>, RepositoryError> {
        let conn = self.pool.get()?;
        let note = conn
            .query_row(
                &format!("SELECT {} FROM consultation_notes WHERE id = ?1", NOTE_COLUMNS),
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(note)
    }

    async fn list_by_patient(&self, patient_id: &str) -> Result<Vec<ConsultationNote>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM consultation_notes WHERE patient_id = ?1 ORDER BY created_at DESC",
            NOTE_COLUMNS
        ))?;
        let notes = stmt
            .query_map(params![patient_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(notes)
    }

    async fn update(&self, note: &ConsultationNote) -> Result<ConsultationNote, RepositoryError> {
        let mut record = note.clone();
        record.updated_at = Utc::now();

        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE consultation_notes
             SET notes_encrypted = ?1, diagnosis_encrypted = ?2, prescription_encrypted = ?3,
                 follow_up_date = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                record.notes_encrypted,
                record.diagnosis_encrypted,
                record.prescription_encrypted,
                record.follow_up_date,
                record.updated_at,
                record.id,
            ],
        )?;

        if changed == 0 {
            return Err(RepositoryError::not_found("consultation note", &record.id));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentMode, NewAppointment, Role};
    use crate::repository::{test_support, AppointmentRepository, SqliteAppointmentRepository};
    use chrono::{Duration, NaiveDate};

    #[tokio::test]
    async fn test_create_list_update_note() {
        let pool = test_support::pool();
        let patient = test_support::user(&pool, "patient@example.com", Role::Patient).await;
        let provider = test_support::user(&pool, "doc@example.com", Role::Provider).await;
        let appointment = SqliteAppointmentRepository::new(pool.clone())
            .create(NewAppointment {
                patient_id: patient.id.clone(),
                provider_id: provider.id.clone(),
                scheduled_at: Utc::now() + Duration::hours(2),
                duration_minutes: 30,
                mode: AppointmentMode::Phone,
                reason: None,
            })
            .await
            .unwrap();

        let repo = SqliteConsultationRepository::new(pool);
        let note = repo
            .create(NewConsultationNote {
                appointment_id: appointment.id,
                provider_id: provider.id,
                patient_id: patient.id.clone(),
                notes_encrypted: "cipher-notes".to_string(),
                diagnosis_encrypted: None,
                prescription_encrypted: Some("cipher-rx".to_string()),
                follow_up_date: NaiveDate::from_ymd_opt(2030, 1, 15),
            })
            .await
            .unwrap();

        let listed = repo.list_by_patient(&patient.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].follow_up_date, NaiveDate::from_ymd_opt(2030, 1, 15));

        let mut changed = note.clone();
        changed.diagnosis_encrypted = Some("cipher-dx".to_string());
        repo.update(&changed).await.unwrap();

        let stored = repo.find_by_id(&note.id).await.unwrap().unwrap();
        assert_eq!(stored.diagnosis_encrypted.as_deref(), Some("cipher-dx"));
        assert_eq!(stored.prescription_encrypted.as_deref(), Some("cipher-rx"));

        changed.id = "missing".to_string();
        assert!(matches!(repo.update(&changed).await, Err(RepositoryError::NotFound(_))));
    }
}
