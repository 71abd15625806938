use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::debug;

use super::errors::RepositoryError;
use super::new_id;
use crate::database::DatabasePool;
use crate::models::{Appointment, AppointmentFilter, AppointmentStatus, NewAppointment};

const APPOINTMENT_COLUMNS: &str = "id, patient_id, provider_id, scheduled_at, duration_minutes, \
     mode, reason, status, created_at, updated_at";

/// Longest bookable slot, used to bound the overlap query
const MAX_DURATION_MINUTES: i64 = 240;

const SLOT_TAKEN: &str = "The provider already has an appointment at this time";

/// Repository trait for appointments
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    /// Insert without looking at the provider's other appointments
    async fn create(&self, appointment: NewAppointment) -> Result<Appointment, RepositoryError>;

    /// Insert unless the provider already has an overlapping appointment
    /// (`Conflict`). The check and the insert share one write transaction.
    async fn create_if_free(&self, appointment: NewAppointment) -> Result<Appointment, RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Appointment>, RepositoryError>;

    /// Filtered page of appointments, newest first, with the total match count
    async fn list(&self, filter: &AppointmentFilter) -> Result<(Vec<Appointment>, usize), RepositoryError>;

    async fn update_status(&self, id: &str, status: AppointmentStatus) -> Result<Appointment, RepositoryError>;

    /// Move an appointment to a new slot if the provider is free then
    /// (`Conflict` otherwise). The status returns to `scheduled`.
    async fn reschedule(
        &self,
        id: &str,
        scheduled_at: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<Appointment, RepositoryError>;

    /// Non-cancelled appointments of a provider overlapping `[start, end)`
    async fn find_overlapping(
        &self,
        provider_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<&str>,
    ) -> Result<Vec<Appointment>, RepositoryError>;

    /// Whether the provider has ever had an appointment with the patient
    async fn exists_between(&self, provider_id: &str, patient_id: &str) -> Result<bool, RepositoryError>;
}

/// SQLite-backed appointment repository
#[derive(Debug, Clone)]
pub struct SqliteAppointmentRepository {
    pool: DatabasePool,
}

impl SqliteAppointmentRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Appointment> {
        Ok(Appointment {
            id: row.get(0)?,
            patient_id: row.get(1)?,
            provider_id: row.get(2)?,
            scheduled_at: row.get(3)?,
            duration_minutes: row.get(4)?,
            mode: row.get(5)?,
            reason: row.get(6)?,
            status: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn require(&self, id: &str) -> Result<Appointment, RepositoryError> {
        let conn = self.pool.get()?;
        conn.query_row(
            &format!("SELECT {} FROM appointments WHERE id = ?1", APPOINTMENT_COLUMNS),
            params![id],
            Self::map_row,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::not_found("appointment", id))
    }

    fn overlapping(
        conn: &Connection,
        provider_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<&str>,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        // Narrow in SQL to slots that start before `end` and no earlier than the
        // longest possible slot before `start`, then check exact end times here.
        let earliest = start - Duration::minutes(MAX_DURATION_MINUTES);

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM appointments
             WHERE provider_id = ?1
               AND status NOT IN ('cancelled', 'no_show')
               AND scheduled_at < ?2
               AND scheduled_at >= ?3
               AND (?4 IS NULL OR id != ?4)",
            APPOINTMENT_COLUMNS
        ))?;

        let candidates = stmt
            .query_map(params![provider_id, end, earliest, exclude_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(candidates
            .into_iter()
            .filter(|a| a.scheduled_at < end && a.ends_at() > start)
            .collect())
    }

    fn insert(conn: &Connection, record: &Appointment) -> Result<(), RepositoryError> {
        debug!("Inserting appointment {}", record.id);
        conn.execute(
            &format!(
                "INSERT INTO appointments ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                APPOINTMENT_COLUMNS
            ),
            params![
                record.id,
                record.patient_id,
                record.provider_id,
                record.scheduled_at,
                record.duration_minutes,
                record.mode,
                record.reason,
                record.status,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }
}

fn new_record(appointment: NewAppointment) -> Appointment {
    let now = Utc::now();
    Appointment {
        id: new_id(),
        patient_id: appointment.patient_id,
        provider_id: appointment.provider_id,
        scheduled_at: appointment.scheduled_at,
        duration_minutes: appointment.duration_minutes,
        mode: appointment.mode,
        reason: appointment.reason,
        status: AppointmentStatus::Scheduled,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl AppointmentRepository for SqliteAppointmentRepository {
    async fn create(&self, appointment: NewAppointment) -> Result<Appointment, RepositoryError> {
        let record = new_record(appointment);
        let conn = self.pool.get()?;
        Self::insert(&conn, &record)?;
        Ok(record)
    }

    async fn create_if_free(&self, appointment: NewAppointment) -> Result<Appointment, RepositoryError> {
        let record = new_record(appointment);
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !Self::overlapping(&tx, &record.provider_id, record.scheduled_at, record.ends_at(), None)?.is_empty() {
            return Err(RepositoryError::Conflict(SLOT_TAKEN.to_string()));
        }
        Self::insert(&tx, &record)?;
        tx.commit()?;

        Ok(record)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Appointment>, RepositoryError> {
        let conn = self.pool.get()?;
        let appointment = conn
            .query_row(
                &format!("SELECT {} FROM appointments WHERE id = ?1", APPOINTMENT_COLUMNS),
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(appointment)
    }

    async fn list(&self, filter: &AppointmentFilter) -> Result<(Vec<Appointment>, usize), RepositoryError> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(patient_id) = &filter.patient_id {
            conditions.push("patient_id = ?");
            values.push(Box::new(patient_id.clone()));
        }
        if let Some(provider_id) = &filter.provider_id {
            conditions.push("provider_id = ?");
            values.push(Box::new(provider_id.clone()));
        }
        if let Some(status) = filter.status {
            conditions.push("status = ?");
            values.push(Box::new(status));
        }
        if let Some(from) = filter.from {
            conditions.push("scheduled_at >= ?");
            values.push(Box::new(from));
        }
        if let Some(to) = filter.to {
            conditions.push("scheduled_at <= ?");
            values.push(Box::new(to));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let conn = self.pool.get()?;

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM appointments {}", where_clause),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        values.push(Box::new(filter.limit as i64));
        values.push(Box::new(filter.offset as i64));

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM appointments {} ORDER BY scheduled_at DESC LIMIT ? OFFSET ?",
            APPOINTMENT_COLUMNS, where_clause
        ))?;
        let appointments = stmt
            .query_map(params_from_iter(values.iter()), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((appointments, total as usize))
    }

    async fn update_status(&self, id: &str, status: AppointmentStatus) -> Result<Appointment, RepositoryError> {
        let mut appointment = self.require(id)?;
        appointment.status = status;
        appointment.updated_at = Utc::now();

        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE appointments SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![appointment.status, appointment.updated_at, appointment.id],
        )?;

        Ok(appointment)
    }

    async fn reschedule(
        &self,
        id: &str,
        scheduled_at: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Result<Appointment, RepositoryError> {
        let mut appointment = self.require(id)?;
        appointment.scheduled_at = scheduled_at;
        appointment.duration_minutes = duration_minutes;
        appointment.status = AppointmentStatus::Scheduled;
        appointment.updated_at = Utc::now();

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let clashes = Self::overlapping(
            &tx,
            &appointment.provider_id,
            appointment.scheduled_at,
            appointment.ends_at(),
            Some(id),
        )?;
        if !clashes.is_empty() {
            return Err(RepositoryError::Conflict(SLOT_TAKEN.to_string()));
        }
        tx.execute(
            "UPDATE appointments
             SET scheduled_at = ?1, duration_minutes = ?2, status = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                appointment.scheduled_at,
                appointment.duration_minutes,
                appointment.status,
                appointment.updated_at,
                appointment.id,
            ],
        )?;
        tx.commit()?;

        Ok(appointment)
    }

    async fn find_overlapping(
        &self,
        provider_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<&str>,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        let conn = self.pool.get()?;
        Self::overlapping(&conn, provider_id, start, end, exclude_id)
    }

    async fn exists_between(&self, provider_id: &str, patient_id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM appointments WHERE provider_id = ?1 AND patient_id = ?2)",
            params![provider_id, patient_id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentMode, Role};
    use crate::repository::test_support;

    fn new_appointment(patient: &str, provider: &str, at: DateTime<Utc>, minutes: i64) -> NewAppointment {
        NewAppointment {
            patient_id: patient.to_string(),
            provider_id: provider.to_string(),
            scheduled_at: at,
            duration_minutes: minutes,
            mode: AppointmentMode::Video,
            reason: Some("Follow-up".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_list_and_paginate() {
        let pool = test_support::pool();
        let patient = test_support::user(&pool, "patient@example.com", Role::Patient).await;
        let provider = test_support::user(&pool, "doc@example.com", Role::Provider).await;
        let repo = SqliteAppointmentRepository::new(pool);

        let base = Utc::now() + Duration::days(1);
        for i in 0..3 {
            repo.create(new_appointment(&patient.id, &provider.id, base + Duration::hours(i), 30))
                .await
                .unwrap();
        }

        let (page, total) = repo
            .list(&AppointmentFilter {
                patient_id: Some(patient.id.clone()),
                limit: 2,
                offset: 0,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        assert!(page[0].scheduled_at > page[1].scheduled_at);

        let (rest, _) = repo
            .list(&AppointmentFilter {
                provider_id: Some(provider.id.clone()),
                limit: 2,
                offset: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(rest.len(), 1);

        let (none, total) = repo
            .list(&AppointmentFilter {
                status: Some(AppointmentStatus::Completed),
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(none.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_overlap_detection_ignores_cancelled() {
        let pool = test_support::pool();
        let patient = test_support::user(&pool, "patient@example.com", Role::Patient).await;
        let provider = test_support::user(&pool, "doc@example.com", Role::Provider).await;
        let repo = SqliteAppointmentRepository::new(pool);

        let start = Utc::now() + Duration::days(2);
        let existing = repo
            .create(new_appointment(&patient.id, &provider.id, start, 60))
            .await
            .unwrap();

        let overlapping = repo
            .find_overlapping(&provider.id, start + Duration::minutes(30), start + Duration::minutes(60), None)
            .await
            .unwrap();
        assert_eq!(overlapping.len(), 1);

        let adjacent = repo
            .find_overlapping(&provider.id, start + Duration::minutes(60), start + Duration::minutes(90), None)
            .await
            .unwrap();
        assert!(adjacent.is_empty());

        let excluded = repo
            .find_overlapping(&provider.id, start, start + Duration::minutes(30), Some(&existing.id))
            .await
            .unwrap();
        assert!(excluded.is_empty());

        repo.update_status(&existing.id, AppointmentStatus::Cancelled).await.unwrap();
        let after_cancel = repo
            .find_overlapping(&provider.id, start, start + Duration::minutes(30), None)
            .await
            .unwrap();
        assert!(after_cancel.is_empty());
    }

    #[tokio::test]
    async fn test_reschedule_resets_status_and_relationship_check() {
        let pool = test_support::pool();
        let patient = test_support::user(&pool, "patient@example.com", Role::Patient).await;
        let provider = test_support::user(&pool, "doc@example.com", Role::Provider).await;
        let other = test_support::user(&pool, "other@example.com", Role::Provider).await;
        let repo = SqliteAppointmentRepository::new(pool);

        let created = repo
            .create(new_appointment(&patient.id, &provider.id, Utc::now() + Duration::days(1), 30))
            .await
            .unwrap();
        repo.update_status(&created.id, AppointmentStatus::Confirmed).await.unwrap();

        let moved_to = Utc::now() + Duration::days(3);
        let moved = repo.reschedule(&created.id, moved_to, 45).await.unwrap();
        assert_eq!(moved.status, AppointmentStatus::Scheduled);
        assert_eq!(moved.duration_minutes, 45);

        let stored = repo.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.scheduled_at, moved_to);

        assert!(repo.exists_between(&provider.id, &patient.id).await.unwrap());
        assert!(!repo.exists_between(&other.id, &patient.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_guarded_insert_and_reschedule_refuse_taken_slots() {
        let pool = test_support::pool();
        let patient = test_support::user(&pool, "patient@example.com", Role::Patient).await;
        let provider = test_support::user(&pool, "doc@example.com", Role::Provider).await;
        let repo = SqliteAppointmentRepository::new(pool);

        let start = Utc::now() + Duration::days(1);
        let first = repo
            .create_if_free(new_appointment(&patient.id, &provider.id, start, 60))
            .await
            .unwrap();
        let clash = repo
            .create_if_free(new_appointment(&patient.id, &provider.id, start + Duration::minutes(30), 30))
            .await;
        assert!(matches!(clash, Err(RepositoryError::Conflict(_))));

        let later = repo
            .create_if_free(new_appointment(&patient.id, &provider.id, start + Duration::hours(2), 30))
            .await
            .unwrap();
        let moved = repo.reschedule(&later.id, start + Duration::minutes(15), 30).await;
        assert!(matches!(moved, Err(RepositoryError::Conflict(_))));
        let stored = repo.find_by_id(&later.id).await.unwrap().unwrap();
        assert_eq!(stored.scheduled_at, later.scheduled_at);

        // shifting within its own slot
        repo.reschedule(&first.id, start + Duration::minutes(10), 60).await.unwrap();

        let (all, total) = repo
            .list(&AppointmentFilter {
                provider_id: Some(provider.id.clone()),
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(all.len(), 2);
    }
}
