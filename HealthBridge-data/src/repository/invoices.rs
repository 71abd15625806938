use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tracing::debug;

use super::errors::RepositoryError;
use super::new_id;
use crate::database::DatabasePool;
use crate::models::{Invoice, InvoiceFilter, InvoiceStatus, NewInvoice};

const INVOICE_COLUMNS: &str = "id, appointment_id, patient_id, provider_id, amount_cents, currency, \
     description, status, payment_method, payment_reference, last_payment_error, due_date, paid_at, \
     created_at, updated_at";

/// Repository trait for invoices
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Insert a `pending` invoice
    async fn create(&self, invoice: NewInvoice) -> Result<Invoice, RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Invoice>, RepositoryError>;

    /// The appointment's invoice that is not cancelled, if any
    async fn find_open_for_appointment(&self, appointment_id: &str) -> Result<Option<Invoice>, RepositoryError>;

    async fn list(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, RepositoryError>;

    /// Move a pending or failed invoice to `processing`. Only one caller can
    /// hold the claim; everyone else gets `Conflict`.
    async fn claim_for_payment(&self, id: &str) -> Result<Invoice, RepositoryError>;

    /// Settle a claimed invoice as paid
    async fn mark_paid(&self, id: &str, method: &str, reference: &str) -> Result<Invoice, RepositoryError>;

    /// Settle a claimed invoice as failed; it becomes payable again
    async fn mark_failed(&self, id: &str, method: &str, error: &str) -> Result<Invoice, RepositoryError>;

    /// Cancel a pending or failed invoice
    async fn cancel(&self, id: &str) -> Result<Invoice, RepositoryError>;
}

/// SQLite-backed invoice repository
#[derive(Debug, Clone)]
pub struct SqliteInvoiceRepository {
    pool: DatabasePool,
}

impl SqliteInvoiceRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Invoice> {
        Ok(Invoice {
            id: row.get(0)?,
            appointment_id: row.get(1)?,
            patient_id: row.get(2)?,
            provider_id: row.get(3)?,
            amount_cents: row.get(4)?,
            currency: row.get(5)?,
            description: row.get(6)?,
            status: row.get(7)?,
            payment_method: row.get(8)?,
            payment_reference: row.get(9)?,
            last_payment_error: row.get(10)?,
            due_date: row.get(11)?,
            paid_at: row.get(12)?,
            created_at: row.get(13)?,
            updated_at: row.get(14)?,
        })
    }

    fn require(&self, id: &str) -> Result<Invoice, RepositoryError> {
        let conn = self.pool.get()?;
        conn.query_row(
            &format!("SELECT {} FROM invoices WHERE id = ?1", INVOICE_COLUMNS),
            params![id],
            Self::map_row,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::not_found("invoice", id))
    }

    /// Run a status-guarded UPDATE. When no row matched, tells a missing
    /// invoice apart from one in the wrong state.
    fn guarded_update(&self, id: &str, sql: &str, values: &[&dyn ToSql]) -> Result<Invoice, RepositoryError> {
        let changed = {
            let conn = self.pool.get()?;
            conn.execute(sql, values)?
        };
        let invoice = self.require(id)?;
        if changed == 0 {
            return Err(RepositoryError::Conflict(format!("Invoice is {}", invoice.status)));
        }
        Ok(invoice)
    }
}

#[async_trait]
impl InvoiceRepository for SqliteInvoiceRepository {
    async fn create(&self, invoice: NewInvoice) -> Result<Invoice, RepositoryError> {
        if invoice.amount_cents <= 0 {
            return Err(RepositoryError::Validation("amount_cents must be positive".to_string()));
        }

        let now = Utc::now();
        let record = Invoice {
            id: new_id(),
            appointment_id: invoice.appointment_id,
            patient_id: invoice.patient_id,
            provider_id: invoice.provider_id,
            amount_cents: invoice.amount_cents,
            currency: invoice.currency,
            description: invoice.description,
            status: InvoiceStatus::Pending,
            payment_method: None,
            payment_reference: None,
            last_payment_error: None,
            due_date: invoice.due_date,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };

        debug!("Inserting invoice {} for appointment {}", record.id, record.appointment_id);
        let conn = self.pool.get()?;
        conn.execute(
            &format!(
                "INSERT INTO invoices ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                INVOICE_COLUMNS
            ),
            params![
                record.id,
                record.appointment_id,
                record.patient_id,
                record.provider_id,
                record.amount_cents,
                record.currency,
                record.description,
                record.status,
                record.payment_method,
                record.payment_reference,
                record.last_payment_error,
                record.due_date,
                record.paid_at,
                record.created_at,
                record.updated_at,
            ],
        )?;

        Ok(record)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Invoice>, RepositoryError> {
        let conn = self.pool.get()?;
        let invoice = conn
            .query_row(
                &format!("SELECT {} FROM invoices WHERE id = ?1", INVOICE_COLUMNS),
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(invoice)
    }

    async fn find_open_for_appointment(&self, appointment_id: &str) -> Result<Option<Invoice>, RepositoryError> {
        let conn = self.pool.get()?;
        let invoice = conn
            .query_row(
                &format!(
                    "SELECT {} FROM invoices
                     WHERE appointment_id = ?1 AND status != 'cancelled'
                     ORDER BY created_at DESC LIMIT 1",
                    INVOICE_COLUMNS
                ),
                params![appointment_id],
                Self::map_row,
            )
            .optional()?;
        Ok(invoice)
    }

    async fn list(&self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, RepositoryError> {
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

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM invoices {} ORDER BY created_at DESC",
            INVOICE_COLUMNS, where_clause
        ))?;
        let invoices = stmt
            .query_map(params_from_iter(values.iter()), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(invoices)
    }

    async fn claim_for_payment(&self, id: &str) -> Result<Invoice, RepositoryError> {
        self.guarded_update(
            id,
            "UPDATE invoices SET status = 'processing', updated_at = ?1
             WHERE id = ?2 AND status IN ('pending', 'failed')",
            params![Utc::now(), id],
        )
    }

    async fn mark_paid(&self, id: &str, method: &str, reference: &str) -> Result<Invoice, RepositoryError> {
        let now = Utc::now();
        self.guarded_update(
            id,
            "UPDATE invoices
             SET status = 'paid', payment_method = ?1, payment_reference = ?2,
                 last_payment_error = NULL, paid_at = ?3, updated_at = ?3
             WHERE id = ?4 AND status = 'processing'",
            params![method, reference, now, id],
        )
    }

    async fn mark_failed(&self, id: &str, method: &str, error: &str) -> Result<Invoice, RepositoryError> {
        self.guarded_update(
            id,
            "UPDATE invoices
             SET status = 'failed', payment_method = ?1, last_payment_error = ?2, updated_at = ?3
             WHERE id = ?4 AND status = 'processing'",
            params![method, error, Utc::now(), id],
        )
    }

    async fn cancel(&self, id: &str) -> Result<Invoice, RepositoryError> {
        self.guarded_update(
            id,
            "UPDATE invoices SET status = 'cancelled', updated_at = ?1
             WHERE id = ?2 AND status IN ('pending', 'failed')",
            params![Utc::now(), id],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AppointmentMode, NewAppointment, Role};
    use crate::repository::{test_support, AppointmentRepository, SqliteAppointmentRepository};
    use chrono::Duration;

    async fn setup() -> (SqliteInvoiceRepository, NewInvoice) {
        let pool = test_support::pool();
        let patient = test_support::user(&pool, "patient@example.com", Role::Patient).await;
        let provider = test_support::user(&pool, "doc@example.com", Role::Provider).await;
        let appointment = SqliteAppointmentRepository::new(pool.clone())
            .create(NewAppointment {
                patient_id: patient.id.clone(),
                provider_id: provider.id.clone(),
                scheduled_at: Utc::now() + Duration::days(1),
                duration_minutes: 30,
                mode: AppointmentMode::InPerson,
                reason: None,
            })
            .await
            .unwrap();

        let new_invoice = NewInvoice {
            appointment_id: appointment.id,
            patient_id: patient.id,
            provider_id: provider.id,
            amount_cents: 35000,
            currency: "NAD".to_string(),
            description: Some("Consultation".to_string()),
            due_date: None,
        };
        (SqliteInvoiceRepository::new(pool), new_invoice)
    }

    #[tokio::test]
    async fn test_payment_state_transitions() {
        let (repo, new_invoice) = setup().await;
        let invoice = repo.create(new_invoice).await.unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Pending);

        // settling needs a claim first
        assert!(matches!(
            repo.mark_paid(&invoice.id, "card", "SIM-0").await,
            Err(RepositoryError::Conflict(_))
        ));

        let claimed = repo.claim_for_payment(&invoice.id).await.unwrap();
        assert_eq!(claimed.status, InvoiceStatus::Processing);
        assert!(matches!(repo.claim_for_payment(&invoice.id).await, Err(RepositoryError::Conflict(_))));
        assert!(matches!(repo.cancel(&invoice.id).await, Err(RepositoryError::Conflict(_))));

        let failed = repo.mark_failed(&invoice.id, "card", "card declined").await.unwrap();
        assert_eq!(failed.status, InvoiceStatus::Failed);
        assert_eq!(failed.last_payment_error.as_deref(), Some("card declined"));

        repo.claim_for_payment(&invoice.id).await.unwrap();
        let paid = repo.mark_paid(&invoice.id, "mobile_money", "SIM-123").await.unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert!(paid.paid_at.is_some());
        assert!(paid.last_payment_error.is_none());

        let stored = repo.find_by_id(&invoice.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_reference.as_deref(), Some("SIM-123"));
        assert_eq!(stored.payment_method.as_deref(), Some("mobile_money"));

        assert!(matches!(repo.claim_for_payment(&invoice.id).await, Err(RepositoryError::Conflict(_))));
        assert!(matches!(repo.cancel(&invoice.id).await, Err(RepositoryError::Conflict(_))));
        assert!(matches!(repo.claim_for_payment("missing").await, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_open_invoice_lookup_skips_cancelled() {
        let (repo, new_invoice) = setup().await;
        let appointment_id = new_invoice.appointment_id.clone();
        let invoice = repo.create(new_invoice).await.unwrap();

        assert!(repo.find_open_for_appointment(&appointment_id).await.unwrap().is_some());

        repo.cancel(&invoice.id).await.unwrap();
        assert!(repo.find_open_for_appointment(&appointment_id).await.unwrap().is_none());

        let cancelled = repo
            .list(&InvoiceFilter {
                status: Some(InvoiceStatus::Cancelled),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(cancelled.len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let (repo, mut new_invoice) = setup().await;
        new_invoice.amount_cents = 0;
        assert!(matches!(repo.create(new_invoice).await, Err(RepositoryError::Validation(_))));
    }
}
