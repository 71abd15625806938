use async_trait::async_trait;
use rusqlite::params;

use super::errors::RepositoryError;
use super::new_id;
use crate::database::DatabasePool;
use crate::models::{AuditLog, NewAuditLog};

/// Repository trait for persisted security events
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn insert(&self, log: NewAuditLog) -> Result<AuditLog, RepositoryError>;

    /// Most recent events first
    async fn recent(&self, limit: usize) -> Result<Vec<AuditLog>, RepositoryError>;
}

#[derive(Debug, Clone)]
pub struct SqliteAuditRepository {
    pool: DatabasePool,
}

impl SqliteAuditRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Blocking insert, for callers outside an async context
    pub fn insert_blocking(&self, log: NewAuditLog) -> Result<AuditLog, RepositoryError> {
        let record = AuditLog {
            id: new_id(),
            event_type: log.event_type,
            user_id: log.user_id,
            success: log.success,
            resource: log.resource,
            details: log.details,
            auth_method: log.auth_method,
            created_at: log.created_at,
        };

        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO audit_logs (id, event_type, user_id, success, resource, details, auth_method, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id,
                record.event_type,
                record.user_id,
                record.success,
                record.resource,
                record.details,
                record.auth_method,
                record.created_at,
            ],
        )?;

        Ok(record)
    }
}

#[async_trait]
impl AuditRepository for SqliteAuditRepository {
    async fn insert(&self, log: NewAuditLog) -> Result<AuditLog, RepositoryError> {
        self.insert_blocking(log)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<AuditLog>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, event_type, user_id, success, resource, details, auth_method, created_at
             FROM audit_logs ORDER BY created_at DESC LIMIT ?1",
        )?;
        let logs = stmt
            .query_map(params![limit as i64], |row| {
                Ok(AuditLog {
                    id: row.get(0)?,
                    event_type: row.get(1)?,
                    user_id: row.get(2)?,
                    success: row.get(3)?,
                    resource: row.get(4)?,
                    details: row.get(5)?,
                    auth_method: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_recent_returns_newest_first() {
        let repo = SqliteAuditRepository::new(test_support::pool());
        let now = Utc::now();

        for (i, event) in ["LOGIN", "TOKEN_VALIDATION", "LOGOUT"].iter().enumerate() {
            repo.insert(NewAuditLog {
                event_type: event.to_string(),
                user_id: Some("user-1".to_string()),
                success: i != 1,
                resource: None,
                details: None,
                auth_method: Some("jwt".to_string()),
                created_at: now + Duration::seconds(i as i64),
            })
            .await
            .unwrap();
        }

        let logs = repo.recent(2).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].event_type, "LOGOUT");
        assert!(!logs[1].success);
    }
}
