use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::errors::RepositoryError;
use super::{json_column, new_id};
use crate::database::DatabasePool;
use crate::models::{GroupCount, NewSyncEntry, SyncEntry, SyncStatus};

const SYNC_COLUMNS: &str = "id, user_id, client_id, entity_type, operation, payload, status, \
     retry_count, last_error, client_timestamp, created_at, processed_at";

/// Repository trait for the offline sync queue
#[async_trait]
pub trait SyncRepository: Send + Sync {
    /// Queue an operation. Returns the stored entry and whether it was newly
    /// inserted; re-uploading a known `client_id` returns the existing entry.
    async fn enqueue(&self, entry: NewSyncEntry) -> Result<(SyncEntry, bool), RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<SyncEntry>, RepositoryError>;

    /// Oldest pending entries that still have retries left
    async fn get_pending(&self, limit: usize, max_retries: u32) -> Result<Vec<SyncEntry>, RepositoryError>;

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<SyncEntry>, RepositoryError>;

    /// Settle a pending entry as synced. `Conflict` if it was already settled.
    async fn mark_synced(&self, id: &str) -> Result<(), RepositoryError>;

    /// Count a failed attempt on a pending entry. The entry stays pending
    /// unless `terminal`. `Conflict` if it was already settled.
    async fn record_failure(&self, id: &str, error: &str, terminal: bool) -> Result<SyncEntry, RepositoryError>;

    async fn count_by_status(&self) -> Result<Vec<GroupCount>, RepositoryError>;
}

#[derive(Debug, Clone)]
pub struct SqliteSyncRepository {
    pool: DatabasePool,
}

impl SqliteSyncRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<SyncEntry> {
        Ok(SyncEntry {
            id: row.get(0)?,
            user_id: row.get(1)?,
            client_id: row.get(2)?,
            entity_type: row.get(3)?,
            operation: row.get(4)?,
            payload: json_column(row, 5)?,
            status: row.get(6)?,
            retry_count: row.get(7)?,
            last_error: row.get(8)?,
            client_timestamp: row.get(9)?,
            created_at: row.get(10)?,
            processed_at: row.get(11)?,
        })
    }

    fn find_by_client_id(&self, user_id: &str, client_id: &str) -> Result<Option<SyncEntry>, RepositoryError> {
        let conn = self.pool.get()?;
        let entry = conn
            .query_row(
                &format!(
                    "SELECT {} FROM sync_queue WHERE user_id = ?1 AND client_id = ?2",
                    SYNC_COLUMNS
                ),
                params![user_id, client_id],
                Self::map_row,
            )
            .optional()?;
        Ok(entry)
    }

    /// Error for a guarded update that changed nothing
    fn not_pending(&self, id: &str) -> RepositoryError {
        let conn = match self.pool.get() {
            Ok(conn) => conn,
            Err(e) => return e.into(),
        };
        let status: Result<Option<SyncStatus>, _> = conn
            .query_row("SELECT status FROM sync_queue WHERE id = ?1", params![id], |row| row.get(0))
            .optional();
        match status {
            Ok(Some(status)) => RepositoryError::Conflict(format!("Sync entry is already {}", status)),
            Ok(None) => RepositoryError::not_found("sync entry", id),
            Err(e) => e.into(),
        }
    }
}

#[async_trait]
impl SyncRepository for SqliteSyncRepository {
    async fn enqueue(&self, entry: NewSyncEntry) -> Result<(SyncEntry, bool), RepositoryError> {
        let record = SyncEntry {
            id: new_id(),
            user_id: entry.user_id,
            client_id: entry.client_id,
            entity_type: entry.entity_type,
            operation: entry.operation,
            payload: entry.payload,
            status: SyncStatus::Pending,
            retry_count: 0,
            last_error: None,
            client_timestamp: entry.client_timestamp,
            created_at: Utc::now(),
            processed_at: None,
        };
        let payload = serde_json::to_string(&record.payload)?;

        let inserted = {
            let conn = self.pool.get()?;
            conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO sync_queue ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    SYNC_COLUMNS
                ),
                params![
                    record.id,
                    record.user_id,
                    record.client_id,
                    record.entity_type,
                    record.operation,
                    payload,
                    record.status,
                    record.retry_count,
                    record.last_error,
                    record.client_timestamp,
                    record.created_at,
                    record.processed_at,
                ],
            )?
        };

        if inserted == 1 {
            debug!("Queued sync entry {} ({}/{})", record.id, record.entity_type, record.operation);
            return Ok((record, true));
        }

        debug!("Sync entry with client id {} already queued", record.client_id);
        let existing = self
            .find_by_client_id(&record.user_id, &record.client_id)?
            .ok_or_else(|| RepositoryError::not_found("sync entry", &record.client_id))?;
        Ok((existing, false))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<SyncEntry>, RepositoryError> {
        let conn = self.pool.get()?;
        let entry = conn
            .query_row(
                &format!("SELECT {} FROM sync_queue WHERE id = ?1", SYNC_COLUMNS),
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(entry)
    }

    async fn get_pending(&self, limit: usize, max_retries: u32) -> Result<Vec<SyncEntry>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sync_queue
             WHERE status = 'pending' AND retry_count < ?1
             ORDER BY created_at ASC
             LIMIT ?2",
            SYNC_COLUMNS
        ))?;
        let entries = stmt
            .query_map(params![max_retries, limit as i64], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<SyncEntry>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sync_queue WHERE user_id = ?1 ORDER BY created_at DESC",
            SYNC_COLUMNS
        ))?;
        let entries = stmt
            .query_map(params![user_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    async fn mark_synced(&self, id: &str) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE sync_queue SET status = 'synced', last_error = NULL, processed_at = ?1
             WHERE id = ?2 AND status = 'pending'",
            params![Utc::now(), id],
        )?;
        if changed == 0 {
            return Err(self.not_pending(id));
        }
        Ok(())
    }

    async fn record_failure(&self, id: &str, error: &str, terminal: bool) -> Result<SyncEntry, RepositoryError> {
        let status = if terminal { SyncStatus::Failed } else { SyncStatus::Pending };
        let processed_at = if terminal { Some(Utc::now()) } else { None };

        let changed = {
            let conn = self.pool.get()?;
            conn.execute(
                "UPDATE sync_queue
                 SET retry_count = retry_count + 1, last_error = ?1, status = ?2, processed_at = ?3
                 WHERE id = ?4 AND status = 'pending'",
                params![error, status, processed_at, id],
            )?
        };
        if changed == 0 {
            return Err(self.not_pending(id));
        }

        self.find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("sync entry", id))
    }

    async fn count_by_status(&self) -> Result<Vec<GroupCount>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM sync_queue GROUP BY status ORDER BY status")?;
        let counts = stmt
            .query_map([], |row| {
                Ok(GroupCount {
                    key: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::repository::test_support;
    use serde_json::json;

    fn entry(user_id: &str, client_id: &str) -> NewSyncEntry {
        NewSyncEntry {
            user_id: user_id.to_string(),
            client_id: client_id.to_string(),
            entity_type: "appointment".to_string(),
            operation: "create".to_string(),
            payload: json!({ "provider_id": "p1" }),
            client_timestamp: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_enqueue_is_idempotent_per_client_id() {
        let pool = test_support::pool();
        let user = test_support::user(&pool, "offline@example.com", Role::Patient).await;
        let repo = SqliteSyncRepository::new(pool);

        let (first, created) = repo.enqueue(entry(&user.id, "c-1")).await.unwrap();
        assert!(created);
        let (second, created_again) = repo.enqueue(entry(&user.id, "c-1")).await.unwrap();
        assert!(!created_again);
        assert_eq!(first.id, second.id);
        assert_eq!(second.payload["provider_id"], "p1");

        assert_eq!(repo.list_for_user(&user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pending_respects_retry_limit_and_status() {
        let pool = test_support::pool();
        let user = test_support::user(&pool, "offline@example.com", Role::Patient).await;
        let repo = SqliteSyncRepository::new(pool);

        let (a, _) = repo.enqueue(entry(&user.id, "a")).await.unwrap();
        let (b, _) = repo.enqueue(entry(&user.id, "b")).await.unwrap();
        let (c, _) = repo.enqueue(entry(&user.id, "c")).await.unwrap();

        repo.mark_synced(&a.id).await.unwrap();
        let retried = repo.record_failure(&b.id, "timeout", false).await.unwrap();
        assert_eq!(retried.retry_count, 1);
        assert_eq!(retried.status, SyncStatus::Pending);

        let pending = repo.get_pending(10, 3).await.unwrap();
        assert_eq!(pending.len(), 2);

        let pending = repo.get_pending(10, 1).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, c.id);

        let failed = repo.record_failure(&c.id, "invalid payload", true).await.unwrap();
        assert_eq!(failed.status, SyncStatus::Failed);
        assert!(failed.processed_at.is_some());

        let synced = repo.find_by_id(&a.id).await.unwrap().unwrap();
        assert_eq!(synced.status, SyncStatus::Synced);
        assert!(synced.processed_at.is_some());

        let counts = repo.count_by_status().await.unwrap();
        assert_eq!(counts.len(), 3);
        assert!(counts.iter().all(|c| c.count == 1));
    }

    #[tokio::test]
    async fn test_settled_entries_are_not_overwritten() {
        let pool = test_support::pool();
        let user = test_support::user(&pool, "offline@example.com", Role::Patient).await;
        let repo = SqliteSyncRepository::new(pool);

        let (synced, _) = repo.enqueue(entry(&user.id, "done")).await.unwrap();
        let (failed, _) = repo.enqueue(entry(&user.id, "broken")).await.unwrap();
        repo.mark_synced(&synced.id).await.unwrap();
        repo.record_failure(&failed.id, "invalid payload", true).await.unwrap();

        assert!(matches!(
            repo.record_failure(&synced.id, "late failure", true).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert!(matches!(repo.mark_synced(&synced.id).await, Err(RepositoryError::Conflict(_))));
        assert!(matches!(repo.mark_synced(&failed.id).await, Err(RepositoryError::Conflict(_))));
        assert!(matches!(repo.mark_synced("missing").await, Err(RepositoryError::NotFound(_))));

        let stored = repo.find_by_id(&synced.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SyncStatus::Synced);
        assert_eq!(stored.retry_count, 0);
        assert!(stored.last_error.is_none());
        let stored = repo.find_by_id(&failed.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SyncStatus::Failed);
        assert_eq!(stored.retry_count, 1);
    }
}
