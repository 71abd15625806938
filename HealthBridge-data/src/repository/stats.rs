use async_trait::async_trait;
use rusqlite::Connection;

use super::errors::RepositoryError;
use crate::database::DatabasePool;
use crate::models::{GroupCount, InvoiceTotal, SystemStats};

/// Aggregate queries for the admin dashboard
#[async_trait]
pub trait StatsRepository: Send + Sync {
    async fn system_stats(&self) -> Result<SystemStats, RepositoryError>;
}

#[derive(Debug, Clone)]
pub struct SqliteStatsRepository {
    pool: DatabasePool,
}

impl SqliteStatsRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn group_counts(conn: &Connection, table: &str, column: &str) -> Result<Vec<GroupCount>, RepositoryError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {column}, COUNT(*) FROM {table} GROUP BY {column} ORDER BY {column}"
    ))?;
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

fn count(conn: &Connection, table: &str) -> Result<i64, RepositoryError> {
    Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?)
}

#[async_trait]
impl StatsRepository for SqliteStatsRepository {
    async fn system_stats(&self) -> Result<SystemStats, RepositoryError> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*), COALESCE(SUM(amount_cents), 0)
             FROM invoices GROUP BY status ORDER BY status",
        )?;
        let invoices_by_status = stmt
            .query_map([], |row| {
                Ok(InvoiceTotal {
                    status: row.get(0)?,
                    count: row.get(1)?,
                    amount_cents: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        Ok(SystemStats {
            users_by_role: group_counts(&conn, "users", "role")?,
            appointments_by_status: group_counts(&conn, "appointments", "status")?,
            invoices_by_status,
            wellness_by_status: group_counts(&conn, "wellness_content", "status")?,
            assignments: count(&conn, "assignments")?,
            submissions: count(&conn, "submissions")?,
            surveys_by_status: group_counts(&conn, "surveys", "status")?,
            survey_responses: count(&conn, "survey_responses")?,
            sync_queue_by_status: group_counts(&conn, "sync_queue", "status")?,
        })
    }
}
