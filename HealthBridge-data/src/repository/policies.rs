use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::errors::RepositoryError;
use super::new_id;
use crate::database::DatabasePool;
use crate::models::{NewPolicy, Policy, PolicyAcknowledgement, PolicyAcknowledgementCount};

const POLICY_COLUMNS: &str = "id, title, content, version, category, effective_date, created_by, created_at";

/// Repository trait for policies and acknowledgements
#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn create(&self, policy: NewPolicy) -> Result<Policy, RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Policy>, RepositoryError>;

    async fn list(&self) -> Result<Vec<Policy>, RepositoryError>;

    /// Record an acknowledgement. Repeating it keeps the first timestamp.
    async fn acknowledge(&self, policy_id: &str, user_id: &str) -> Result<PolicyAcknowledgement, RepositoryError>;

    /// Policies the user has not acknowledged yet
    async fn list_pending_for_user(&self, user_id: &str) -> Result<Vec<Policy>, RepositoryError>;

    async fn acknowledgement_counts(&self) -> Result<Vec<PolicyAcknowledgementCount>, RepositoryError>;
}

#[derive(Debug, Clone)]
pub struct SqlitePolicyRepository {
    pool: DatabasePool,
}

impl SqlitePolicyRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Policy> {
        Ok(Policy {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            version: row.get(3)?,
            category: row.get(4)?,
            effective_date: row.get(5)?,
            created_by: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

#[async_trait]
impl PolicyRepository for SqlitePolicyRepository {
    async fn create(&self, policy: NewPolicy) -> Result<Policy, RepositoryError> {
        let record = Policy {
            id: new_id(),
            title: policy.title,
            content: policy.content,
            version: policy.version,
            category: policy.category,
            effective_date: policy.effective_date,
            created_by: policy.created_by,
            created_at: Utc::now(),
        };

        debug!("Inserting policy {} version {}", record.id, record.version);
        let conn = self.pool.get()?;
        conn.execute(
            &format!(
                "INSERT INTO policies ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                POLICY_COLUMNS
            ),
            params![
                record.id,
                record.title,
                record.content,
                record.version,
                record.category,
                record.effective_date,
                record.created_by,
                record.created_at,
            ],
        )?;

        Ok(record)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Policy>, RepositoryError> {
        let conn = self.pool.get()?;
        let policy = conn
            .query_row(
                &format!("SELECT {} FROM policies WHERE id = ?1", POLICY_COLUMNS),
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(policy)
    }

    async fn list(&self) -> Result<Vec<Policy>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM policies ORDER BY effective_date DESC, title ASC",
            POLICY_COLUMNS
        ))?;
        let policies = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(policies)
    }

    async fn acknowledge(&self, policy_id: &str, user_id: &str) -> Result<PolicyAcknowledgement, RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT OR IGNORE INTO policy_acknowledgements (policy_id, user_id, acknowledged_at)
             VALUES (?1, ?2, ?3)",
            params![policy_id, user_id, Utc::now()],
        )?;

        let acknowledgement = conn.query_row(
            "SELECT policy_id, user_id, acknowledged_at FROM policy_acknowledgements
             WHERE policy_id = ?1 AND user_id = ?2",
            params![policy_id, user_id],
            |row| {
                Ok(PolicyAcknowledgement {
                    policy_id: row.get(0)?,
                    user_id: row.get(1)?,
                    acknowledged_at: row.get(2)?,
                })
            },
        )?;
        Ok(acknowledgement)
    }

    async fn list_pending_for_user(&self, user_id: &str) -> Result<Vec<Policy>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM policies p
             WHERE NOT EXISTS (
                 SELECT 1 FROM policy_acknowledgements a
                 WHERE a.policy_id = p.id AND a.user_id = ?1
             )
             ORDER BY effective_date DESC, title ASC",
            POLICY_COLUMNS
        ))?;
        let policies = stmt
            .query_map(params![user_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(policies)
    }

    async fn acknowledgement_counts(&self) -> Result<Vec<PolicyAcknowledgementCount>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT p.id, p.title, p.version, COUNT(a.user_id)
             FROM policies p
             LEFT JOIN policy_acknowledgements a ON a.policy_id = p.id
             GROUP BY p.id, p.title, p.version
             ORDER BY p.title ASC",
        )?;
        let counts = stmt
            .query_map([], |row| {
                Ok(PolicyAcknowledgementCount {
                    policy_id: row.get(0)?,
                    title: row.get(1)?,
                    version: row.get(2)?,
                    acknowledgements: row.get(3)?,
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
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_acknowledgement_is_idempotent_and_tracked() {
        let pool = test_support::pool();
        let admin = test_support::user(&pool, "admin@example.com", Role::Admin).await;
        let patient = test_support::user(&pool, "patient@example.com", Role::Patient).await;
        let repo = SqlitePolicyRepository::new(pool);

        let privacy = repo
            .create(NewPolicy {
                title: "Privacy".to_string(),
                content: "We protect your data.".to_string(),
                version: "1.0".to_string(),
                category: "privacy".to_string(),
                effective_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                created_by: admin.id.clone(),
            })
            .await
            .unwrap();
        repo.create(NewPolicy {
            title: "Terms".to_string(),
            content: "Be kind.".to_string(),
            version: "2.1".to_string(),
            category: "terms".to_string(),
            effective_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            created_by: admin.id.clone(),
        })
        .await
        .unwrap();

        assert_eq!(repo.list_pending_for_user(&patient.id).await.unwrap().len(), 2);

        let first = repo.acknowledge(&privacy.id, &patient.id).await.unwrap();
        let second = repo.acknowledge(&privacy.id, &patient.id).await.unwrap();
        assert_eq!(first.acknowledged_at, second.acknowledged_at);

        let pending = repo.list_pending_for_user(&patient.id).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].title, "Terms");

        let counts = repo.acknowledgement_counts().await.unwrap();
        let privacy_count = counts.iter().find(|c| c.policy_id == privacy.id).unwrap();
        assert_eq!(privacy_count.acknowledgements, 1);
        let terms_count = counts.iter().find(|c| c.title == "Terms").unwrap();
        assert_eq!(terms_count.acknowledgements, 0);
    }
}
