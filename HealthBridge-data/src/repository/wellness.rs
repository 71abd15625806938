use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tracing::debug;

use super::errors::RepositoryError;
use super::new_id;
use crate::database::DatabasePool;
use crate::models::{ContentStatus, NewWellnessContent, WellnessContent, WellnessFilter};

const CONTENT_COLUMNS: &str = "id, author_id, title, summary, body, category, media_url, status, \
     published_at, created_at, updated_at";

/// Repository trait for wellness content
#[async_trait]
pub trait WellnessRepository: Send + Sync {
    /// Insert a new draft
    async fn create(&self, content: NewWellnessContent) -> Result<WellnessContent, RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<WellnessContent>, RepositoryError>;

    async fn list(&self, filter: &WellnessFilter) -> Result<Vec<WellnessContent>, RepositoryError>;

    /// Persist every mutable field of an existing item
    async fn update(&self, content: &WellnessContent) -> Result<WellnessContent, RepositoryError>;

    /// Returns false when nothing was deleted
    async fn delete(&self, id: &str) -> Result<bool, RepositoryError>;
}

#[derive(Debug, Clone)]
pub struct SqliteWellnessRepository {
    pool: DatabasePool,
}

impl SqliteWellnessRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<WellnessContent> {
        Ok(WellnessContent {
            id: row.get(0)?,
            author_id: row.get(1)?,
            title: row.get(2)?,
            summary: row.get(3)?,
            body: row.get(4)?,
            category: row.get(5)?,
            media_url: row.get(6)?,
            status: row.get(7)?,
            published_at: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }
}

#[async_trait]
impl WellnessRepository for SqliteWellnessRepository {
    async fn create(&self, content: NewWellnessContent) -> Result<WellnessContent, RepositoryError> {
        let now = Utc::now();
        let record = WellnessContent {
            id: new_id(),
            author_id: content.author_id,
            title: content.title,
            summary: content.summary,
            body: content.body,
            category: content.category,
            media_url: content.media_url,
            status: ContentStatus::Draft,
            published_at: None,
            created_at: now,
            updated_at: now,
        };

        debug!("Inserting wellness content {}", record.id);
        let conn = self.pool.get()?;
        conn.execute(
            &format!(
                "INSERT INTO wellness_content ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                CONTENT_COLUMNS
            ),
            params![
                record.id,
                record.author_id,
                record.title,
                record.summary,
                record.body,
                record.category,
                record.media_url,
                record.status,
                record.published_at,
                record.created_at,
                record.updated_at,
            ],
        )?;

        Ok(record)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<WellnessContent>, RepositoryError> {
        let conn = self.pool.get()?;
        let content = conn
            .query_row(
                &format!("SELECT {} FROM wellness_content WHERE id = ?1", CONTENT_COLUMNS),
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(content)
    }

    async fn list(&self, filter: &WellnessFilter) -> Result<Vec<WellnessContent>, RepositoryError> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            values.push(Box::new(status));
        }
        if let Some(author_id) = &filter.author_id {
            conditions.push("author_id = ?");
            values.push(Box::new(author_id.clone()));
        }
        if let Some(category) = &filter.category {
            conditions.push("category = ?");
            values.push(Box::new(category.clone()));
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            conditions.push("(LOWER(title) LIKE ? OR LOWER(COALESCE(summary, '')) LIKE ?)");
            let pattern = format!("%{}%", search.to_lowercase());
            values.push(Box::new(pattern.clone()));
            values.push(Box::new(pattern));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM wellness_content {} ORDER BY COALESCE(published_at, created_at) DESC",
            CONTENT_COLUMNS, where_clause
        ))?;
        let items = stmt
            .query_map(params_from_iter(values.iter()), Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    async fn update(&self, content: &WellnessContent) -> Result<WellnessContent, RepositoryError> {
        let mut record = content.clone();
        record.updated_at = Utc::now();

        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE wellness_content
             SET title = ?1, summary = ?2, body = ?3, category = ?4, media_url = ?5,
                 status = ?6, published_at = ?7, updated_at = ?8
             WHERE id = ?9",
            params![
                record.title,
                record.summary,
                record.body,
                record.category,
                record.media_url,
                record.status,
                record.published_at,
                record.updated_at,
                record.id,
            ],
        )?;

        if changed == 0 {
            return Err(RepositoryError::not_found("wellness content", &record.id));
        }
        Ok(record)
    }

    async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let deleted = conn.execute("DELETE FROM wellness_content WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::repository::test_support;

    fn draft(author_id: &str, title: &str, category: &str) -> NewWellnessContent {
        NewWellnessContent {
            author_id: author_id.to_string(),
            title: title.to_string(),
            summary: Some("Short read".to_string()),
            body: "Drink water and keep moving.".to_string(),
            category: category.to_string(),
            media_url: None,
        }
    }

    #[tokio::test]
    async fn test_filters_by_status_category_and_search() {
        let pool = test_support::pool();
        let coach = test_support::user(&pool, "coach@example.com", Role::Coach).await;
        let repo = SqliteWellnessRepository::new(pool);

        let mut hydration = repo.create(draft(&coach.id, "Hydration in Summer", "nutrition")).await.unwrap();
        repo.create(draft(&coach.id, "Sleep Hygiene", "sleep")).await.unwrap();

        hydration.status = ContentStatus::Published;
        hydration.published_at = Some(Utc::now());
        repo.update(&hydration).await.unwrap();

        let published = repo
            .list(&WellnessFilter {
                status: Some(ContentStatus::Published),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].id, hydration.id);

        let searched = repo
            .list(&WellnessFilter {
                search: Some("HYDRATION".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(searched.len(), 1);

        let sleep = repo
            .list(&WellnessFilter {
                category: Some("sleep".to_string()),
                author_id: Some(coach.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(sleep.len(), 1);
        assert_eq!(sleep[0].status, ContentStatus::Draft);
    }

    #[tokio::test]
    async fn test_delete() {
        let pool = test_support::pool();
        let coach = test_support::user(&pool, "coach@example.com", Role::Coach).await;
        let repo = SqliteWellnessRepository::new(pool);

        let item = repo.create(draft(&coach.id, "Stretching", "fitness")).await.unwrap();
        assert!(repo.delete(&item.id).await.unwrap());
        assert!(!repo.delete(&item.id).await.unwrap());
        assert!(repo.find_by_id(&item.id).await.unwrap().is_none());
    }
}
