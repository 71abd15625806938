use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::errors::RepositoryError;
use super::new_id;
use crate::database::DatabasePool;
use crate::models::{NewUser, Role, User, UserProfileUpdate};

const USER_COLUMNS: &str = "id, email, password_hash, full_name, role, phone, region, \
     consultation_fee_cents, is_active, created_at, updated_at";

/// Repository trait for user accounts
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user. A duplicate email is a `Conflict`.
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepositoryError>;

    /// Lookup is case-insensitive
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    /// List users, optionally restricted to one role and to active accounts
    async fn list(&self, role: Option<Role>, active_only: bool) -> Result<Vec<User>, RepositoryError>;

    async fn update_profile(&self, id: &str, update: UserProfileUpdate) -> Result<User, RepositoryError>;

    async fn set_active(&self, id: &str, active: bool) -> Result<User, RepositoryError>;

    async fn count_by_role(&self, role: Role) -> Result<i64, RepositoryError>;
}

/// SQLite-backed user repository
#[derive(Debug, Clone)]
pub struct SqliteUserRepository {
    pool: DatabasePool,
}

impl SqliteUserRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            password_hash: row.get(2)?,
            full_name: row.get(3)?,
            role: row.get(4)?,
            phone: row.get(5)?,
            region: row.get(6)?,
            consultation_fee_cents: row.get(7)?,
            is_active: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn require(&self, id: &str) -> Result<User, RepositoryError> {
        let conn = self.pool.get()?;
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![id],
            Self::map_row,
        )
        .optional()?
        .ok_or_else(|| RepositoryError::not_found("user", id))
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let now = Utc::now();
        let record = User {
            id: new_id(),
            email: user.email.trim().to_lowercase(),
            password_hash: user.password_hash,
            full_name: user.full_name,
            role: user.role,
            phone: user.phone,
            region: user.region,
            consultation_fee_cents: user.consultation_fee_cents,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!("Inserting user {} with role {}", record.id, record.role);
        let conn = self.pool.get()?;
        conn.execute(
            &format!(
                "INSERT INTO users ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                USER_COLUMNS
            ),
            params![
                record.id,
                record.email,
                record.password_hash,
                record.full_name,
                record.role,
                record.phone,
                record.region,
                record.consultation_fee_cents,
                record.is_active,
                record.created_at,
                record.updated_at,
            ],
        )
        .map_err(|e| match RepositoryError::from(e) {
            RepositoryError::Conflict(_) => {
                RepositoryError::Conflict(format!("email {} is already registered", record.email))
            }
            other => other,
        })?;

        Ok(record)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                params![email.trim().to_lowercase()],
                Self::map_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn list(&self, role: Option<Role>, active_only: bool) -> Result<Vec<User>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users
             WHERE (?1 IS NULL OR role = ?1) AND (?2 = 0 OR is_active = 1)
             ORDER BY full_name ASC",
            USER_COLUMNS
        ))?;

        let users = stmt
            .query_map(params![role, active_only], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    async fn update_profile(&self, id: &str, update: UserProfileUpdate) -> Result<User, RepositoryError> {
        let mut user = self.require(id)?;

        if let Some(full_name) = update.full_name {
            user.full_name = full_name;
        }
        if let Some(phone) = update.phone {
            user.phone = Some(phone);
        }
        if let Some(region) = update.region {
            user.region = Some(region);
        }
        user.updated_at = Utc::now();

        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE users SET full_name = ?1, phone = ?2, region = ?3, updated_at = ?4 WHERE id = ?5",
            params![user.full_name, user.phone, user.region, user.updated_at, user.id],
        )?;

        Ok(user)
    }

    async fn set_active(&self, id: &str, active: bool) -> Result<User, RepositoryError> {
        let mut user = self.require(id)?;
        user.is_active = active;
        user.updated_at = Utc::now();

        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE users SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
            params![user.is_active, user.updated_at, user.id],
        )?;

        Ok(user)
    }

    async fn count_by_role(&self, role: Role) -> Result<i64, RepositoryError> {
        let conn = self.pool.get()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = ?1",
            params![role],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;

    #[tokio::test]
    async fn test_create_and_find_user() {
        let pool = test_support::pool();
        let repo = SqliteUserRepository::new(pool.clone());

        let created = test_support::user(&pool, "Ndapewa@Example.com", Role::Patient).await;
        assert_eq!(created.email, "ndapewa@example.com");
        assert!(created.is_active);

        let by_email = repo.find_by_email("NDAPEWA@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        assert_eq!(by_email.role, Role::Patient);
        assert_eq!(by_email.password_hash, "hash");

        assert!(repo.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let pool = test_support::pool();
        test_support::user(&pool, "dup@example.com", Role::Student).await;

        let result = SqliteUserRepository::new(pool)
            .create(NewUser {
                email: "DUP@example.com".to_string(),
                password_hash: "x".to_string(),
                full_name: "Dup".to_string(),
                role: Role::Student,
                phone: None,
                region: None,
                consultation_fee_cents: None,
            })
            .await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_list_filters_role_and_active() {
        let pool = test_support::pool();
        let repo = SqliteUserRepository::new(pool.clone());
        let active = test_support::user(&pool, "a@example.com", Role::Provider).await;
        let inactive = test_support::user(&pool, "b@example.com", Role::Provider).await;
        test_support::user(&pool, "c@example.com", Role::Patient).await;

        repo.set_active(&inactive.id, false).await.unwrap();

        let providers = repo.list(Some(Role::Provider), true).await.unwrap();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].id, active.id);

        assert_eq!(repo.list(None, false).await.unwrap().len(), 3);
        assert_eq!(repo.count_by_role(Role::Provider).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_profile_keeps_unset_fields() {
        let pool = test_support::pool();
        let repo = SqliteUserRepository::new(pool.clone());
        let user = test_support::user(&pool, "p@example.com", Role::Patient).await;

        let updated = repo
            .update_profile(
                &user.id,
                UserProfileUpdate {
                    phone: Some("+264 81 000 0000".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.full_name, user.full_name);
        assert_eq!(updated.region.as_deref(), Some("Khomas"));
        assert_eq!(updated.phone.as_deref(), Some("+264 81 000 0000"));

        let missing = repo.update_profile("nope", UserProfileUpdate::default()).await;
        assert!(matches!(missing, Err(RepositoryError::NotFound(_))));
    }
}
