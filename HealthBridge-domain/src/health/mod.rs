//! Domain layer health check functionality
//!
//! Reports on the database and on the offline sync backlog.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use health_bridge_data::database::{get_connection_info, DatabasePool};
use health_bridge_data::models::SyncStatus;
use health_bridge_data::repository::{SqliteSyncRepository, SyncRepository};

/// Pending sync entries above which the queue is reported as degraded
pub const DEFAULT_SYNC_BACKLOG_THRESHOLD: i64 = 1000;

/// System health status
#[derive(Debug, Clone, PartialEq)]
pub enum SystemStatus {
    /// All components are healthy
    Healthy,
    /// Some components are degraded but the system is functional
    Degraded,
    /// System is not functioning properly
    Unhealthy,
}

/// Component health status
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Represents a health component with status and optional details
#[derive(Debug, Clone)]
pub struct HealthComponent {
    pub status: ComponentStatus,
    pub details: Option<String>,
}

impl HealthComponent {
    pub fn new(status: ComponentStatus, details: Option<String>) -> Self {
        Self {
            status,
            details,
        }
    }
}

/// Represents the overall health of the system
#[derive(Debug, Clone)]
pub struct SystemHealth {
    pub status: SystemStatus,
    /// Component name to its health
    pub components: HashMap<String, HealthComponent>,
}

impl SystemHealth {
    /// Overall status is the worst component status
    pub fn from_components(components: HashMap<String, HealthComponent>) -> Self {
        let status = if components.values().any(|c| c.status == ComponentStatus::Unhealthy) {
            SystemStatus::Unhealthy
        } else if components.values().any(|c| c.status == ComponentStatus::Degraded) {
            SystemStatus::Degraded
        } else {
            SystemStatus::Healthy
        };
        Self { status, components }
    }
}

/// Trait for health services
#[async_trait]
pub trait HealthServiceTrait: Send + Sync + std::fmt::Debug {
    /// Get the overall system health
    async fn get_system_health(&self) -> SystemHealth;

    /// Ok(true) when the database answers queries, Err when it cannot be reached
    async fn check_database_status(&self) -> Result<bool, String>;
}

/// Health checks against the live pool
pub struct HealthService {
    pool: DatabasePool,
    sync_queue: Arc<dyn SyncRepository>,
    backlog_threshold: i64,
}

impl std::fmt::Debug for HealthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthService")
            .field("backlog_threshold", &self.backlog_threshold)
            .finish()
    }
}

impl HealthService {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            sync_queue: Arc::new(SqliteSyncRepository::new(pool.clone())),
            pool,
            backlog_threshold: DEFAULT_SYNC_BACKLOG_THRESHOLD,
        }
    }

    pub fn with_backlog_threshold(mut self, threshold: i64) -> Self {
        self.backlog_threshold = threshold;
        self
    }

    async fn database_component(&self) -> HealthComponent {
        match self.check_database_status().await {
            Ok(true) => HealthComponent::new(ComponentStatus::Healthy, get_connection_info(&self.pool).ok()),
            Ok(false) => HealthComponent::new(
                ComponentStatus::Degraded,
                Some("Database answered with an unexpected result".to_string()),
            ),
            Err(e) => HealthComponent::new(ComponentStatus::Unhealthy, Some(e)),
        }
    }

    async fn sync_component(&self) -> HealthComponent {
        let counts = match self.sync_queue.count_by_status().await {
            Ok(counts) => counts,
            Err(e) => {
                warn!("Could not read sync queue counts: {}", e);
                return HealthComponent::new(ComponentStatus::Degraded, Some(format!("Sync queue unavailable: {}", e)));
            }
        };
        let count_of = |status: SyncStatus| {
            counts
                .iter()
                .find(|g| g.key == status.as_str())
                .map_or(0, |g| g.count)
        };
        let pending = count_of(SyncStatus::Pending);
        let failed = count_of(SyncStatus::Failed);
        let details = format!("{} pending, {} failed", pending, failed);

        if pending > self.backlog_threshold {
            HealthComponent::new(ComponentStatus::Degraded, Some(format!("Backlog too large: {}", details)))
        } else {
            HealthComponent::new(ComponentStatus::Healthy, Some(details))
        }
    }
}

#[async_trait]
impl HealthServiceTrait for HealthService {
    async fn get_system_health(&self) -> SystemHealth {
        let mut components = HashMap::new();
        components.insert("database".to_string(), self.database_component().await);
        components.insert("sync_queue".to_string(), self.sync_component().await);
        SystemHealth::from_components(components)
    }

    async fn check_database_status(&self) -> Result<bool, String> {
        let conn = self
            .pool
            .get()
            .map_err(|e| format!("Database connection error: {}", e))?;
        let one: i64 = conn
            .query_row("SELECT 1", [], |row| row.get(0))
            .map_err(|e| format!("Database query failed: {}", e))?;
        Ok(one == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use health_bridge_data::models::{NewSyncEntry, NewUser, Role};
    use health_bridge_data::repository::{SqliteUserRepository, UserRepository};

    fn pool() -> DatabasePool {
        DatabasePool::in_memory().expect("in-memory database")
    }

    #[tokio::test]
    async fn test_healthy_system() {
        let service = HealthService::new(pool());
        let health = service.get_system_health().await;

        assert_eq!(health.status, SystemStatus::Healthy);
        let db = &health.components["database"];
        assert_eq!(db.status, ComponentStatus::Healthy);
        assert!(db.details.as_deref().unwrap_or_default().contains("SQLite"));
        assert_eq!(
            health.components["sync_queue"].details.as_deref(),
            Some("0 pending, 0 failed")
        );
    }

    #[tokio::test]
    async fn test_sync_backlog_degrades_health() {
        let pool = pool();
        let user = SqliteUserRepository::new(pool.clone())
            .create(NewUser {
                email: "field.worker@example.com".to_string(),
                password_hash: "hash".to_string(),
                full_name: "Field Worker".to_string(),
                role: Role::Patient,
                phone: None,
                region: Some("Ohangwena".to_string()),
                consultation_fee_cents: None,
            })
            .await
            .unwrap();
        let repo = SqliteSyncRepository::new(pool.clone());
        for i in 0..3 {
            repo.enqueue(NewSyncEntry {
                user_id: user.id.clone(),
                client_id: format!("c-{}", i),
                entity_type: "appointment".to_string(),
                operation: "create".to_string(),
                payload: serde_json::json!({}),
                client_timestamp: None,
            })
            .await
            .unwrap();
        }

        let service = HealthService::new(pool).with_backlog_threshold(2);
        let health = service.get_system_health().await;
        assert_eq!(health.status, SystemStatus::Degraded);
        assert_eq!(health.components["sync_queue"].status, ComponentStatus::Degraded);
    }

    #[test]
    fn test_worst_component_wins() {
        let mut components = HashMap::new();
        components.insert("a".to_string(), HealthComponent::new(ComponentStatus::Degraded, None));
        components.insert("b".to_string(), HealthComponent::new(ComponentStatus::Unhealthy, None));
        assert_eq!(SystemHealth::from_components(components).status, SystemStatus::Unhealthy);
    }
}
