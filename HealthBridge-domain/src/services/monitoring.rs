use std::sync::Arc;

use crate::access::ensure_role;
use crate::auth::UserInfo;
use crate::entities::{AuditQuery, DEFAULT_AUDIT_LIMIT, MAX_AUDIT_LIMIT};
use crate::errors::ServiceError;
use health_bridge_data::models::{AuditLog, Role, SystemStats};
use health_bridge_data::repository::{AuditRepository, StatsRepository};

/// Admin-only view of platform activity
#[derive(Clone)]
pub struct MonitoringService {
    stats: Arc<dyn StatsRepository>,
    audit: Arc<dyn AuditRepository>,
}

impl MonitoringService {
    pub fn new(stats: Arc<dyn StatsRepository>, audit: Arc<dyn AuditRepository>) -> Self {
        Self { stats, audit }
    }

    pub async fn stats(&self, actor: &UserInfo) -> Result<SystemStats, ServiceError> {
        ensure_role(actor, &[Role::Admin])?;
        Ok(self.stats.system_stats().await?)
    }

    pub async fn audit(&self, actor: &UserInfo, query: AuditQuery) -> Result<Vec<AuditLog>, ServiceError> {
        ensure_role(actor, &[Role::Admin])?;
        let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT).clamp(1, MAX_AUDIT_LIMIT);
        Ok(self.audit.recent(limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;
    use chrono::Utc;
    use health_bridge_data::models::NewAuditLog;

    #[tokio::test]
    async fn test_stats_are_admin_only() {
        let ctx = TestContext::new();
        let admin = ctx.info(&ctx.user("admin@example.com", Role::Admin).await);
        let provider = ctx.info(&ctx.user("dr.nuuyoma@example.com", Role::Provider).await);
        ctx.user("patient@example.com", Role::Patient).await;

        assert!(matches!(
            ctx.services.monitoring.stats(&provider).await,
            Err(ServiceError::Forbidden(_))
        ));
        let stats = ctx.services.monitoring.stats(&admin).await.unwrap();
        let total: i64 = stats.users_by_role.iter().map(|g| g.count).sum();
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_audit_limit_is_clamped() {
        let ctx = TestContext::new();
        let admin = ctx.info(&ctx.user("admin@example.com", Role::Admin).await);
        let audit = ctx.audit_repo();
        for i in 0..3 {
            audit
                .insert(NewAuditLog {
                    event_type: "LOGIN".to_string(),
                    user_id: Some(format!("user-{}", i)),
                    success: true,
                    resource: None,
                    details: None,
                    auth_method: Some("password".to_string()),
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let events = ctx
            .services
            .monitoring
            .audit(&admin, AuditQuery { limit: Some(0) })
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        let all = ctx.services.monitoring.audit(&admin, AuditQuery::default()).await.unwrap();
        assert_eq!(all.len(), 3);
    }
}
