use std::sync::Arc;

use tracing::{info, instrument};
use validator::Validate;

use crate::access::ensure_role;
use crate::auth::UserInfo;
use crate::entities::CreatePolicyRequest;
use crate::errors::ServiceError;
use health_bridge_data::models::{NewPolicy, Policy, PolicyAcknowledgement, PolicyAcknowledgementCount, Role};
use health_bridge_data::repository::PolicyRepository;

#[derive(Clone)]
pub struct PolicyService {
    policies: Arc<dyn PolicyRepository>,
}

impl PolicyService {
    pub fn new(policies: Arc<dyn PolicyRepository>) -> Self {
        Self { policies }
    }

    #[instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn create(&self, actor: &UserInfo, request: CreatePolicyRequest) -> Result<Policy, ServiceError> {
        ensure_role(actor, &[Role::Admin])?;
        request.validate()?;

        let policy = self
            .policies
            .create(NewPolicy {
                title: request.title,
                content: request.content,
                version: request.version,
                category: request.category.to_lowercase(),
                effective_date: request.effective_date,
                created_by: actor.user_id.clone(),
            })
            .await?;
        info!("Policy {} v{} published", policy.id, policy.version);
        Ok(policy)
    }

    pub async fn list(&self) -> Result<Vec<Policy>, ServiceError> {
        Ok(self.policies.list().await?)
    }

    pub async fn get(&self, id: &str) -> Result<Policy, ServiceError> {
        self.policies
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Policy", id))
    }

    /// Acknowledging twice keeps the first timestamp
    pub async fn acknowledge(&self, actor: &UserInfo, policy_id: &str) -> Result<PolicyAcknowledgement, ServiceError> {
        self.get(policy_id).await?;
        Ok(self.policies.acknowledge(policy_id, &actor.user_id).await?)
    }

    pub async fn pending(&self, actor: &UserInfo) -> Result<Vec<Policy>, ServiceError> {
        Ok(self.policies.list_pending_for_user(&actor.user_id).await?)
    }

    pub async fn acknowledgement_counts(&self, actor: &UserInfo) -> Result<Vec<PolicyAcknowledgementCount>, ServiceError> {
        ensure_role(actor, &[Role::Admin])?;
        Ok(self.policies.acknowledgement_counts().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;
    use chrono::NaiveDate;

    fn privacy_policy() -> CreatePolicyRequest {
        CreatePolicyRequest {
            title: "Patient data privacy".to_string(),
            content: "We store clinical notes encrypted.".to_string(),
            version: "1.0".to_string(),
            category: "Privacy".to_string(),
            effective_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_acknowledgement_flow() {
        let ctx = TestContext::new();
        let admin = ctx.info(&ctx.user("admin@example.com", Role::Admin).await);
        let patient = ctx.info(&ctx.user("patient@example.com", Role::Patient).await);
        let service = &ctx.services.policies;

        assert!(matches!(service.create(&patient, privacy_policy()).await, Err(ServiceError::Forbidden(_))));
        let policy = service.create(&admin, privacy_policy()).await.unwrap();
        assert_eq!(policy.category, "privacy");

        assert_eq!(service.pending(&patient).await.unwrap().len(), 1);
        let first = service.acknowledge(&patient, &policy.id).await.unwrap();
        let again = service.acknowledge(&patient, &policy.id).await.unwrap();
        assert_eq!(first.acknowledged_at, again.acknowledged_at);
        assert!(service.pending(&patient).await.unwrap().is_empty());

        assert!(matches!(
            service.acknowledge(&patient, "missing").await,
            Err(ServiceError::NotFound(_))
        ));

        assert!(matches!(service.acknowledgement_counts(&patient).await, Err(ServiceError::Forbidden(_))));
        let counts = service.acknowledgement_counts(&admin).await.unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].acknowledgements, 1);
    }
}
