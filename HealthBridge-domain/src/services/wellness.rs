use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};
use validator::Validate;

use crate::access::ensure_role;
use crate::auth::UserInfo;
use crate::entities::{CreateWellnessRequest, UpdateWellnessRequest, WellnessQuery};
use crate::errors::ServiceError;
use health_bridge_data::models::{ContentStatus, NewWellnessContent, Role, WellnessContent, WellnessFilter};
use health_bridge_data::repository::WellnessRepository;

const AUTHOR_ROLES: [Role; 2] = [Role::Coach, Role::Admin];

#[derive(Clone)]
pub struct WellnessService {
    content: Arc<dyn WellnessRepository>,
}

impl WellnessService {
    pub fn new(content: Arc<dyn WellnessRepository>) -> Self {
        Self { content }
    }

    fn is_author_or_admin(actor: &UserInfo, item: &WellnessContent) -> bool {
        actor.is_admin() || item.author_id == actor.user_id
    }

    /// Load an item the caller may manage. Drafts of other authors look
    /// missing rather than forbidden.
    async fn load_owned(&self, actor: &UserInfo, id: &str) -> Result<WellnessContent, ServiceError> {
        let item = self.get(actor, id).await?;
        if !Self::is_author_or_admin(actor, &item) {
            return Err(ServiceError::Forbidden(
                "Only the author or an admin can change this content".to_string(),
            ));
        }
        Ok(item)
    }

    #[instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn create(&self, actor: &UserInfo, request: CreateWellnessRequest) -> Result<WellnessContent, ServiceError> {
        ensure_role(actor, &AUTHOR_ROLES)?;
        request.validate()?;

        let item = self
            .content
            .create(NewWellnessContent {
                author_id: actor.user_id.clone(),
                title: request.title,
                summary: request.summary,
                body: request.body,
                category: request.category.to_lowercase(),
                media_url: request.media_url,
            })
            .await?;
        info!("Wellness draft {} created", item.id);
        Ok(item)
    }

    pub async fn list(&self, actor: &UserInfo, query: WellnessQuery) -> Result<Vec<WellnessContent>, ServiceError> {
        let mut filter = WellnessFilter {
            category: query.category.map(|c| c.to_lowercase()),
            search: query.search.filter(|s| !s.trim().is_empty()),
            ..Default::default()
        };
        if query.mine.unwrap_or(false) {
            filter.author_id = Some(actor.user_id.clone());
        } else {
            filter.status = Some(ContentStatus::Published);
        }
        Ok(self.content.list(&filter).await?)
    }

    pub async fn get(&self, actor: &UserInfo, id: &str) -> Result<WellnessContent, ServiceError> {
        match self.content.find_by_id(id).await? {
            Some(item) if item.status == ContentStatus::Published || Self::is_author_or_admin(actor, &item) => Ok(item),
            _ => Err(ServiceError::not_found("Wellness content", id)),
        }
    }

    #[instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn update(
        &self,
        actor: &UserInfo,
        id: &str,
        request: UpdateWellnessRequest,
    ) -> Result<WellnessContent, ServiceError> {
        request.validate()?;
        let mut item = self.load_owned(actor, id).await?;

        if let Some(title) = request.title {
            item.title = title;
        }
        if request.summary.is_some() {
            item.summary = request.summary;
        }
        if let Some(body) = request.body {
            item.body = body;
        }
        if let Some(category) = request.category {
            item.category = category.to_lowercase();
        }
        if request.media_url.is_some() {
            item.media_url = request.media_url;
        }

        Ok(self.content.update(&item).await?)
    }

    pub async fn publish(&self, actor: &UserInfo, id: &str) -> Result<WellnessContent, ServiceError> {
        let mut item = self.load_owned(actor, id).await?;
        if item.status != ContentStatus::Published {
            item.status = ContentStatus::Published;
            item.published_at = Some(Utc::now());
            item = self.content.update(&item).await?;
            info!("Wellness content {} published", item.id);
        }
        Ok(item)
    }

    pub async fn unpublish(&self, actor: &UserInfo, id: &str) -> Result<WellnessContent, ServiceError> {
        let mut item = self.load_owned(actor, id).await?;
        item.status = ContentStatus::Draft;
        item.published_at = None;
        Ok(self.content.update(&item).await?)
    }

    pub async fn delete(&self, actor: &UserInfo, id: &str) -> Result<(), ServiceError> {
        self.load_owned(actor, id).await?;
        if !self.content.delete(id).await? {
            return Err(ServiceError::not_found("Wellness content", id));
        }
        info!("Wellness content {} deleted by {}", id, actor.user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;

    fn article(title: &str) -> CreateWellnessRequest {
        CreateWellnessRequest {
            title: title.to_string(),
            summary: Some("Staying hydrated in the Kalahari heat".to_string()),
            body: "Drink water regularly throughout the day.".to_string(),
            category: "Nutrition".to_string(),
            media_url: None,
        }
    }

    #[tokio::test]
    async fn test_only_coaches_and_admins_create() {
        let ctx = TestContext::new();
        let patient = ctx.info(&ctx.user("patient@example.com", Role::Patient).await);
        let coach = ctx.info(&ctx.user("coach@example.com", Role::Coach).await);
        let service = &ctx.services.wellness;

        assert!(matches!(service.create(&patient, article("Hydration")).await, Err(ServiceError::Forbidden(_))));

        let item = service.create(&coach, article("Hydration")).await.unwrap();
        assert_eq!(item.status, ContentStatus::Draft);
        assert_eq!(item.category, "nutrition");

        let mut bad = article("Hydration");
        bad.media_url = Some("not a url".to_string());
        assert!(matches!(service.create(&coach, bad).await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_drafts_are_hidden_until_published() {
        let ctx = TestContext::new();
        let patient = ctx.info(&ctx.user("patient@example.com", Role::Patient).await);
        let coach = ctx.info(&ctx.user("coach@example.com", Role::Coach).await);
        let service = &ctx.services.wellness;
        let item = service.create(&coach, article("Hydration")).await.unwrap();

        assert!(matches!(service.get(&patient, &item.id).await, Err(ServiceError::NotFound(_))));
        assert!(service.list(&patient, Default::default()).await.unwrap().is_empty());
        let mine = WellnessQuery {
            mine: Some(true),
            ..Default::default()
        };
        assert_eq!(service.list(&coach, mine).await.unwrap().len(), 1);

        let published = service.publish(&coach, &item.id).await.unwrap();
        assert!(published.published_at.is_some());
        assert_eq!(service.get(&patient, &item.id).await.unwrap().id, item.id);

        let query = WellnessQuery {
            search: Some("kalahari".to_string()),
            ..Default::default()
        };
        assert_eq!(service.list(&patient, query).await.unwrap().len(), 1);

        service.unpublish(&coach, &item.id).await.unwrap();
        assert!(matches!(service.get(&patient, &item.id).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_only_author_or_admin_modifies() {
        let ctx = TestContext::new();
        let author = ctx.info(&ctx.user("coach@example.com", Role::Coach).await);
        let other = ctx.info(&ctx.user("coach2@example.com", Role::Coach).await);
        let admin = ctx.info(&ctx.user("admin@example.com", Role::Admin).await);
        let service = &ctx.services.wellness;
        let item = service.create(&author, article("Sleep")).await.unwrap();
        service.publish(&author, &item.id).await.unwrap();

        let update = UpdateWellnessRequest {
            title: Some("Better sleep".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            service.update(&other, &item.id, update.clone()).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert_eq!(service.update(&admin, &item.id, update).await.unwrap().title, "Better sleep");

        assert!(matches!(service.delete(&other, &item.id).await, Err(ServiceError::Forbidden(_))));
        service.delete(&author, &item.id).await.unwrap();
        assert!(matches!(service.get(&admin, &item.id).await, Err(ServiceError::NotFound(_))));
    }
}
