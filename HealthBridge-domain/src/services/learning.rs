use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};
use validator::Validate;

use crate::access::{ensure_role, ensure_submission};
use crate::auth::UserInfo;
use crate::entities::{
    CreateAssignmentRequest, GradeSubmissionRequest, SubmitAssignmentRequest, UpdateAssignmentRequest, DEFAULT_MAX_SCORE,
};
use crate::errors::ServiceError;
use health_bridge_data::models::{Assignment, NewAssignment, NewSubmission, Role, Submission};
use health_bridge_data::repository::LearningRepository;

const TEACHING_ROLES: [Role; 2] = [Role::Educator, Role::Admin];

/// Assignments and student submissions
#[derive(Clone)]
pub struct LearningService {
    learning: Arc<dyn LearningRepository>,
}

impl LearningService {
    pub fn new(learning: Arc<dyn LearningRepository>) -> Self {
        Self { learning }
    }

    async fn assignment(&self, id: &str) -> Result<Assignment, ServiceError> {
        self.learning
            .find_assignment(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Assignment", id))
    }

    fn ensure_owner(actor: &UserInfo, assignment: &Assignment) -> Result<(), ServiceError> {
        if actor.is_admin() || assignment.educator_id == actor.user_id {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "Only the educator who set this assignment can do that".to_string(),
            ))
        }
    }

    #[instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn create_assignment(
        &self,
        actor: &UserInfo,
        request: CreateAssignmentRequest,
    ) -> Result<Assignment, ServiceError> {
        ensure_role(actor, &TEACHING_ROLES)?;
        request.validate()?;

        let assignment = self
            .learning
            .create_assignment(NewAssignment {
                educator_id: actor.user_id.clone(),
                title: request.title,
                description: request.description,
                due_date: request.due_date,
                max_score: request.max_score.unwrap_or(DEFAULT_MAX_SCORE),
            })
            .await?;
        info!("Assignment {} created", assignment.id);
        Ok(assignment)
    }

    pub async fn update_assignment(
        &self,
        actor: &UserInfo,
        id: &str,
        request: UpdateAssignmentRequest,
    ) -> Result<Assignment, ServiceError> {
        ensure_role(actor, &TEACHING_ROLES)?;
        request.validate()?;
        let mut assignment = self.assignment(id).await?;
        Self::ensure_owner(actor, &assignment)?;

        if let Some(title) = request.title {
            assignment.title = title;
        }
        if let Some(description) = request.description {
            assignment.description = description;
        }
        if let Some(due_date) = request.due_date {
            assignment.due_date = due_date;
        }
        if let Some(max_score) = request.max_score {
            assignment.max_score = max_score;
        }
        Ok(self.learning.update_assignment(&assignment).await?)
    }

    /// Educators see the assignments they set; everyone else sees all
    pub async fn list_assignments(&self, actor: &UserInfo) -> Result<Vec<Assignment>, ServiceError> {
        let educator = (actor.role == Role::Educator).then_some(actor.user_id.as_str());
        Ok(self.learning.list_assignments(educator).await?)
    }

    /// Same visibility as `list_assignments`
    pub async fn get_assignment(&self, actor: &UserInfo, id: &str) -> Result<Assignment, ServiceError> {
        let assignment = self.assignment(id).await?;
        if actor.role == Role::Educator {
            Self::ensure_owner(actor, &assignment)?;
        }
        Ok(assignment)
    }

    /// Submit or resubmit. Resubmitting replaces the content until the
    /// submission has been graded.
    #[instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn submit(
        &self,
        actor: &UserInfo,
        assignment_id: &str,
        request: SubmitAssignmentRequest,
    ) -> Result<Submission, ServiceError> {
        ensure_role(actor, &[Role::Student])?;
        request.validate()?;
        let assignment = self.assignment(assignment_id).await?;

        let now = Utc::now();
        let is_late = now > assignment.due_date;

        match self.learning.find_submission_for(assignment_id, &actor.user_id).await? {
            Some(existing) if existing.is_graded() => Err(ServiceError::Conflict(
                "This submission has already been graded".to_string(),
            )),
            Some(mut existing) => {
                existing.content = request.content;
                existing.attachment_url = request.attachment_url;
                existing.submitted_at = now;
                existing.is_late = is_late;
                Ok(self.learning.update_submission(&existing).await?)
            }
            None => {
                let submission = self
                    .learning
                    .create_submission(NewSubmission {
                        assignment_id: assignment_id.to_string(),
                        student_id: actor.user_id.clone(),
                        content: request.content,
                        attachment_url: request.attachment_url,
                        is_late,
                    })
                    .await?;
                info!(
                    "Submission {} for assignment {} (late: {})",
                    submission.id, assignment_id, is_late
                );
                Ok(submission)
            }
        }
    }

    #[instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn grade(
        &self,
        actor: &UserInfo,
        submission_id: &str,
        request: GradeSubmissionRequest,
    ) -> Result<Submission, ServiceError> {
        request.validate()?;
        let mut submission = self
            .learning
            .find_submission(submission_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Submission", submission_id))?;
        let assignment = self.assignment(&submission.assignment_id).await?;
        Self::ensure_owner(actor, &assignment)?;

        if request.score < 0 || request.score > assignment.max_score {
            return Err(ServiceError::Validation(format!(
                "score: must be between 0 and {}",
                assignment.max_score
            )));
        }

        submission.score = Some(request.score);
        submission.feedback = request.feedback;
        submission.graded_at = Some(Utc::now());
        submission.graded_by = Some(actor.user_id.clone());
        Ok(self.learning.update_submission(&submission).await?)
    }

    pub async fn list_my_submissions(&self, actor: &UserInfo) -> Result<Vec<Submission>, ServiceError> {
        Ok(self.learning.list_submissions_for_student(&actor.user_id).await?)
    }

    pub async fn list_submissions_for_assignment(
        &self,
        actor: &UserInfo,
        assignment_id: &str,
    ) -> Result<Vec<Submission>, ServiceError> {
        let assignment = self.assignment(assignment_id).await?;
        Self::ensure_owner(actor, &assignment)?;
        Ok(self.learning.list_submissions_for_assignment(assignment_id).await?)
    }

    pub async fn get_submission(&self, actor: &UserInfo, id: &str) -> Result<Submission, ServiceError> {
        let submission = self
            .learning
            .find_submission(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Submission", id))?;
        let assignment = self.assignment(&submission.assignment_id).await?;
        ensure_submission(actor, &submission, &assignment)?;
        Ok(submission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;
    use chrono::Duration;

    fn assignment_due_in(days: i64) -> CreateAssignmentRequest {
        CreateAssignmentRequest {
            title: "Malaria prevention brief".to_string(),
            description: "Summarise prevention measures for the Zambezi region".to_string(),
            due_date: Utc::now() + Duration::days(days),
            max_score: None,
        }
    }

    fn answer(content: &str) -> SubmitAssignmentRequest {
        SubmitAssignmentRequest {
            content: content.to_string(),
            attachment_url: None,
        }
    }

    #[tokio::test]
    async fn test_assignment_management_roles() {
        let ctx = TestContext::new();
        let educator = ctx.info(&ctx.user("educator@example.com", Role::Educator).await);
        let other = ctx.info(&ctx.user("educator2@example.com", Role::Educator).await);
        let student = ctx.info(&ctx.user("student@example.com", Role::Student).await);
        let service = &ctx.services.learning;

        assert!(matches!(
            service.create_assignment(&student, assignment_due_in(7)).await,
            Err(ServiceError::Forbidden(_))
        ));
        let assignment = service.create_assignment(&educator, assignment_due_in(7)).await.unwrap();
        assert_eq!(assignment.max_score, DEFAULT_MAX_SCORE);

        let update = UpdateAssignmentRequest {
            max_score: Some(50),
            ..Default::default()
        };
        assert!(matches!(
            service.update_assignment(&other, &assignment.id, update.clone()).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert_eq!(
            service.update_assignment(&educator, &assignment.id, update).await.unwrap().max_score,
            50
        );

        assert_eq!(service.list_assignments(&student).await.unwrap().len(), 1);
        assert!(service.list_assignments(&other).await.unwrap().is_empty());

        assert_eq!(service.get_assignment(&student, &assignment.id).await.unwrap().max_score, 50);
        assert!(service.get_assignment(&educator, &assignment.id).await.is_ok());
        assert!(matches!(
            service.get_assignment(&other, &assignment.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.get_assignment(&student, "missing").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_submission_lifecycle() {
        let ctx = TestContext::new();
        let educator = ctx.info(&ctx.user("educator@example.com", Role::Educator).await);
        let student = ctx.info(&ctx.user("student@example.com", Role::Student).await);
        let service = &ctx.services.learning;
        let assignment = service.create_assignment(&educator, assignment_due_in(7)).await.unwrap();

        let first = service.submit(&student, &assignment.id, answer("Draft")).await.unwrap();
        assert!(!first.is_late);
        let second = service.submit(&student, &assignment.id, answer("Final")).await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.content, "Final");

        let too_high = GradeSubmissionRequest {
            score: 101,
            feedback: None,
        };
        assert!(matches!(
            service.grade(&educator, &first.id, too_high).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service
                .grade(&student, &first.id, GradeSubmissionRequest { score: 90, feedback: None })
                .await,
            Err(ServiceError::Forbidden(_))
        ));

        let graded = service
            .grade(
                &educator,
                &first.id,
                GradeSubmissionRequest {
                    score: 88,
                    feedback: Some("Clear and well sourced".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(graded.score, Some(88));
        assert!(graded.graded_at.is_some());

        assert!(matches!(
            service.submit(&student, &assignment.id, answer("Too late")).await,
            Err(ServiceError::Conflict(_))
        ));
        assert_eq!(service.list_my_submissions(&student).await.unwrap().len(), 1);
        assert_eq!(
            service
                .list_submissions_for_assignment(&educator, &assignment.id)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_late_submission_and_access() {
        let ctx = TestContext::new();
        let educator = ctx.info(&ctx.user("educator@example.com", Role::Educator).await);
        let student = ctx.info(&ctx.user("student@example.com", Role::Student).await);
        let classmate = ctx.info(&ctx.user("classmate@example.com", Role::Student).await);
        let service = &ctx.services.learning;
        let assignment = service.create_assignment(&educator, assignment_due_in(-1)).await.unwrap();

        let submission = service.submit(&student, &assignment.id, answer("Sorry")).await.unwrap();
        assert!(submission.is_late);

        assert!(service.get_submission(&educator, &submission.id).await.is_ok());
        assert!(matches!(
            service.get_submission(&classmate, &submission.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.submit(&educator, &assignment.id, answer("x")).await,
            Err(ServiceError::Forbidden(_))
        ));
    }
}
