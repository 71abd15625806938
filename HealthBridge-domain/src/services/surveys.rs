use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument};
use validator::Validate;

use crate::access::ensure_role;
use crate::auth::UserInfo;
use crate::entities::{CreateSurveyRequest, QuestionResult, SubmitSurveyResponseRequest, SurveyQuery, SurveyResults};
use crate::errors::ServiceError;
use health_bridge_data::models::{
    NewSurvey, QuestionType, Role, Survey, SurveyQuestion, SurveyResponse, SurveyStatus,
};
use health_bridge_data::repository::SurveyRepository;

const RESEARCH_ROLES: [Role; 2] = [Role::Researcher, Role::Admin];

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

fn validate_questions(questions: &[SurveyQuestion]) -> Result<(), ServiceError> {
    let mut seen = HashSet::new();
    for question in questions {
        if question.id.trim().is_empty() || question.prompt.trim().is_empty() {
            return Err(ServiceError::Validation("questions: id and prompt are required".to_string()));
        }
        if !seen.insert(question.id.as_str()) {
            return Err(ServiceError::Validation(format!("questions: duplicate id '{}'", question.id)));
        }
        let is_choice = matches!(question.question_type, QuestionType::SingleChoice | QuestionType::MultipleChoice);
        if is_choice && question.options.len() < 2 {
            return Err(ServiceError::Validation(format!(
                "questions: '{}' needs at least two options",
                question.id
            )));
        }
    }
    Ok(())
}

/// Check one answer against its question's type
fn validate_answer(question: &SurveyQuestion, answer: &Value) -> Result<(), String> {
    let in_options = |choice: &str| question.options.iter().any(|o| o == choice);
    match question.question_type {
        QuestionType::Text => match answer.as_str() {
            Some(text) if !text.trim().is_empty() => Ok(()),
            _ => Err("expected a non-empty text answer".to_string()),
        },
        QuestionType::SingleChoice => match answer.as_str() {
            Some(choice) if in_options(choice) => Ok(()),
            _ => Err("expected one of the listed options".to_string()),
        },
        QuestionType::MultipleChoice => {
            let choices = answer.as_array().ok_or("expected a list of options")?;
            if choices.is_empty() {
                return Err("expected at least one option".to_string());
            }
            if choices.iter().all(|c| c.as_str().map_or(false, in_options)) {
                Ok(())
            } else {
                Err("every choice must be one of the listed options".to_string())
            }
        }
        QuestionType::Rating => match answer.as_i64() {
            Some(rating) if (MIN_RATING..=MAX_RATING).contains(&rating) => Ok(()),
            _ => Err(format!("expected a whole number from {} to {}", MIN_RATING, MAX_RATING)),
        },
    }
}

fn validate_answers(survey: &Survey, answers: &HashMap<String, Value>) -> Result<(), ServiceError> {
    for key in answers.keys() {
        if !survey.questions.iter().any(|q| &q.id == key) {
            return Err(ServiceError::Validation(format!("answers: unknown question '{}'", key)));
        }
    }
    for question in &survey.questions {
        match answers.get(&question.id).filter(|a| !a.is_null()) {
            Some(answer) => validate_answer(question, answer)
                .map_err(|reason| ServiceError::Validation(format!("{}: {}", question.id, reason)))?,
            None if question.required => {
                return Err(ServiceError::Validation(format!("{}: an answer is required", question.id)))
            }
            None => {}
        }
    }
    Ok(())
}

fn aggregate(question: &SurveyQuestion, responses: &[SurveyResponse]) -> QuestionResult {
    let mut option_counts: BTreeMap<String, usize> = match question.question_type {
        QuestionType::SingleChoice | QuestionType::MultipleChoice => {
            question.options.iter().map(|o| (o.clone(), 0)).collect()
        }
        _ => BTreeMap::new(),
    };
    let mut answered = 0;
    let mut ratings = Vec::new();

    for answer in responses
        .iter()
        .filter_map(|r| r.answers.get(&question.id))
        .filter(|a| !a.is_null())
    {
        answered += 1;
        match question.question_type {
            QuestionType::SingleChoice => {
                if let Some(choice) = answer.as_str() {
                    *option_counts.entry(choice.to_string()).or_insert(0) += 1;
                }
            }
            QuestionType::MultipleChoice => {
                for choice in answer.as_array().into_iter().flatten().filter_map(Value::as_str) {
                    *option_counts.entry(choice.to_string()).or_insert(0) += 1;
                }
            }
            QuestionType::Rating => ratings.extend(answer.as_i64()),
            QuestionType::Text => {}
        }
    }

    let average_rating = if ratings.is_empty() {
        None
    } else {
        Some(ratings.iter().sum::<i64>() as f64 / ratings.len() as f64)
    };

    QuestionResult {
        question_id: question.id.clone(),
        prompt: question.prompt.clone(),
        question_type: question.question_type,
        answered,
        option_counts,
        average_rating,
    }
}

/// Research surveys, responses and result aggregation
#[derive(Clone)]
pub struct SurveyService {
    surveys: Arc<dyn SurveyRepository>,
}

impl SurveyService {
    pub fn new(surveys: Arc<dyn SurveyRepository>) -> Self {
        Self { surveys }
    }

    fn is_researcher(actor: &UserInfo) -> bool {
        actor.has_any_role(&RESEARCH_ROLES)
    }

    fn ensure_manager(actor: &UserInfo, survey: &Survey) -> Result<(), ServiceError> {
        if actor.is_admin() || survey.created_by == actor.user_id {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "Only the survey's creator or an admin can do that".to_string(),
            ))
        }
    }

    #[instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn create(&self, actor: &UserInfo, request: CreateSurveyRequest) -> Result<Survey, ServiceError> {
        ensure_role(actor, &RESEARCH_ROLES)?;
        request.validate()?;
        validate_questions(&request.questions)?;

        let survey = self
            .surveys
            .create(NewSurvey {
                created_by: actor.user_id.clone(),
                title: request.title,
                description: request.description,
                questions: request.questions,
            })
            .await?;
        info!("Survey {} created with {} questions", survey.id, survey.questions.len());
        Ok(survey)
    }

    /// Researchers and admins see every survey, others only active ones
    pub async fn list(&self, actor: &UserInfo, query: SurveyQuery) -> Result<Vec<Survey>, ServiceError> {
        let status = if Self::is_researcher(actor) {
            query.status
        } else {
            Some(SurveyStatus::Active)
        };
        Ok(self.surveys.list(status).await?)
    }

    pub async fn get(&self, actor: &UserInfo, id: &str) -> Result<Survey, ServiceError> {
        match self.surveys.find_by_id(id).await? {
            Some(survey) if survey.status == SurveyStatus::Active || Self::is_researcher(actor) => Ok(survey),
            _ => Err(ServiceError::not_found("Survey", id)),
        }
    }

    async fn transition(
        &self,
        actor: &UserInfo,
        id: &str,
        from: SurveyStatus,
        to: SurveyStatus,
    ) -> Result<Survey, ServiceError> {
        let survey = self.get(actor, id).await?;
        Self::ensure_manager(actor, &survey)?;
        if survey.status != from {
            return Err(ServiceError::Conflict(format!(
                "Survey is {}; only {} surveys can become {}",
                survey.status, from, to
            )));
        }
        let updated = self.surveys.set_status(id, to).await?;
        info!("Survey {} is now {}", id, to);
        Ok(updated)
    }

    pub async fn activate(&self, actor: &UserInfo, id: &str) -> Result<Survey, ServiceError> {
        self.transition(actor, id, SurveyStatus::Draft, SurveyStatus::Active).await
    }

    pub async fn close(&self, actor: &UserInfo, id: &str) -> Result<Survey, ServiceError> {
        self.transition(actor, id, SurveyStatus::Active, SurveyStatus::Closed).await
    }

    #[instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn respond(
        &self,
        actor: &UserInfo,
        survey_id: &str,
        request: SubmitSurveyResponseRequest,
    ) -> Result<SurveyResponse, ServiceError> {
        let survey = self.get(actor, survey_id).await?;
        if survey.status != SurveyStatus::Active {
            return Err(ServiceError::Conflict("This survey is not accepting responses".to_string()));
        }
        validate_answers(&survey, &request.answers)?;

        let response = self
            .surveys
            .create_response(survey_id, &actor.user_id, request.answers)
            .await?;
        Ok(response)
    }

    pub async fn results(&self, actor: &UserInfo, survey_id: &str) -> Result<SurveyResults, ServiceError> {
        let survey = self.get(actor, survey_id).await?;
        Self::ensure_manager(actor, &survey)?;

        let responses = self.surveys.list_responses(survey_id).await?;
        let questions = survey.questions.iter().map(|q| aggregate(q, &responses)).collect();

        Ok(SurveyResults {
            survey_id: survey.id,
            title: survey.title,
            status: survey.status,
            responses: responses.len(),
            questions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;
    use serde_json::json;

    fn question(id: &str, question_type: QuestionType, options: &[&str], required: bool) -> SurveyQuestion {
        SurveyQuestion {
            id: id.to_string(),
            prompt: format!("Question {}", id),
            question_type,
            options: options.iter().map(|o| o.to_string()).collect(),
            required,
        }
    }

    fn clinic_survey() -> CreateSurveyRequest {
        CreateSurveyRequest {
            title: "Clinic access in Kunene".to_string(),
            description: None,
            questions: vec![
                question("distance", QuestionType::SingleChoice, &["<5km", "5-20km", ">20km"], true),
                question("transport", QuestionType::MultipleChoice, &["walk", "taxi", "donkey cart"], false),
                question("satisfaction", QuestionType::Rating, &[], true),
                question("comments", QuestionType::Text, &[], false),
            ],
        }
    }

    fn answers(pairs: Value) -> SubmitSurveyResponseRequest {
        let answers = pairs
            .as_object()
            .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        SubmitSurveyResponseRequest { answers }
    }

    #[test]
    fn test_question_validation() {
        let dup = vec![
            question("q1", QuestionType::Text, &[], false),
            question("q1", QuestionType::Rating, &[], false),
        ];
        assert!(validate_questions(&dup).is_err());
        assert!(validate_questions(&[question("q1", QuestionType::SingleChoice, &["yes"], false)]).is_err());
        assert!(validate_questions(&clinic_survey().questions).is_ok());
    }

    #[test]
    fn test_answer_validation_by_type() {
        let rating = question("r", QuestionType::Rating, &[], true);
        assert!(validate_answer(&rating, &json!(5)).is_ok());
        assert!(validate_answer(&rating, &json!(6)).is_err());
        assert!(validate_answer(&rating, &json!("5")).is_err());

        let multi = question("m", QuestionType::MultipleChoice, &["a", "b"], false);
        assert!(validate_answer(&multi, &json!(["a", "b"])).is_ok());
        assert!(validate_answer(&multi, &json!(["c"])).is_err());
        assert!(validate_answer(&multi, &json!([])).is_err());
    }

    #[tokio::test]
    async fn test_survey_lifecycle_and_results() {
        let ctx = TestContext::new();
        let researcher = ctx.info(&ctx.user("researcher@example.com", Role::Researcher).await);
        let patient = ctx.info(&ctx.user("patient@example.com", Role::Patient).await);
        let student = ctx.info(&ctx.user("student@example.com", Role::Student).await);
        let service = &ctx.services.surveys;

        assert!(matches!(service.create(&patient, clinic_survey()).await, Err(ServiceError::Forbidden(_))));
        let survey = service.create(&researcher, clinic_survey()).await.unwrap();
        assert_eq!(survey.status, SurveyStatus::Draft);

        // drafts are invisible to respondents
        assert!(matches!(service.get(&patient, &survey.id).await, Err(ServiceError::NotFound(_))));
        assert!(service.list(&patient, Default::default()).await.unwrap().is_empty());

        service.activate(&researcher, &survey.id).await.unwrap();
        assert!(matches!(service.activate(&researcher, &survey.id).await, Err(ServiceError::Conflict(_))));

        let missing_required = answers(json!({ "distance": "<5km" }));
        assert!(matches!(
            service.respond(&patient, &survey.id, missing_required).await,
            Err(ServiceError::Validation(_))
        ));

        service
            .respond(
                &patient,
                &survey.id,
                answers(json!({ "distance": ">20km", "transport": ["walk", "taxi"], "satisfaction": 2 })),
            )
            .await
            .unwrap();
        service
            .respond(
                &student,
                &survey.id,
                answers(json!({ "distance": ">20km", "satisfaction": 5, "comments": "Need a mobile clinic" })),
            )
            .await
            .unwrap();
        assert!(matches!(
            service
                .respond(&patient, &survey.id, answers(json!({ "distance": "<5km", "satisfaction": 3 })))
                .await,
            Err(ServiceError::Conflict(_))
        ));

        assert!(matches!(service.results(&patient, &survey.id).await, Err(ServiceError::Forbidden(_))));
        let results = service.results(&researcher, &survey.id).await.unwrap();
        assert_eq!(results.responses, 2);
        let distance = &results.questions[0];
        assert_eq!(distance.option_counts.get(">20km"), Some(&2));
        assert_eq!(distance.option_counts.get("<5km"), Some(&0));
        assert_eq!(results.questions[1].answered, 1);
        assert_eq!(results.questions[2].average_rating, Some(3.5));
        assert_eq!(results.questions[3].answered, 1);

        service.close(&researcher, &survey.id).await.unwrap();
        assert!(matches!(
            service
                .respond(&researcher, &survey.id, answers(json!({ "distance": "<5km", "satisfaction": 4 })))
                .await,
            Err(ServiceError::Conflict(_))
        ));
    }
}
