use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use std::collections::HashMap;
use tracing::debug;

use super::errors::RepositoryError;
use super::{json_column, new_id};
use crate::database::DatabasePool;
use crate::models::{NewSurvey, Survey, SurveyResponse, SurveyStatus};

const SURVEY_COLUMNS: &str = "id, created_by, title, description, questions, status, created_at, updated_at";

const RESPONSE_COLUMNS: &str = "id, survey_id, respondent_id, answers, submitted_at";

/// Repository trait for surveys and responses
#[async_trait]
pub trait SurveyRepository: Send + Sync {
    /// Insert a survey in `draft`
    async fn create(&self, survey: NewSurvey) -> Result<Survey, RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Survey>, RepositoryError>;

    async fn list(&self, status: Option<SurveyStatus>) -> Result<Vec<Survey>, RepositoryError>;

    async fn set_status(&self, id: &str, status: SurveyStatus) -> Result<Survey, RepositoryError>;

    /// Record a response. A second response by the same user is a `Conflict`.
    async fn create_response(
        &self,
        survey_id: &str,
        respondent_id: &str,
        answers: HashMap<String, serde_json::Value>,
    ) -> Result<SurveyResponse, RepositoryError>;

    async fn list_responses(&self, survey_id: &str) -> Result<Vec<SurveyResponse>, RepositoryError>;
}

#[derive(Debug, Clone)]
pub struct SqliteSurveyRepository {
    pool: DatabasePool,
}

impl SqliteSurveyRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn map_survey(row: &Row<'_>) -> rusqlite::Result<Survey> {
        Ok(Survey {
            id: row.get(0)?,
            created_by: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            questions: json_column(row, 4)?,
            status: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn map_response(row: &Row<'_>) -> rusqlite::Result<SurveyResponse> {
        Ok(SurveyResponse {
            id: row.get(0)?,
            survey_id: row.get(1)?,
            respondent_id: row.get(2)?,
            answers: json_column(row, 3)?,
            submitted_at: row.get(4)?,
        })
    }
}

#[async_trait]
impl SurveyRepository for SqliteSurveyRepository {
    async fn create(&self, survey: NewSurvey) -> Result<Survey, RepositoryError> {
        let now = Utc::now();
        let record = Survey {
            id: new_id(),
            created_by: survey.created_by,
            title: survey.title,
            description: survey.description,
            questions: survey.questions,
            status: SurveyStatus::Draft,
            created_at: now,
            updated_at: now,
        };
        let questions = serde_json::to_string(&record.questions)?;

        debug!("Inserting survey {} with {} questions", record.id, record.questions.len());
        let conn = self.pool.get()?;
        conn.execute(
            &format!(
                "INSERT INTO surveys ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                SURVEY_COLUMNS
            ),
            params![
                record.id,
                record.created_by,
                record.title,
                record.description,
                questions,
                record.status,
                record.created_at,
                record.updated_at,
            ],
        )?;

        Ok(record)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Survey>, RepositoryError> {
        let conn = self.pool.get()?;
        let survey = conn
            .query_row(
                &format!("SELECT {} FROM surveys WHERE id = ?1", SURVEY_COLUMNS),
                params![id],
                Self::map_survey,
            )
            .optional()?;
        Ok(survey)
    }

    async fn list(&self, status: Option<SurveyStatus>) -> Result<Vec<Survey>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM surveys WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at DESC",
            SURVEY_COLUMNS
        ))?;
        let surveys = stmt
            .query_map(params![status], Self::map_survey)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(surveys)
    }

    async fn set_status(&self, id: &str, status: SurveyStatus) -> Result<Survey, RepositoryError> {
        let now = Utc::now();
        let changed = {
            let conn = self.pool.get()?;
            conn.execute(
                "UPDATE surveys SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status, now, id],
            )?
        };

        if changed == 0 {
            return Err(RepositoryError::not_found("survey", id));
        }
        self.find_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("survey", id))
    }

    async fn create_response(
        &self,
        survey_id: &str,
        respondent_id: &str,
        answers: HashMap<String, serde_json::Value>,
    ) -> Result<SurveyResponse, RepositoryError> {
        let record = SurveyResponse {
            id: new_id(),
            survey_id: survey_id.to_string(),
            respondent_id: respondent_id.to_string(),
            answers,
            submitted_at: Utc::now(),
        };
        let answers = serde_json::to_string(&record.answers)?;

        let conn = self.pool.get()?;
        conn.execute(
            &format!(
                "INSERT INTO survey_responses ({}) VALUES (?1, ?2, ?3, ?4, ?5)",
                RESPONSE_COLUMNS
            ),
            params![
                record.id,
                record.survey_id,
                record.respondent_id,
                answers,
                record.submitted_at,
            ],
        )
        .map_err(|e| match RepositoryError::from(e) {
            RepositoryError::Conflict(_) => {
                RepositoryError::Conflict("survey already answered by this user".to_string())
            }
            other => other,
        })?;

        Ok(record)
    }

    async fn list_responses(&self, survey_id: &str) -> Result<Vec<SurveyResponse>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM survey_responses WHERE survey_id = ?1 ORDER BY submitted_at ASC",
            RESPONSE_COLUMNS
        ))?;
        let responses = stmt
            .query_map(params![survey_id], Self::map_response)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QuestionType, Role, SurveyQuestion};
    use crate::repository::test_support;
    use serde_json::json;

    #[tokio::test]
    async fn test_questions_and_answers_round_trip_as_json() {
        let pool = test_support::pool();
        let researcher = test_support::user(&pool, "research@example.com", Role::Researcher).await;
        let patient = test_support::user(&pool, "patient@example.com", Role::Patient).await;
        let repo = SqliteSurveyRepository::new(pool);

        let survey = repo
            .create(NewSurvey {
                created_by: researcher.id.clone(),
                title: "Clinic access".to_string(),
                description: None,
                questions: vec![SurveyQuestion {
                    id: "distance".to_string(),
                    prompt: "How far is your nearest clinic?".to_string(),
                    question_type: QuestionType::SingleChoice,
                    options: vec!["<5km".to_string(), "5-20km".to_string(), ">20km".to_string()],
                    required: true,
                }],
            })
            .await
            .unwrap();
        assert_eq!(survey.status, SurveyStatus::Draft);

        let active = repo.set_status(&survey.id, SurveyStatus::Active).await.unwrap();
        assert_eq!(active.status, SurveyStatus::Active);
        assert_eq!(active.questions[0].options.len(), 3);
        assert_eq!(repo.list(Some(SurveyStatus::Active)).await.unwrap().len(), 1);

        let mut answers = HashMap::new();
        answers.insert("distance".to_string(), json!(">20km"));
        repo.create_response(&survey.id, &patient.id, answers.clone()).await.unwrap();

        let again = repo.create_response(&survey.id, &patient.id, answers).await;
        assert!(matches!(again, Err(RepositoryError::Conflict(_))));

        let responses = repo.list_responses(&survey.id).await.unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].answers["distance"], json!(">20km"));

        assert!(matches!(
            repo.set_status("missing", SurveyStatus::Closed).await,
            Err(RepositoryError::NotFound(_))
        ));
    }
}
