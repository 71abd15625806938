use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

/// Survey lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum SurveyStatus {
    Draft,
    Active,
    Closed,
}

text_enum!(SurveyStatus {
    Draft => "draft",
    Active => "active",
    Closed => "closed",
});

/// Kind of answer a question expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    /// Free text
    Text,
    /// Exactly one of the options
    SingleChoice,
    /// Any subset of the options
    MultipleChoice,
    /// Integer from 1 to 5
    Rating,
}

text_enum!(QuestionType {
    Text => "text",
    SingleChoice => "single_choice",
    MultipleChoice => "multiple_choice",
    Rating => "rating",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct SurveyQuestion {
    /// Identifier unique within the survey, used as the answer key
    pub id: String,
    pub prompt: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub required: bool,
}

/// Research survey. Questions are stored as a JSON column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct Survey {
    pub id: String,
    pub created_by: String,
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<SurveyQuestion>,
    pub status: SurveyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSurvey {
    pub created_by: String,
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<SurveyQuestion>,
}

/// One user's answers, keyed by question id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct SurveyResponse {
    pub id: String,
    pub survey_id: String,
    pub respondent_id: String,
    #[cfg_attr(feature = "with-api", schema(value_type = Object))]
    pub answers: HashMap<String, serde_json::Value>,
    pub submitted_at: DateTime<Utc>,
}
