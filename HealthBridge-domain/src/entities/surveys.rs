use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use validator::Validate;

#[cfg(feature = "with-api")]
use utoipa::{IntoParams, ToSchema};

use health_bridge_data::models::{QuestionType, SurveyQuestion, SurveyStatus};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct CreateSurveyRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[validate(length(max = 2000, message = "Description cannot exceed 2000 characters"))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 100, message = "A survey needs between 1 and 100 questions"))]
    pub questions: Vec<SurveyQuestion>,
}

/// Answers keyed by question id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct SubmitSurveyResponseRequest {
    #[cfg_attr(feature = "with-api", schema(value_type = Object))]
    pub answers: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema, IntoParams))]
#[cfg_attr(feature = "with-api", into_params(parameter_in = Query))]
pub struct SurveyQuery {
    pub status: Option<SurveyStatus>,
}

/// Aggregate answers for one question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct QuestionResult {
    pub question_id: String,
    pub prompt: String,
    pub question_type: QuestionType,
    /// Responses that answered this question
    pub answered: usize,
    /// Choice questions: how often each option was picked
    pub option_counts: BTreeMap<String, usize>,
    /// Rating questions: mean rating
    pub average_rating: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct SurveyResults {
    pub survey_id: String,
    pub title: String,
    pub status: SurveyStatus,
    pub responses: usize,
    pub questions: Vec<QuestionResult>,
}
