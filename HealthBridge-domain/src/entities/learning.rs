use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

pub const DEFAULT_MAX_SCORE: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct CreateAssignmentRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 20000, message = "Description must be between 1 and 20000 characters"))]
    pub description: String,

    pub due_date: DateTime<Utc>,

    /// Defaults to 100
    #[validate(range(min = 1, max = 1000, message = "Max score must be between 1 and 1000"))]
    pub max_score: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct UpdateAssignmentRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 20000, message = "Description must be between 1 and 20000 characters"))]
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    #[validate(range(min = 1, max = 1000, message = "Max score must be between 1 and 1000"))]
    pub max_score: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct SubmitAssignmentRequest {
    #[validate(length(min = 1, max = 50000, message = "Content must be between 1 and 50000 characters"))]
    pub content: String,

    #[validate(url(message = "Attachment URL must be a valid URL"))]
    pub attachment_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct GradeSubmissionRequest {
    /// Between 0 and the assignment's max score
    pub score: i64,

    #[validate(length(max = 5000, message = "Feedback cannot exceed 5000 characters"))]
    pub feedback: Option<String>,
}
