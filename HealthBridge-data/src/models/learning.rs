use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

/// Coursework set by an educator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct Assignment {
    pub id: String,
    pub educator_id: String,
    pub title: String,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub max_score: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub educator_id: String,
    pub title: String,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub max_score: i64,
}

/// A student's answer to an assignment. One per student and assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct Submission {
    pub id: String,
    pub assignment_id: String,
    pub student_id: String,
    pub content: String,
    pub attachment_url: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub is_late: bool,
    pub score: Option<i64>,
    pub feedback: Option<String>,
    pub graded_at: Option<DateTime<Utc>>,
    pub graded_by: Option<String>,
}

impl Submission {
    pub fn is_graded(&self) -> bool {
        self.graded_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub assignment_id: String,
    pub student_id: String,
    pub content: String,
    pub attachment_url: Option<String>,
    pub is_late: bool,
}
