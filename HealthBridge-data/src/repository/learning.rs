use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::errors::RepositoryError;
use super::new_id;
use crate::database::DatabasePool;
use crate::models::{Assignment, NewAssignment, NewSubmission, Submission};

const ASSIGNMENT_COLUMNS: &str =
    "id, educator_id, title, description, due_date, max_score, created_at, updated_at";

const SUBMISSION_COLUMNS: &str = "id, assignment_id, student_id, content, attachment_url, submitted_at, \
     is_late, score, feedback, graded_at, graded_by";

/// Repository trait for assignments and their submissions
#[async_trait]
pub trait LearningRepository: Send + Sync {
    async fn create_assignment(&self, assignment: NewAssignment) -> Result<Assignment, RepositoryError>;

    async fn find_assignment(&self, id: &str) -> Result<Option<Assignment>, RepositoryError>;

    /// All assignments, or only those set by one educator
    async fn list_assignments(&self, educator_id: Option<&str>) -> Result<Vec<Assignment>, RepositoryError>;

    async fn update_assignment(&self, assignment: &Assignment) -> Result<Assignment, RepositoryError>;

    /// Insert a submission. A second one for the same student and assignment
    /// is a `Conflict`.
    async fn create_submission(&self, submission: NewSubmission) -> Result<Submission, RepositoryError>;

    async fn find_submission(&self, id: &str) -> Result<Option<Submission>, RepositoryError>;

    async fn find_submission_for(
        &self,
        assignment_id: &str,
        student_id: &str,
    ) -> Result<Option<Submission>, RepositoryError>;

    /// Persist content and grading fields of an existing submission
    async fn update_submission(&self, submission: &Submission) -> Result<Submission, RepositoryError>;

    async fn list_submissions_for_assignment(&self, assignment_id: &str) -> Result<Vec<Submission>, RepositoryError>;

    async fn list_submissions_for_student(&self, student_id: &str) -> Result<Vec<Submission>, RepositoryError>;
}

#[derive(Debug, Clone)]
pub struct SqliteLearningRepository {
    pool: DatabasePool,
}

impl SqliteLearningRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    fn map_assignment(row: &Row<'_>) -> rusqlite::Result<Assignment> {
        Ok(Assignment {
            id: row.get(0)?,
            educator_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            due_date: row.get(4)?,
            max_score: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn map_submission(row: &Row<'_>) -> rusqlite::Result<Submission> {
        Ok(Submission {
            id: row.get(0)?,
            assignment_id: row.get(1)?,
            student_id: row.get(2)?,
            content: row.get(3)?,
            attachment_url: row.get(4)?,
            submitted_at: row.get(5)?,
            is_late: row.get(6)?,
            score: row.get(7)?,
            feedback: row.get(8)?,
            graded_at: row.get(9)?,
            graded_by: row.get(10)?,
        })
    }

    fn query_submissions(&self, condition: &str, value: &str) -> Result<Vec<Submission>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM submissions WHERE {} = ?1 ORDER BY submitted_at DESC",
            SUBMISSION_COLUMNS, condition
        ))?;
        let submissions = stmt
            .query_map(params![value], Self::map_submission)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(submissions)
    }
}

#[async_trait]
impl LearningRepository for SqliteLearningRepository {
    async fn create_assignment(&self, assignment: NewAssignment) -> Result<Assignment, RepositoryError> {
        let now = Utc::now();
        let record = Assignment {
            id: new_id(),
            educator_id: assignment.educator_id,
            title: assignment.title,
            description: assignment.description,
            due_date: assignment.due_date,
            max_score: assignment.max_score,
            created_at: now,
            updated_at: now,
        };

        debug!("Inserting assignment {}", record.id);
        let conn = self.pool.get()?;
        conn.execute(
            &format!(
                "INSERT INTO assignments ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                ASSIGNMENT_COLUMNS
            ),
            params![
                record.id,
                record.educator_id,
                record.title,
                record.description,
                record.due_date,
                record.max_score,
                record.created_at,
                record.updated_at,
            ],
        )?;

        Ok(record)
    }

    async fn find_assignment(&self, id: &str) -> Result<Option<Assignment>, RepositoryError> {
        let conn = self.pool.get()?;
        let assignment = conn
            .query_row(
                &format!("SELECT {} FROM assignments WHERE id = ?1", ASSIGNMENT_COLUMNS),
                params![id],
                Self::map_assignment,
            )
            .optional()?;
        Ok(assignment)
    }

    async fn list_assignments(&self, educator_id: Option<&str>) -> Result<Vec<Assignment>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM assignments WHERE (?1 IS NULL OR educator_id = ?1) ORDER BY due_date ASC",
            ASSIGNMENT_COLUMNS
        ))?;
        let assignments = stmt
            .query_map(params![educator_id], Self::map_assignment)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(assignments)
    }

    async fn update_assignment(&self, assignment: &Assignment) -> Result<Assignment, RepositoryError> {
        let mut record = assignment.clone();
        record.updated_at = Utc::now();

        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE assignments
             SET title = ?1, description = ?2, due_date = ?3, max_score = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                record.title,
                record.description,
                record.due_date,
                record.max_score,
                record.updated_at,
                record.id,
            ],
        )?;

        if changed == 0 {
            return Err(RepositoryError::not_found("assignment", &record.id));
        }
        Ok(record)
    }

    async fn create_submission(&self, submission: NewSubmission) -> Result<Submission, RepositoryError> {
        let record = Submission {
            id: new_id(),
            assignment_id: submission.assignment_id,
            student_id: submission.student_id,
            content: submission.content,
            attachment_url: submission.attachment_url,
            submitted_at: Utc::now(),
            is_late: submission.is_late,
            score: None,
            feedback: None,
            graded_at: None,
            graded_by: None,
        };

        debug!("Inserting submission {} for assignment {}", record.id, record.assignment_id);
        let conn = self.pool.get()?;
        conn.execute(
            &format!(
                "INSERT INTO submissions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                SUBMISSION_COLUMNS
            ),
            params![
                record.id,
                record.assignment_id,
                record.student_id,
                record.content,
                record.attachment_url,
                record.submitted_at,
                record.is_late,
                record.score,
                record.feedback,
                record.graded_at,
                record.graded_by,
            ],
        )?;

        Ok(record)
    }

    async fn find_submission(&self, id: &str) -> Result<Option<Submission>, RepositoryError> {
        let conn = self.pool.get()?;
        let submission = conn
            .query_row(
                &format!("SELECT {} FROM submissions WHERE id = ?1", SUBMISSION_COLUMNS),
                params![id],
                Self::map_submission,
            )
            .optional()?;
        Ok(submission)
    }

    async fn find_submission_for(
        &self,
        assignment_id: &str,
        student_id: &str,
    ) -> Result<Option<Submission>, RepositoryError> {
        let conn = self.pool.get()?;
        let submission = conn
            .query_row(
                &format!(
                    "SELECT {} FROM submissions WHERE assignment_id = ?1 AND student_id = ?2",
                    SUBMISSION_COLUMNS
                ),
                params![assignment_id, student_id],
                Self::map_submission,
            )
            .optional()?;
        Ok(submission)
    }

    async fn update_submission(&self, submission: &Submission) -> Result<Submission, RepositoryError> {
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE submissions
             SET content = ?1, attachment_url = ?2, submitted_at = ?3, is_late = ?4,
                 score = ?5, feedback = ?6, graded_at = ?7, graded_by = ?8
             WHERE id = ?9",
            params![
                submission.content,
                submission.attachment_url,
                submission.submitted_at,
                submission.is_late,
                submission.score,
                submission.feedback,
                submission.graded_at,
                submission.graded_by,
                submission.id,
            ],
        )?;

        if changed == 0 {
            return Err(RepositoryError::not_found("submission", &submission.id));
        }
        Ok(submission.clone())
    }

    async fn list_submissions_for_assignment(&self, assignment_id: &str) -> Result<Vec<Submission>, RepositoryError> {
        self.query_submissions("assignment_id", assignment_id)
    }

    async fn list_submissions_for_student(&self, student_id: &str) -> Result<Vec<Submission>, RepositoryError> {
        self.query_submissions("student_id", student_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::repository::test_support;
    use chrono::Duration;

    #[tokio::test]
    async fn test_assignment_and_submission_flow() {
        let pool = test_support::pool();
        let educator = test_support::user(&pool, "educator@example.com", Role::Educator).await;
        let student = test_support::user(&pool, "student@example.com", Role::Student).await;
        let repo = SqliteLearningRepository::new(pool);

        let assignment = repo
            .create_assignment(NewAssignment {
                educator_id: educator.id.clone(),
                title: "Community health essay".to_string(),
                description: "500 words".to_string(),
                due_date: Utc::now() + Duration::days(7),
                max_score: 100,
            })
            .await
            .unwrap();

        assert_eq!(repo.list_assignments(Some(&educator.id)).await.unwrap().len(), 1);
        assert!(repo.list_assignments(Some(&student.id)).await.unwrap().is_empty());
        assert_eq!(repo.list_assignments(None).await.unwrap().len(), 1);

        let submission = repo
            .create_submission(NewSubmission {
                assignment_id: assignment.id.clone(),
                student_id: student.id.clone(),
                content: "Draft".to_string(),
                attachment_url: None,
                is_late: false,
            })
            .await
            .unwrap();

        let duplicate = repo
            .create_submission(NewSubmission {
                assignment_id: assignment.id.clone(),
                student_id: student.id.clone(),
                content: "Again".to_string(),
                attachment_url: None,
                is_late: false,
            })
            .await;
        assert!(matches!(duplicate, Err(RepositoryError::Conflict(_))));

        let mut graded = submission.clone();
        graded.score = Some(88);
        graded.feedback = Some("Well argued".to_string());
        graded.graded_at = Some(Utc::now());
        graded.graded_by = Some(educator.id.clone());
        repo.update_submission(&graded).await.unwrap();

        let stored = repo
            .find_submission_for(&assignment.id, &student.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_graded());
        assert_eq!(stored.score, Some(88));

        assert_eq!(repo.list_submissions_for_assignment(&assignment.id).await.unwrap().len(), 1);
        assert_eq!(repo.list_submissions_for_student(&student.id).await.unwrap().len(), 1);
    }
}
