//! Who may see whose data.
//!
//! Role checks alone are not enough for clinical data: a provider may only
//! read a patient's records after seeing that patient. These rules are shared
//! by every service that returns patient-linked records.

use std::sync::Arc;

use tracing::debug;

use crate::auth::UserInfo;
use crate::errors::ServiceError;
use health_bridge_data::models::{Appointment, Assignment, Invoice, Role, Submission};
use health_bridge_data::repository::AppointmentRepository;

/// Relationship checks that need the database
#[derive(Clone)]
pub struct AccessControl {
    appointments: Arc<dyn AppointmentRepository>,
}

impl AccessControl {
    pub fn new(appointments: Arc<dyn AppointmentRepository>) -> Self {
        Self { appointments }
    }

    /// The patient themself, any admin, or a provider who has (or had) an
    /// appointment with the patient
    pub async fn can_access_patient_data(&self, viewer: &UserInfo, patient_id: &str) -> Result<bool, ServiceError> {
        if viewer.user_id == patient_id || viewer.is_admin() {
            return Ok(true);
        }
        if viewer.role == Role::Provider {
            let related = self.appointments.exists_between(&viewer.user_id, patient_id).await?;
            debug!(
                "Provider {} relationship with patient {}: {}",
                viewer.user_id, patient_id, related
            );
            return Ok(related);
        }
        Ok(false)
    }

    pub async fn ensure_patient_data(&self, viewer: &UserInfo, patient_id: &str) -> Result<(), ServiceError> {
        if self.can_access_patient_data(viewer, patient_id).await? {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "You do not have access to this patient's records".to_string(),
            ))
        }
    }
}

pub fn can_access_appointment(viewer: &UserInfo, appointment: &Appointment) -> bool {
    viewer.is_admin() || appointment.is_participant(&viewer.user_id)
}

pub fn can_access_invoice(viewer: &UserInfo, invoice: &Invoice) -> bool {
    viewer.is_admin() || invoice.patient_id == viewer.user_id || invoice.provider_id == viewer.user_id
}

/// The submitting student, the educator who set the assignment, or an admin
pub fn can_access_submission(viewer: &UserInfo, submission: &Submission, assignment: &Assignment) -> bool {
    viewer.is_admin() || submission.student_id == viewer.user_id || assignment.educator_id == viewer.user_id
}

pub fn ensure_appointment(viewer: &UserInfo, appointment: &Appointment) -> Result<(), ServiceError> {
    if can_access_appointment(viewer, appointment) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden("You are not part of this appointment".to_string()))
    }
}

pub fn ensure_invoice(viewer: &UserInfo, invoice: &Invoice) -> Result<(), ServiceError> {
    if can_access_invoice(viewer, invoice) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden("You do not have access to this invoice".to_string()))
    }
}

pub fn ensure_submission(viewer: &UserInfo, submission: &Submission, assignment: &Assignment) -> Result<(), ServiceError> {
    if can_access_submission(viewer, submission, assignment) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden("You do not have access to this submission".to_string()))
    }
}

/// Fail with `Forbidden` unless the caller holds one of `roles`
pub fn ensure_role(viewer: &UserInfo, roles: &[Role]) -> Result<(), ServiceError> {
    if viewer.has_any_role(roles) {
        Ok(())
    } else {
        let names: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
        Err(ServiceError::Forbidden(format!("Requires one of the roles: {}", names.join(", "))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;
    use chrono::{Duration, Utc};
    use health_bridge_data::models::{AppointmentMode, AppointmentStatus};

    fn appointment(patient: &str, provider: &str) -> Appointment {
        Appointment {
            id: "appt-1".into(),
            patient_id: patient.into(),
            provider_id: provider.into(),
            scheduled_at: Utc::now() + Duration::days(1),
            duration_minutes: 30,
            mode: AppointmentMode::Video,
            reason: None,
            status: AppointmentStatus::Scheduled,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_patient_data_relationship_rules() {
        let ctx = TestContext::new();
        let patient = ctx.user("ndapewa@example.com", Role::Patient).await;
        let seen_by = ctx.user("dr.shikongo@example.com", Role::Provider).await;
        let stranger = ctx.user("dr.amupolo@example.com", Role::Provider).await;
        let admin = ctx.user("admin@example.com", Role::Admin).await;
        let coach = ctx.user("coach@example.com", Role::Coach).await;
        ctx.appointment_between(&patient, &seen_by).await;

        let access = AccessControl::new(ctx.appointment_repo());
        assert!(access.can_access_patient_data(&ctx.info(&patient), &patient.id).await.unwrap());
        assert!(access.can_access_patient_data(&ctx.info(&seen_by), &patient.id).await.unwrap());
        assert!(access.can_access_patient_data(&ctx.info(&admin), &patient.id).await.unwrap());
        assert!(!access.can_access_patient_data(&ctx.info(&stranger), &patient.id).await.unwrap());
        assert!(!access.can_access_patient_data(&ctx.info(&coach), &patient.id).await.unwrap());

        assert!(matches!(
            access.ensure_patient_data(&ctx.info(&stranger), &patient.id).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[test]
    fn test_appointment_access() {
        let appt = appointment("patient-1", "provider-1");
        assert!(can_access_appointment(&UserInfo::new("patient-1", Role::Patient), &appt));
        assert!(can_access_appointment(&UserInfo::new("provider-1", Role::Provider), &appt));
        assert!(can_access_appointment(&UserInfo::new("root", Role::Admin), &appt));
        assert!(!can_access_appointment(&UserInfo::new("patient-2", Role::Patient), &appt));
    }

    #[test]
    fn test_submission_access() {
        let now = Utc::now();
        let assignment = Assignment {
            id: "asg-1".into(),
            educator_id: "educator-1".into(),
            title: "Community health survey".into(),
            description: "Interview five households".into(),
            due_date: now,
            max_score: 100,
            created_at: now,
            updated_at: now,
        };
        let submission = Submission {
            id: "sub-1".into(),
            assignment_id: "asg-1".into(),
            student_id: "student-1".into(),
            content: "Findings".into(),
            attachment_url: None,
            submitted_at: now,
            is_late: false,
            score: None,
            feedback: None,
            graded_at: None,
            graded_by: None,
        };

        assert!(can_access_submission(&UserInfo::new("student-1", Role::Student), &submission, &assignment));
        assert!(can_access_submission(&UserInfo::new("educator-1", Role::Educator), &submission, &assignment));
        assert!(!can_access_submission(&UserInfo::new("student-2", Role::Student), &submission, &assignment));
        assert!(!can_access_submission(&UserInfo::new("educator-2", Role::Educator), &submission, &assignment));
        assert!(ensure_submission(&UserInfo::new("root", Role::Admin), &submission, &assignment).is_ok());
    }

    #[test]
    fn test_ensure_role() {
        let coach = UserInfo::new("coach-1", Role::Coach);
        assert!(ensure_role(&coach, &[Role::Coach, Role::Admin]).is_ok());
        assert!(matches!(ensure_role(&coach, &[Role::Admin]), Err(ServiceError::Forbidden(_))));
    }
}
