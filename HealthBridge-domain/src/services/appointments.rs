use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::access::ensure_appointment;
use crate::auth::UserInfo;
use crate::entities::{
    AppointmentListQuery, AppointmentPage, BookAppointmentRequest, RescheduleRequest, DEFAULT_DURATION_MINUTES,
};
use crate::errors::ServiceError;
use health_bridge_data::models::{
    Appointment, AppointmentFilter, AppointmentStatus, NewAppointment, Role,
};
use health_bridge_data::repository::{AppointmentRepository, InvoiceRepository, RepositoryError, UserRepository};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Booking, listing and the appointment state machine
#[derive(Clone)]
pub struct AppointmentService {
    appointments: Arc<dyn AppointmentRepository>,
    users: Arc<dyn UserRepository>,
    invoices: Arc<dyn InvoiceRepository>,
}

/// Which side of the appointment must perform a transition
enum Actor {
    Provider,
    Participant,
}

fn transition_rule(from: AppointmentStatus, to: AppointmentStatus) -> Option<Actor> {
    use AppointmentStatus::*;
    match (from, to) {
        (Scheduled, Confirmed) => Some(Actor::Provider),
        (Scheduled, Cancelled) | (Confirmed, Cancelled) => Some(Actor::Participant),
        (Confirmed, Completed) | (Confirmed, NoShow) => Some(Actor::Provider),
        _ => None,
    }
}

impl AppointmentService {
    pub fn new(
        appointments: Arc<dyn AppointmentRepository>,
        users: Arc<dyn UserRepository>,
        invoices: Arc<dyn InvoiceRepository>,
    ) -> Self {
        Self {
            appointments,
            users,
            invoices,
        }
    }

    async fn ensure_active(&self, id: &str, role: Role, field: &str) -> Result<(), ServiceError> {
        match self.users.find_by_id(id).await? {
            Some(user) if user.is_active && user.role == role => Ok(()),
            _ => Err(ServiceError::Validation(format!(
                "{} does not refer to an active {}",
                field, role
            ))),
        }
    }

    fn ensure_future(start: DateTime<Utc>) -> Result<(), ServiceError> {
        if start <= Utc::now() {
            return Err(ServiceError::Validation("scheduled_at must be in the future".to_string()));
        }
        Ok(())
    }

    /// Resolve who the appointment is for, based on who is booking
    fn resolve_patient(&self, actor: &UserInfo, request: &BookAppointmentRequest) -> Result<String, ServiceError> {
        match actor.role {
            Role::Patient => match &request.patient_id {
                Some(id) if id != &actor.user_id => Err(ServiceError::Forbidden(
                    "Patients can only book appointments for themselves".to_string(),
                )),
                _ => Ok(actor.user_id.clone()),
            },
            Role::Provider if request.provider_id != actor.user_id => Err(ServiceError::Forbidden(
                "Providers can only book appointments with themselves".to_string(),
            )),
            Role::Provider | Role::Admin => request
                .patient_id
                .clone()
                .ok_or_else(|| ServiceError::Validation("patient_id is required when booking for a patient".to_string())),
            _ => Err(ServiceError::Forbidden("Your role cannot book appointments".to_string())),
        }
    }

    #[instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn book(&self, actor: &UserInfo, request: &BookAppointmentRequest) -> Result<Appointment, ServiceError> {
        request.validate()?;
        let patient_id = self.resolve_patient(actor, request)?;

        self.ensure_active(&request.provider_id, Role::Provider, "provider_id").await?;
        self.ensure_active(&patient_id, Role::Patient, "patient_id").await?;

        let duration = request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        Self::ensure_future(request.scheduled_at)?;

        // the repository refuses the insert if the provider's slot is taken
        let appointment = self
            .appointments
            .create_if_free(NewAppointment {
                patient_id,
                provider_id: request.provider_id.clone(),
                scheduled_at: request.scheduled_at,
                duration_minutes: duration,
                mode: request.mode.unwrap_or_default(),
                reason: request.reason.clone(),
            })
            .await?;

        info!("Appointment {} booked with provider {}", appointment.id, appointment.provider_id);
        Ok(appointment)
    }

    pub async fn list(&self, actor: &UserInfo, query: AppointmentListQuery) -> Result<AppointmentPage, ServiceError> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0);

        let mut filter = AppointmentFilter {
            status: query.status,
            from: query.from,
            to: query.to,
            limit,
            offset,
            ..Default::default()
        };
        match actor.role {
            Role::Patient => filter.patient_id = Some(actor.user_id.clone()),
            Role::Provider => filter.provider_id = Some(actor.user_id.clone()),
            Role::Admin => {}
            _ => return Err(ServiceError::Forbidden("Your role has no appointments".to_string())),
        }

        let (appointments, total) = self.appointments.list(&filter).await?;
        Ok(AppointmentPage {
            appointments,
            total,
            limit,
            offset,
        })
    }

    pub async fn get(&self, actor: &UserInfo, id: &str) -> Result<Appointment, ServiceError> {
        let appointment = self
            .appointments
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Appointment", id))?;
        ensure_appointment(actor, &appointment)?;
        Ok(appointment)
    }

    /// Move an appointment through its lifecycle.
    ///
    /// Providers confirm, complete and mark no-shows; either participant may
    /// cancel. Admins may do everything. Cancelling also cancels the
    /// appointment's unpaid invoice.
    #[instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn update_status(
        &self,
        actor: &UserInfo,
        id: &str,
        status: AppointmentStatus,
    ) -> Result<Appointment, ServiceError> {
        let appointment = self.get(actor, id).await?;

        let rule = transition_rule(appointment.status, status).ok_or_else(|| {
            ServiceError::Conflict(format!(
                "Cannot change appointment from {} to {}",
                appointment.status, status
            ))
        })?;
        if matches!(rule, Actor::Provider) && !(actor.is_admin() || actor.user_id == appointment.provider_id) {
            return Err(ServiceError::Forbidden(format!(
                "Only the provider can mark an appointment {}",
                status
            )));
        }

        let updated = self.appointments.update_status(id, status).await?;

        if status == AppointmentStatus::Cancelled {
            if let Some(invoice) = self.invoices.find_open_for_appointment(id).await? {
                match self.invoices.cancel(&invoice.id).await {
                    Ok(_) => info!("Cancelled invoice {} with appointment {}", invoice.id, id),
                    Err(RepositoryError::Conflict(state)) => {
                        warn!("Appointment {} cancelled but invoice {} stays open: {}", id, invoice.id, state)
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        Ok(updated)
    }

    #[instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn reschedule(
        &self,
        actor: &UserInfo,
        id: &str,
        request: RescheduleRequest,
    ) -> Result<Appointment, ServiceError> {
        request.validate()?;
        let appointment = self.get(actor, id).await?;
        if !appointment.status.is_open() {
            return Err(ServiceError::Conflict(format!(
                "A {} appointment cannot be rescheduled",
                appointment.status
            )));
        }

        let duration = request.duration_minutes.unwrap_or(appointment.duration_minutes);
        Self::ensure_future(request.scheduled_at)?;

        Ok(self.appointments.reschedule(id, request.scheduled_at, duration).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestContext;
    use chrono::Duration;
    use health_bridge_data::models::User;

    fn request(provider: &User, at: DateTime<Utc>) -> BookAppointmentRequest {
        BookAppointmentRequest {
            provider_id: provider.id.clone(),
            patient_id: None,
            scheduled_at: at,
            duration_minutes: None,
            mode: None,
            reason: Some("Persistent cough".to_string()),
            payment: None,
        }
    }

    fn tomorrow() -> DateTime<Utc> {
        Utc::now() + Duration::days(1)
    }

    #[tokio::test]
    async fn test_patient_books_for_self() {
        let ctx = TestContext::new();
        let patient = ctx.user("aina@example.com", Role::Patient).await;
        let provider = ctx.user("dr.iipumbu@example.com", Role::Provider).await;

        let appt = ctx
            .services
            .appointments
            .book(&ctx.info(&patient), &request(&provider, tomorrow()))
            .await
            .unwrap();
        assert_eq!(appt.patient_id, patient.id);
        assert_eq!(appt.duration_minutes, DEFAULT_DURATION_MINUTES);
        assert_eq!(appt.status, AppointmentStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_booking_validation() {
        let ctx = TestContext::new();
        let patient = ctx.user("aina@example.com", Role::Patient).await;
        let other = ctx.user("kauna@example.com", Role::Patient).await;
        let provider = ctx.user("dr.iipumbu@example.com", Role::Provider).await;
        let service = &ctx.services.appointments;

        let past = request(&provider, Utc::now() - Duration::hours(1));
        assert!(matches!(service.book(&ctx.info(&patient), &past).await, Err(ServiceError::Validation(_))));

        let mut too_long = request(&provider, tomorrow());
        too_long.duration_minutes = Some(300);
        assert!(matches!(service.book(&ctx.info(&patient), &too_long).await, Err(ServiceError::Validation(_))));

        let mut for_other = request(&provider, tomorrow());
        for_other.patient_id = Some(other.id.clone());
        assert!(matches!(service.book(&ctx.info(&patient), &for_other).await, Err(ServiceError::Forbidden(_))));

        // a patient is not a provider
        let wrong_provider = request(&other, tomorrow());
        assert!(matches!(
            service.book(&ctx.info(&patient), &wrong_provider).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_overlapping_booking_conflicts() {
        let ctx = TestContext::new();
        let first = ctx.user("aina@example.com", Role::Patient).await;
        let second = ctx.user("kauna@example.com", Role::Patient).await;
        let provider = ctx.user("dr.iipumbu@example.com", Role::Provider).await;
        let service = &ctx.services.appointments;
        let at = tomorrow();

        service.book(&ctx.info(&first), &request(&provider, at)).await.unwrap();

        let clash = request(&provider, at + Duration::minutes(15));
        assert!(matches!(service.book(&ctx.info(&second), &clash).await, Err(ServiceError::Conflict(_))));

        let after = request(&provider, at + Duration::minutes(30));
        assert!(service.book(&ctx.info(&second), &after).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_simultaneous_bookings_for_one_slot() {
        let ctx = TestContext::new();
        let first = ctx.user("aina@example.com", Role::Patient).await;
        let second = ctx.user("kauna@example.com", Role::Patient).await;
        let provider = ctx.user("dr.iipumbu@example.com", Role::Provider).await;
        let at = tomorrow();

        let handles: Vec<_> = [first, second]
            .iter()
            .map(|patient| {
                let service = ctx.services.appointments.clone();
                let actor = ctx.info(patient);
                let booking = request(&provider, at);
                tokio::spawn(async move { service.book(&actor, &booking).await })
            })
            .collect();

        let mut booked = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => booked += 1,
                Err(ServiceError::Conflict(_)) => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!((booked, conflicts), (1, 1));

        let page = ctx
            .services
            .appointments
            .list(&ctx.info(&provider), Default::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_provider_books_on_behalf_of_patient() {
        let ctx = TestContext::new();
        let patient = ctx.user("aina@example.com", Role::Patient).await;
        let provider = ctx.user("dr.iipumbu@example.com", Role::Provider).await;
        let service = &ctx.services.appointments;

        let missing_patient = request(&provider, tomorrow());
        assert!(matches!(
            service.book(&ctx.info(&provider), &missing_patient).await,
            Err(ServiceError::Validation(_))
        ));

        let mut on_behalf = request(&provider, tomorrow());
        on_behalf.patient_id = Some(patient.id.clone());
        let appt = service.book(&ctx.info(&provider), &on_behalf).await.unwrap();
        assert_eq!(appt.patient_id, patient.id);
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let ctx = TestContext::new();
        let patient = ctx.user("aina@example.com", Role::Patient).await;
        let provider = ctx.user("dr.iipumbu@example.com", Role::Provider).await;
        let service = &ctx.services.appointments;
        let appt = service.book(&ctx.info(&patient), &request(&provider, tomorrow())).await.unwrap();

        // patients cannot confirm
        assert!(matches!(
            service.update_status(&ctx.info(&patient), &appt.id, AppointmentStatus::Confirmed).await,
            Err(ServiceError::Forbidden(_))
        ));
        // cannot complete before confirming
        assert!(matches!(
            service.update_status(&ctx.info(&provider), &appt.id, AppointmentStatus::Completed).await,
            Err(ServiceError::Conflict(_))
        ));

        service
            .update_status(&ctx.info(&provider), &appt.id, AppointmentStatus::Confirmed)
            .await
            .unwrap();
        let done = service
            .update_status(&ctx.info(&provider), &appt.id, AppointmentStatus::Completed)
            .await
            .unwrap();
        assert_eq!(done.status, AppointmentStatus::Completed);

        assert!(matches!(
            service.update_status(&ctx.info(&patient), &appt.id, AppointmentStatus::Cancelled).await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_listing_is_scoped_by_role() {
        let ctx = TestContext::new();
        let patient = ctx.user("aina@example.com", Role::Patient).await;
        let other = ctx.user("kauna@example.com", Role::Patient).await;
        let provider = ctx.user("dr.iipumbu@example.com", Role::Provider).await;
        let admin = ctx.user("admin@example.com", Role::Admin).await;
        let coach = ctx.user("coach@example.com", Role::Coach).await;
        let service = &ctx.services.appointments;

        service.book(&ctx.info(&patient), &request(&provider, tomorrow())).await.unwrap();
        service
            .book(&ctx.info(&other), &request(&provider, tomorrow() + Duration::hours(2)))
            .await
            .unwrap();

        let own = service.list(&ctx.info(&patient), Default::default()).await.unwrap();
        assert_eq!(own.total, 1);
        let provider_view = service.list(&ctx.info(&provider), Default::default()).await.unwrap();
        assert_eq!(provider_view.total, 2);
        let paged = service
            .list(&ctx.info(&admin), AppointmentListQuery { limit: Some(1), ..Default::default() })
            .await
            .unwrap();
        assert_eq!((paged.appointments.len(), paged.total), (1, 2));
        assert!(matches!(
            service.list(&ctx.info(&coach), Default::default()).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.get(&ctx.info(&other), &own.appointments[0].id).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_reschedule() {
        let ctx = TestContext::new();
        let patient = ctx.user("aina@example.com", Role::Patient).await;
        let provider = ctx.user("dr.iipumbu@example.com", Role::Provider).await;
        let service = &ctx.services.appointments;
        let appt = service.book(&ctx.info(&patient), &request(&provider, tomorrow())).await.unwrap();
        service
            .update_status(&ctx.info(&provider), &appt.id, AppointmentStatus::Confirmed)
            .await
            .unwrap();

        // overlapping only with itself is fine
        let moved = service
            .reschedule(
                &ctx.info(&patient),
                &appt.id,
                RescheduleRequest { scheduled_at: appt.scheduled_at + Duration::minutes(10), duration_minutes: None },
            )
            .await
            .unwrap();
        assert_eq!(moved.status, AppointmentStatus::Scheduled);

        service
            .update_status(&ctx.info(&patient), &appt.id, AppointmentStatus::Cancelled)
            .await
            .unwrap();
        assert!(matches!(
            service
                .reschedule(
                    &ctx.info(&patient),
                    &appt.id,
                    RescheduleRequest { scheduled_at: tomorrow(), duration_minutes: None }
                )
                .await,
            Err(ServiceError::Conflict(_))
        ));
    }
}
