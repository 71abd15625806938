use std::sync::Arc;

use tracing::{instrument, warn};

use crate::auth::UserInfo;
use crate::entities::{BookAppointmentRequest, BookingOutcome, PaymentStatus};
use crate::errors::ServiceError;
use crate::services::appointments::AppointmentService;
use crate::services::billing::{BillingService, PaymentAttempt};

pub const PAYMENT_FAILED_MESSAGE: &str =
    "Your appointment is booked, but the payment could not be processed. You can retry payment from your billing page.";

/// Books an appointment and, when payment details are given, charges for it.
///
/// Only the booking leg can fail the request. Once the appointment exists a
/// payment problem is reported in the outcome and the patient can retry from
/// billing.
#[derive(Clone)]
pub struct BookingService {
    appointments: Arc<AppointmentService>,
    billing: Arc<BillingService>,
}

impl BookingService {
    pub fn new(appointments: Arc<AppointmentService>, billing: Arc<BillingService>) -> Self {
        Self { appointments, billing }
    }

    #[instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn book_with_payment(
        &self,
        actor: &UserInfo,
        request: &BookAppointmentRequest,
    ) -> Result<BookingOutcome, ServiceError> {
        let appointment = self.appointments.book(actor, request).await?;

        let Some(payment) = &request.payment else {
            return Ok(BookingOutcome {
                appointment,
                invoice: None,
                payment_status: PaymentStatus::NotRequested,
                message: None,
            });
        };

        let invoice = match self
            .billing
            .create_for_appointment(&appointment, None, None, None, None)
            .await
        {
            Ok(invoice) => invoice,
            Err(e) => {
                warn!("Could not invoice appointment {}: {}", appointment.id, e);
                return Ok(BookingOutcome {
                    appointment,
                    invoice: None,
                    payment_status: PaymentStatus::Failed,
                    message: Some(PAYMENT_FAILED_MESSAGE.to_string()),
                });
            }
        };

        let attempt = self
            .billing
            .attempt_payment(&invoice, &payment.method, payment.account_reference.clone())
            .await;

        let outcome = match attempt {
            Ok(PaymentAttempt::Paid(invoice)) => BookingOutcome {
                appointment,
                invoice: Some(invoice),
                payment_status: PaymentStatus::Paid,
                message: None,
            },
            Ok(PaymentAttempt::Failed { invoice, .. }) => BookingOutcome {
                appointment,
                invoice: Some(invoice),
                payment_status: PaymentStatus::Failed,
                message: Some(PAYMENT_FAILED_MESSAGE.to_string()),
            },
            Err(e) => {
                warn!("Payment for appointment {} errored: {}", appointment.id, e);
                BookingOutcome {
                    appointment,
                    invoice: Some(invoice),
                    payment_status: PaymentStatus::Failed,
                    message: Some(PAYMENT_FAILED_MESSAGE.to_string()),
                }
            }
        };
        Ok(outcome)
    }
}
