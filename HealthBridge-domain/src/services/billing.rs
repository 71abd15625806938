use std::env;
use std::sync::Arc;

use tracing::{info, instrument, warn};
use validator::Validate;

use crate::access::ensure_invoice;
use crate::auth::UserInfo;
use crate::entities::{CreateInvoiceRequest, InvoiceQuery, PayInvoiceRequest};
use crate::errors::ServiceError;
use crate::services::payments::{ChargeRequest, PaymentGateway};
use health_bridge_data::models::{Appointment, AppointmentStatus, Invoice, InvoiceFilter, NewInvoice, Role};
use health_bridge_data::repository::{AppointmentRepository, InvoiceRepository, UserRepository};

/// Billing defaults
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Fee used when the provider has none configured
    pub default_fee_cents: i64,
    pub currency: String,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            default_fee_cents: 35_000,
            currency: "NAD".to_string(),
        }
    }
}

impl BillingConfig {
    /// Load from `DEFAULT_CONSULTATION_FEE_CENTS` and `BILLING_CURRENCY`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_fee_cents: env::var("DEFAULT_CONSULTATION_FEE_CENTS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.default_fee_cents),
            currency: env::var("BILLING_CURRENCY").unwrap_or(defaults.currency),
        }
    }
}

/// Result of charging an invoice. A declined charge is an expected outcome,
/// not an error.
#[derive(Debug, Clone)]
pub enum PaymentAttempt {
    Paid(Invoice),
    Failed { invoice: Invoice, reason: String },
}

#[derive(Clone)]
pub struct BillingService {
    invoices: Arc<dyn InvoiceRepository>,
    appointments: Arc<dyn AppointmentRepository>,
    users: Arc<dyn UserRepository>,
    gateway: Arc<dyn PaymentGateway>,
    config: BillingConfig,
}

impl BillingService {
    pub fn new(
        invoices: Arc<dyn InvoiceRepository>,
        appointments: Arc<dyn AppointmentRepository>,
        users: Arc<dyn UserRepository>,
        gateway: Arc<dyn PaymentGateway>,
        config: BillingConfig,
    ) -> Self {
        Self {
            invoices,
            appointments,
            users,
            gateway,
            config,
        }
    }

    async fn provider_fee(&self, provider_id: &str) -> Result<i64, ServiceError> {
        let fee = self
            .users
            .find_by_id(provider_id)
            .await?
            .and_then(|p| p.consultation_fee_cents)
            .filter(|fee| *fee > 0);
        Ok(fee.unwrap_or(self.config.default_fee_cents))
    }

    /// Create the invoice for an appointment. At most one live invoice per appointment.
    pub async fn create_for_appointment(
        &self,
        appointment: &Appointment,
        amount_cents: Option<i64>,
        currency: Option<String>,
        description: Option<String>,
        due_date: Option<chrono::NaiveDate>,
    ) -> Result<Invoice, ServiceError> {
        if appointment.status == AppointmentStatus::Cancelled {
            return Err(ServiceError::Conflict("Cannot bill a cancelled appointment".to_string()));
        }
        if self.invoices.find_open_for_appointment(&appointment.id).await?.is_some() {
            return Err(ServiceError::Conflict("This appointment already has an invoice".to_string()));
        }

        let amount_cents = match amount_cents {
            Some(amount) => amount,
            None => self.provider_fee(&appointment.provider_id).await?,
        };

        let invoice = self
            .invoices
            .create(NewInvoice {
                appointment_id: appointment.id.clone(),
                patient_id: appointment.patient_id.clone(),
                provider_id: appointment.provider_id.clone(),
                amount_cents,
                currency: currency.unwrap_or_else(|| self.config.currency.clone()),
                description: description.or_else(|| Some("Consultation fee".to_string())),
                due_date: due_date.or_else(|| Some(appointment.scheduled_at.date_naive())),
            })
            .await?;

        info!("Invoice {} created for appointment {}", invoice.id, appointment.id);
        Ok(invoice)
    }

    #[instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn create_invoice(&self, actor: &UserInfo, request: CreateInvoiceRequest) -> Result<Invoice, ServiceError> {
        request.validate()?;

        let appointment = self
            .appointments
            .find_by_id(&request.appointment_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Appointment", &request.appointment_id))?;
        if !(actor.is_admin() || actor.user_id == appointment.provider_id) {
            return Err(ServiceError::Forbidden(
                "Only the appointment's provider can issue an invoice".to_string(),
            ));
        }

        self.create_for_appointment(
            &appointment,
            request.amount_cents,
            request.currency.map(|c| c.to_uppercase()),
            request.description,
            request.due_date,
        )
        .await
    }

    pub async fn list(&self, actor: &UserInfo, query: InvoiceQuery) -> Result<Vec<Invoice>, ServiceError> {
        let mut filter = InvoiceFilter {
            status: query.status,
            ..Default::default()
        };
        match actor.role {
            Role::Patient => filter.patient_id = Some(actor.user_id.clone()),
            Role::Provider => filter.provider_id = Some(actor.user_id.clone()),
            Role::Admin => {}
            _ => return Err(ServiceError::Forbidden("Your role has no invoices".to_string())),
        }
        Ok(self.invoices.list(&filter).await?)
    }

    pub async fn get(&self, actor: &UserInfo, id: &str) -> Result<Invoice, ServiceError> {
        let invoice = self
            .invoices
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Invoice", id))?;
        ensure_invoice(actor, &invoice)?;
        Ok(invoice)
    }

    /// Charge an invoice through the gateway and record the outcome.
    ///
    /// The invoice is claimed as `processing` before the gateway is called,
    /// so concurrent attempts and cancellations get `Conflict` instead of a
    /// second charge.
    pub async fn attempt_payment(
        &self,
        invoice: &Invoice,
        method: &str,
        account_reference: Option<String>,
    ) -> Result<PaymentAttempt, ServiceError> {
        let invoice = self.invoices.claim_for_payment(&invoice.id).await?;

        let charge = ChargeRequest {
            invoice_id: invoice.id.clone(),
            amount_cents: invoice.amount_cents,
            currency: invoice.currency.clone(),
            method: method.to_string(),
            account_reference,
        };

        match self.gateway.charge(&charge).await {
            Ok(receipt) => {
                let paid = self.invoices.mark_paid(&invoice.id, method, &receipt.reference).await?;
                info!("Invoice {} paid ({})", paid.id, receipt.reference);
                Ok(PaymentAttempt::Paid(paid))
            }
            Err(e) => {
                let reason = e.to_string();
                warn!("Payment for invoice {} failed: {}", invoice.id, reason);
                let failed = self.invoices.mark_failed(&invoice.id, method, &reason).await?;
                Ok(PaymentAttempt::Failed { invoice: failed, reason })
            }
        }
    }

    /// Pay an invoice. Only its patient (or an admin) may pay; a declined
    /// charge leaves the invoice `failed` and returns `PaymentFailed`.
    #[instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn pay(&self, actor: &UserInfo, id: &str, request: PayInvoiceRequest) -> Result<Invoice, ServiceError> {
        request.validate()?;
        let invoice = self.get(actor, id).await?;
        if !(actor.is_admin() || actor.user_id == invoice.patient_id) {
            return Err(ServiceError::Forbidden("Only the patient can pay this invoice".to_string()));
        }

        match self
            .attempt_payment(&invoice, &request.method, request.account_reference)
            .await?
        {
            PaymentAttempt::Paid(invoice) => Ok(invoice),
            PaymentAttempt::Failed { reason, .. } => Err(ServiceError::PaymentFailed(reason)),
        }
    }

    pub async fn cancel(&self, actor: &UserInfo, id: &str) -> Result<Invoice, ServiceError> {
        let invoice = self.get(actor, id).await?;
        if !(actor.is_admin() || actor.user_id == invoice.provider_id) {
            return Err(ServiceError::Forbidden("Only the provider can cancel this invoice".to_string()));
        }
        Ok(self.invoices.cancel(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::payments::{PaymentError, PaymentReceipt};
    use health_bridge_data::models::InvoiceStatus;
    use crate::testing::TestContext;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn setup(ctx: &TestContext) -> (UserInfo, UserInfo, Appointment) {
        let patient = ctx.user("hilma@example.com", Role::Patient).await;
        let provider = ctx.provider_with_fee("dr.nghipondoka@example.com", 42_000).await;
        let appointment = ctx.appointment_between(&patient, &provider).await;
        (ctx.info(&patient), ctx.info(&provider), appointment)
    }

    fn invoice_request(appointment: &Appointment) -> CreateInvoiceRequest {
        CreateInvoiceRequest {
            appointment_id: appointment.id.clone(),
            amount_cents: None,
            currency: None,
            description: None,
            due_date: None,
        }
    }

    fn pay_with(method: &str) -> PayInvoiceRequest {
        PayInvoiceRequest {
            method: method.to_string(),
            account_reference: None,
        }
    }

    #[tokio::test]
    async fn test_provider_invoices_with_own_fee() {
        let ctx = TestContext::new();
        let (patient, provider, appointment) = setup(&ctx).await;
        let billing = &ctx.services.billing;

        assert!(matches!(
            billing.create_invoice(&patient, invoice_request(&appointment)).await,
            Err(ServiceError::Forbidden(_))
        ));

        let invoice = billing.create_invoice(&provider, invoice_request(&appointment)).await.unwrap();
        assert_eq!(invoice.amount_cents, 42_000);
        assert_eq!(invoice.currency, "NAD");
        assert_eq!(invoice.status, InvoiceStatus::Pending);

        assert!(matches!(
            billing.create_invoice(&provider, invoice_request(&appointment)).await,
            Err(ServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_pay_success_and_failure() {
        let ctx = TestContext::new();
        let (patient, provider, appointment) = setup(&ctx).await;
        let billing = &ctx.services.billing;
        let invoice = billing.create_invoice(&provider, invoice_request(&appointment)).await.unwrap();

        assert!(matches!(
            billing.pay(&provider, &invoice.id, pay_with("card")).await,
            Err(ServiceError::Forbidden(_))
        ));

        match billing.pay(&patient, &invoice.id, pay_with("bitcoin")).await {
            Err(ServiceError::PaymentFailed(reason)) => assert!(reason.contains("bitcoin")),
            other => panic!("unexpected result: {:?}", other),
        }
        let failed = billing.get(&patient, &invoice.id).await.unwrap();
        assert_eq!(failed.status, InvoiceStatus::Failed);
        assert!(failed.last_payment_error.is_some());

        // failed invoices can be retried
        let paid = billing.pay(&patient, &invoice.id, pay_with("mobile_money")).await.unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert!(paid.paid_at.is_some());
        assert!(paid.payment_reference.is_some());

        assert!(matches!(
            billing.pay(&patient, &invoice.id, pay_with("card")).await,
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(billing.cancel(&provider, &invoice.id).await, Err(ServiceError::Conflict(_))));
    }

    /// Counts charges and holds each one long enough for a rival request to arrive
    #[derive(Default)]
    struct SlowGateway {
        charges: AtomicUsize,
    }

    #[async_trait]
    impl PaymentGateway for SlowGateway {
        async fn charge(&self, _request: &ChargeRequest) -> Result<PaymentReceipt, PaymentError> {
            let n = self.charges.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(PaymentReceipt {
                reference: format!("SLOW-{}", n),
            })
        }
    }

    #[tokio::test]
    async fn test_concurrent_payments_charge_once() {
        let gateway = Arc::new(SlowGateway::default());
        let ctx = TestContext::with_gateway(gateway.clone());
        let (patient, provider, appointment) = setup(&ctx).await;
        let billing = &ctx.services.billing;
        let invoice = billing.create_invoice(&provider, invoice_request(&appointment)).await.unwrap();

        let (first, second) = tokio::join!(
            billing.pay(&patient, &invoice.id, pay_with("card")),
            billing.pay(&patient, &invoice.id, pay_with("card"))
        );

        assert_eq!(gateway.charges.load(Ordering::SeqCst), 1);
        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(r, Err(ServiceError::Conflict(_)))));
        assert_eq!(billing.get(&patient, &invoice.id).await.unwrap().status, InvoiceStatus::Paid);
    }

    #[tokio::test]
    async fn test_cancel_during_charge_conflicts() {
        let gateway = Arc::new(SlowGateway::default());
        let ctx = TestContext::with_gateway(gateway.clone());
        let (patient, provider, appointment) = setup(&ctx).await;
        let billing = &ctx.services.billing;
        let invoice = billing.create_invoice(&provider, invoice_request(&appointment)).await.unwrap();

        let cancel_later = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            billing.cancel(&provider, &invoice.id).await
        };
        let (paid, cancelled) = tokio::join!(billing.pay(&patient, &invoice.id, pay_with("card")), cancel_later);

        assert_eq!(paid.unwrap().status, InvoiceStatus::Paid);
        assert!(matches!(cancelled, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_listing_and_cancel() {
        let ctx = TestContext::new();
        let (patient, provider, appointment) = setup(&ctx).await;
        let stranger = ctx.info(&ctx.user("other@example.com", Role::Patient).await);
        let billing = &ctx.services.billing;
        let invoice = billing.create_invoice(&provider, invoice_request(&appointment)).await.unwrap();

        assert_eq!(billing.list(&patient, Default::default()).await.unwrap().len(), 1);
        assert!(billing.list(&stranger, Default::default()).await.unwrap().is_empty());
        assert!(matches!(billing.get(&stranger, &invoice.id).await, Err(ServiceError::Forbidden(_))));

        assert!(matches!(billing.cancel(&patient, &invoice.id).await, Err(ServiceError::Forbidden(_))));
        let cancelled = billing.cancel(&provider, &invoice.id).await.unwrap();
        assert_eq!(cancelled.status, InvoiceStatus::Cancelled);

        let pending = billing
            .list(&provider, InvoiceQuery { status: Some(InvoiceStatus::Pending) })
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_cancelling_appointment_cancels_unpaid_invoice() {
        let ctx = TestContext::new();
        let (patient, provider, appointment) = setup(&ctx).await;
        let invoice = ctx
            .services
            .billing
            .create_invoice(&provider, invoice_request(&appointment))
            .await
            .unwrap();

        ctx.services
            .appointments
            .update_status(&patient, &appointment.id, AppointmentStatus::Cancelled)
            .await
            .unwrap();

        let after = ctx.services.billing.get(&patient, &invoice.id).await.unwrap();
        assert_eq!(after.status, InvoiceStatus::Cancelled);
    }
}
