use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Payment methods the platform accepts
pub const SUPPORTED_METHODS: [&str; 3] = ["card", "mobile_money", "eft"];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PaymentError {
    #[error("Unsupported payment method: {0}")]
    UnsupportedMethod(String),

    #[error("Invalid payment amount: {0}")]
    InvalidAmount(i64),

    #[error("Payment declined: {0}")]
    Declined(String),

    /// Gateway could not be reached
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),
}

/// A charge against one invoice
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub invoice_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub method: String,
    pub account_reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
    /// Gateway transaction reference
    pub reference: String,
}

/// Seam to the payment provider
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> Result<PaymentReceipt, PaymentError>;
}

/// Gateway that approves any well-formed charge without moving money
#[derive(Debug, Clone, Default)]
pub struct SimulatedPaymentGateway;

impl SimulatedPaymentGateway {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PaymentGateway for SimulatedPaymentGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<PaymentReceipt, PaymentError> {
        if !SUPPORTED_METHODS.contains(&request.method.as_str()) {
            debug!("Rejecting charge with method {}", request.method);
            return Err(PaymentError::UnsupportedMethod(request.method.clone()));
        }
        if request.amount_cents <= 0 {
            return Err(PaymentError::InvalidAmount(request.amount_cents));
        }

        let reference = format!("SIM-{}", Uuid::new_v4().simple()).to_uppercase();
        info!(
            "Simulated {} charge of {} {} for invoice {} ({})",
            request.method, request.amount_cents, request.currency, request.invoice_id, reference
        );
        Ok(PaymentReceipt { reference })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn charge(method: &str, amount_cents: i64) -> ChargeRequest {
        ChargeRequest {
            invoice_id: "inv-1".to_string(),
            amount_cents,
            currency: "NAD".to_string(),
            method: method.to_string(),
            account_reference: None,
        }
    }

    #[tokio::test]
    async fn test_simulated_gateway_accepts_supported_methods() {
        let gateway = SimulatedPaymentGateway::new();
        for method in SUPPORTED_METHODS {
            let receipt = gateway.charge(&charge(method, 35_000)).await.unwrap();
            assert!(receipt.reference.starts_with("SIM-"));
        }
    }

    #[tokio::test]
    async fn test_simulated_gateway_rejects_bad_charges() {
        let gateway = SimulatedPaymentGateway::new();
        assert_eq!(
            gateway.charge(&charge("cheque", 35_000)).await,
            Err(PaymentError::UnsupportedMethod("cheque".to_string()))
        );
        assert_eq!(gateway.charge(&charge("card", 0)).await, Err(PaymentError::InvalidAmount(0)));
    }
}
