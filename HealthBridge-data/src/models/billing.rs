use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

/// Invoice payment state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    /// Claimed by a payment attempt that has not finished
    Processing,
    Paid,
    Failed,
    Cancelled,
}

text_enum!(InvoiceStatus {
    Pending => "pending",
    Processing => "processing",
    Paid => "paid",
    Failed => "failed",
    Cancelled => "cancelled",
});

/// Billing record tied to an appointment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct Invoice {
    pub id: String,
    pub appointment_id: String,
    pub patient_id: String,
    pub provider_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub description: Option<String>,
    pub status: InvoiceStatus,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub last_payment_error: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for inserting an invoice
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub appointment_id: String,
    pub patient_id: String,
    pub provider_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
}

/// Query filter for listing invoices
#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub patient_id: Option<String>,
    pub provider_id: Option<String>,
    pub status: Option<InvoiceStatus>,
}
