use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[cfg(feature = "with-api")]
use utoipa::{IntoParams, ToSchema};

use health_bridge_data::models::InvoiceStatus;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct CreateInvoiceRequest {
    pub appointment_id: String,

    /// Defaults to the provider's consultation fee
    #[validate(range(min = 1, message = "Amount must be greater than zero"))]
    pub amount_cents: Option<i64>,

    #[validate(length(equal = 3, message = "Currency must be a 3-letter ISO code"))]
    pub currency: Option<String>,

    #[validate(length(max = 500, message = "Description cannot exceed 500 characters"))]
    pub description: Option<String>,

    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct PayInvoiceRequest {
    /// card, mobile_money or eft
    #[validate(length(min = 1, message = "Payment method is required"))]
    pub method: String,
    pub account_reference: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema, IntoParams))]
#[cfg_attr(feature = "with-api", into_params(parameter_in = Query))]
pub struct InvoiceQuery {
    pub status: Option<InvoiceStatus>,
}
