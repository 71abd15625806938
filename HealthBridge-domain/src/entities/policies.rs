use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct CreatePolicyRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 100000, message = "Content must be between 1 and 100000 characters"))]
    pub content: String,

    #[validate(length(min = 1, max = 20, message = "Version must be between 1 and 20 characters"))]
    pub version: String,

    /// e.g. privacy, terms, clinical
    #[validate(length(min = 1, max = 50, message = "Category must be between 1 and 50 characters"))]
    pub category: String,

    pub effective_date: NaiveDate,
}
