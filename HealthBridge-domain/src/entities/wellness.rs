use serde::{Deserialize, Serialize};
use validator::Validate;

#[cfg(feature = "with-api")]
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct CreateWellnessRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[validate(length(max = 500, message = "Summary cannot exceed 500 characters"))]
    pub summary: Option<String>,

    #[validate(length(min = 1, max = 50000, message = "Body must be between 1 and 50000 characters"))]
    pub body: String,

    /// e.g. nutrition, mental-health, maternal-health
    #[validate(length(min = 1, max = 50, message = "Category must be between 1 and 50 characters"))]
    pub category: String,

    #[validate(url(message = "Media URL must be a valid URL"))]
    pub media_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct UpdateWellnessRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 500, message = "Summary cannot exceed 500 characters"))]
    pub summary: Option<String>,
    #[validate(length(min = 1, max = 50000, message = "Body must be between 1 and 50000 characters"))]
    pub body: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Category must be between 1 and 50 characters"))]
    pub category: Option<String>,
    #[validate(url(message = "Media URL must be a valid URL"))]
    pub media_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema, IntoParams))]
#[cfg_attr(feature = "with-api", into_params(parameter_in = Query))]
pub struct WellnessQuery {
    pub category: Option<String>,
    /// Text to look for in title and summary
    pub search: Option<String>,
    /// List the caller's own drafts and published items instead
    pub mine: Option<bool>,
}
