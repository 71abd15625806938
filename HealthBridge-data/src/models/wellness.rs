use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

/// Publication state of wellness content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Draft,
    Published,
}

text_enum!(ContentStatus {
    Draft => "draft",
    Published => "published",
});

/// Article or media item managed by a coach or admin
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct WellnessContent {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub summary: Option<String>,
    pub body: String,
    pub category: String,
    pub media_url: Option<String>,
    pub status: ContentStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for inserting wellness content (always a draft)
#[derive(Debug, Clone)]
pub struct NewWellnessContent {
    pub author_id: String,
    pub title: String,
    pub summary: Option<String>,
    pub body: String,
    pub category: String,
    pub media_url: Option<String>,
}

/// Query filter for listing wellness content
#[derive(Debug, Clone, Default)]
pub struct WellnessFilter {
    pub status: Option<ContentStatus>,
    pub author_id: Option<String>,
    pub category: Option<String>,
    /// Case-insensitive match against title and summary
    pub search: Option<String>,
}
