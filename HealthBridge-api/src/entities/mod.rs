// Public entities for the HealthBridge API
// Request and response shapes that exist only at the HTTP boundary; the
// domain request types are used directly everywhere else.

// Error response and pagination
pub mod common;

// Auth entities
pub mod auth;

// Query parameters shared by several handlers
pub mod queries;

pub use common::{AppointmentPaginatedResponse, ErrorResponse, PaginatedResponse};
